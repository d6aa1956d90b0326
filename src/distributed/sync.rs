//! Experience and parameter synchronization for one training tick.
//!
//! 1. The experience count of every worker is summed on all ranks.
//! 2. Once it reaches the sync threshold, every worker's buffer is gathered
//!    into the coordinator's bundle and the local buffers are emptied.
//! 3. The bundle length is broadcast so every rank agrees on whether an
//!    update is due.
//! 4. After an update the coordinator broadcasts a full parameter snapshot
//!    and every other rank installs it before continuing.

use tracing::debug;

use super::comm::Communicator;
use crate::error::TrainError;
use crate::memory::SwarmMemory;
use crate::policy::{PolicyNetwork, PolicyParameters};

/// Result of one [`ExperienceSync::exchange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    /// Sum of local experience counts over all workers, before gathering.
    pub global_experience: usize,
    /// True if buffers were gathered this tick.
    pub gathered: bool,
    /// Coordinator bundle length (0 when nothing was gathered).
    pub bundle_length: usize,
    /// True on every rank when the coordinator should update now.
    pub update_due: bool,
}

/// Accumulates gathered experience at the coordinator.
#[derive(Debug, Clone)]
pub struct ExperienceSync {
    sync_experience: usize,
    update_experience: usize,
    bundle: SwarmMemory,
}

impl ExperienceSync {
    pub fn new(sync_experience: usize, update_experience: usize) -> Self {
        Self {
            sync_experience,
            update_experience,
            bundle: SwarmMemory::default(),
        }
    }

    /// Coordinator's accumulated bundle (always empty on other ranks).
    pub fn bundle(&self) -> &SwarmMemory {
        &self.bundle
    }

    /// Runs steps 1 to 3 of the tick protocol. Collective: call on every rank.
    pub fn exchange<C: Communicator>(
        &mut self,
        comm: &C,
        local: &mut SwarmMemory,
    ) -> Result<SyncStatus, TrainError> {
        let global_experience = comm.all_reduce_sum(local.total_length())?;
        if global_experience < self.sync_experience {
            return Ok(SyncStatus {
                global_experience,
                gathered: false,
                bundle_length: 0,
                update_due: false,
            });
        }

        if let Some(parts) = comm.gather(local.take())? {
            for part in parts {
                self.bundle.merge(part);
            }
        }
        let root_length = comm
            .is_coordinator()
            .then(|| self.bundle.total_length());
        let bundle_length = comm.broadcast(root_length)?;
        debug!(
            rank = comm.rank(),
            global_experience,
            bundle_length,
            "experience gathered"
        );
        Ok(SyncStatus {
            global_experience,
            gathered: true,
            bundle_length,
            update_due: bundle_length >= self.update_experience,
        })
    }

    /// Hands the bundle to the update engine and starts a fresh one.
    ///
    /// Slots that received no data are dropped.
    pub fn take_bundle(&mut self) -> SwarmMemory {
        let mut bundle = std::mem::take(&mut self.bundle);
        bundle.retain_nonempty();
        bundle
    }
}

/// Broadcasts the coordinator's parameters and installs them on every other rank.
///
/// Collective: call on every rank. Returns the snapshot that was shared.
pub fn broadcast_parameters<C, P>(comm: &C, policy: &mut P) -> Result<PolicyParameters, TrainError>
where
    C: Communicator,
    P: PolicyNetwork + ?Sized,
{
    let snapshot = comm.is_coordinator().then(|| policy.parameters());
    let params = comm.broadcast(snapshot)?;
    if !comm.is_coordinator() {
        policy.set_parameters(&params)?;
    }
    Ok(params)
}
