//! Collective communication between workers.
//!
//! Every operation is blocking and must be called by every worker in the
//! same order. Rank [`COORDINATOR`] is the root of all rooted collectives.

use std::iter::Sum;

use thiserror::Error;

/// Rank of the coordinating worker.
pub const COORDINATOR: usize = 0;

/// Errors raised by collective operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommError {
    /// A peer went away before the collective completed.
    #[error("rank {peer} disconnected")]
    Disconnected { peer: usize },

    /// A peer sent a value of a different type than this collective expects.
    #[error("rank {peer} sent a payload that is not a {expected}")]
    PayloadMismatch { peer: usize, expected: &'static str },

    /// The coordinator called a broadcast without a value.
    #[error("broadcast root has no value to send")]
    MissingRootValue,

    /// A worker thread panicked.
    #[error("worker {rank} panicked")]
    WorkerPanicked { rank: usize },
}

/// Blocking collectives over a fixed group of workers.
pub trait Communicator {
    /// This worker's rank in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of workers.
    fn size(&self) -> usize;

    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }

    /// Collects one value from every rank at the coordinator, in rank order.
    ///
    /// Returns `Some` on the coordinator and `None` elsewhere.
    fn gather<T: Send + 'static>(&self, value: T) -> Result<Option<Vec<T>>, CommError>;

    /// Sends the coordinator's value to every rank.
    ///
    /// The coordinator passes `Some(value)`; other ranks pass `None` (any
    /// value they pass is ignored). Every rank returns the coordinator's value.
    fn broadcast<T: Clone + Send + 'static>(&self, value: Option<T>) -> Result<T, CommError>;

    /// Sums one value per rank at the coordinator.
    fn reduce_sum<T: Sum<T> + Send + 'static>(&self, value: T) -> Result<Option<T>, CommError> {
        Ok(self.gather(value)?.map(|all| all.into_iter().sum()))
    }

    /// Sums one value per rank and returns the total on every rank.
    fn all_reduce_sum<T: Sum<T> + Clone + Send + 'static>(&self, value: T) -> Result<T, CommError> {
        let total = self.reduce_sum(value)?;
        self.broadcast(total)
    }

    /// Returns once every rank has entered the barrier.
    fn barrier(&self) -> Result<(), CommError> {
        let arrived = self.gather(())?;
        self.broadcast(arrived.map(|_| ()))
    }
}

/// Single-worker communicator; every collective is local.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoloCommunicator;

impl Communicator for SoloCommunicator {
    fn rank(&self) -> usize {
        COORDINATOR
    }

    fn size(&self) -> usize {
        1
    }

    fn gather<T: Send + 'static>(&self, value: T) -> Result<Option<Vec<T>>, CommError> {
        Ok(Some(vec![value]))
    }

    fn broadcast<T: Clone + Send + 'static>(&self, value: Option<T>) -> Result<T, CommError> {
        value.ok_or(CommError::MissingRootValue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solo_collectives_are_identity() {
        let c = SoloCommunicator;
        assert!(c.is_coordinator());
        assert_eq!(c.all_reduce_sum(5usize).unwrap(), 5);
        assert_eq!(c.reduce_sum(1.5f64).unwrap(), Some(1.5));
        assert_eq!(c.gather("x").unwrap(), Some(vec!["x"]));
        assert!(c.barrier().is_ok());
    }

    #[test]
    fn solo_broadcast_requires_value() {
        assert_eq!(
            SoloCommunicator.broadcast::<u8>(None),
            Err(CommError::MissingRootValue)
        );
    }

    #[test]
    fn error_display() {
        assert_eq!(
            CommError::Disconnected { peer: 2 }.to_string(),
            "rank 2 disconnected"
        );
    }
}
