//! In-process workers connected by channels.
//!
//! Each ordered pair of ranks has its own FIFO channel, so a receiver always
//! knows which rank a message came from and messages between two ranks are
//! matched by order. Payloads are boxed `Any` values; a receiver that finds
//! the wrong type reports [`CommError::PayloadMismatch`].

use std::any::{type_name, Any};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use super::comm::{CommError, Communicator, COORDINATOR};

type Payload = Box<dyn Any + Send>;

/// One worker's endpoint of a fully connected channel mesh.
pub struct LocalCommunicator {
    rank: usize,
    size: usize,
    /// `to[dst]` sends to rank `dst`.
    to: Vec<Sender<Payload>>,
    /// `from[src]` receives from rank `src`.
    from: Vec<Receiver<Payload>>,
}

impl LocalCommunicator {
    /// Builds endpoints for `size` ranks, indexed by rank.
    pub fn mesh(size: usize) -> Vec<LocalCommunicator> {
        let channels: Vec<Vec<(Sender<Payload>, Receiver<Payload>)>> = (0..size)
            .map(|_| (0..size).map(|_| unbounded()).collect())
            .collect();
        (0..size)
            .map(|rank| LocalCommunicator {
                rank,
                size,
                to: (0..size).map(|dst| channels[rank][dst].0.clone()).collect(),
                from: (0..size).map(|src| channels[src][rank].1.clone()).collect(),
            })
            .collect()
    }

    fn send<T: Send + 'static>(&self, dst: usize, value: T) -> Result<(), CommError> {
        self.to[dst]
            .send(Box::new(value))
            .map_err(|_| CommError::Disconnected { peer: dst })
    }

    fn recv<T: 'static>(&self, src: usize) -> Result<T, CommError> {
        let payload = self.from[src]
            .recv()
            .map_err(|_| CommError::Disconnected { peer: src })?;
        payload
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| CommError::PayloadMismatch {
                peer: src,
                expected: type_name::<T>(),
            })
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn gather<T: Send + 'static>(&self, value: T) -> Result<Option<Vec<T>>, CommError> {
        if self.rank != COORDINATOR {
            self.send(COORDINATOR, value)?;
            return Ok(None);
        }
        let mut all = Vec::with_capacity(self.size);
        all.push(value);
        for src in 1..self.size {
            all.push(self.recv(src)?);
        }
        Ok(Some(all))
    }

    fn broadcast<T: Clone + Send + 'static>(&self, value: Option<T>) -> Result<T, CommError> {
        if self.rank != COORDINATOR {
            return self.recv(COORDINATOR);
        }
        let value = value.ok_or(CommError::MissingRootValue)?;
        for dst in 1..self.size {
            self.send(dst, value.clone())?;
        }
        Ok(value)
    }
}

/// Runs `worker` on `size` threads, one per rank, and returns their results in rank order.
///
/// A panicking worker drops its endpoint, so peers blocked on it observe
/// [`CommError::Disconnected`] instead of hanging.
pub fn launch<F, R>(size: usize, worker: F) -> Result<Vec<R>, CommError>
where
    F: Fn(LocalCommunicator) -> R + Sync,
    R: Send,
{
    let endpoints = LocalCommunicator::mesh(size);
    debug!(workers = size, "launching local workers");
    thread::scope(|scope| {
        let handles: Vec<_> = endpoints
            .into_iter()
            .map(|comm| {
                let worker = &worker;
                scope.spawn(move || worker(comm))
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, h)| h.join().map_err(|_| CommError::WorkerPanicked { rank }))
            .collect()
    })
}
