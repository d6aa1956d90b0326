use thiserror::Error;

/// Errors raised while routing per-step data into a [`SwarmMemory`](super::SwarmMemory).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("{field} batch has {actual} entries but {expected} slots are active")]
    BatchLengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Slot index {slot} out of range for a swarm of {slots} slots")]
    SlotOutOfRange { slot: usize, slots: usize },
}
