//! Ring buffer errors

use thiserror::Error;

/// Errors raised when building or sharing a ring buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("ring buffer capacity must be greater than zero")]
    ZeroCapacity,

    #[error("ring buffer capacity must be a power of two, got {0}")]
    CapacityNotPowerOfTwo(usize),

    /// Only multi-producer rings hand out more than one producer
    #[error("single-producer ring cannot have a second producer")]
    SingleProducer,
}

/// The ring was halted while waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ring buffer halted")]
pub struct Alerted;
