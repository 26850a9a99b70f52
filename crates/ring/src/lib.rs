//! Spool - Ring
//!
//! Bounded, pre-allocated ring buffer that hands records from producer
//! threads to a single consumer thread without locks on the hot path.
//!
//! # Design
//!
//! - Slots are allocated once; a publish moves the record into the next
//!   free slot and the consumer takes it out again
//! - Capacity is a power of two so a sequence maps to a slot with a mask
//! - Sequences are `i64` counters starting at -1 ("nothing yet")
//! - Single-producer mode claims with a plain store; the handle is not
//!   cloneable and `publish` takes `&mut self`
//! - Multi-producer mode claims with a CAS on the cursor and marks each
//!   slot with the sequence it was published under
//! - Producers only wait when the ring is full
//! - How the consumer idles is a pluggable [`WaitStrategy`]
//!
//! # Example
//!
//! ```ignore
//! use spool_ring::{ProducerType, SleepingWait, channel};
//!
//! let (mut producer, mut consumer) = channel(1024, ProducerType::Multi, Box::new(SleepingWait::default()))?;
//! producer.publish("hello")?;
//! consumer.process_batch(|record, sequence, end_of_batch| {
//!     println!("{sequence}: {record} (end of batch: {end_of_batch})");
//! })?;
//! ```

mod consumer;
mod error;
mod producer;
mod ring;
mod wait;

pub use consumer::{Consumer, Halter};
pub use error::{Alerted, RingError};
pub use producer::{MultiProducer, Producer, ProducerType, SingleProducer};
pub use wait::{
    BlockingWait, BusySpinWait, DEFAULT_SLEEP_QUANTUM, SleepingWait, WaitStrategy,
    WaitStrategyKind, YieldingWait,
};

use std::sync::Arc;

use ring::Ring;

/// Sequence value meaning "nothing published / processed yet"
pub const INITIAL_SEQUENCE: i64 = -1;

/// Create a ring buffer and its producer and consumer ends
///
/// `capacity` must be a non-zero power of two.
pub fn channel<T: Send>(
    capacity: usize,
    producer_type: ProducerType,
    wait: Box<dyn WaitStrategy>,
) -> Result<(Producer<T>, Consumer<T>), RingError> {
    if capacity == 0 {
        return Err(RingError::ZeroCapacity);
    }
    if !capacity.is_power_of_two() {
        return Err(RingError::CapacityNotPowerOfTwo(capacity));
    }

    let ring = Arc::new(Ring::new(capacity, producer_type, wait));
    let producer = match producer_type {
        ProducerType::Single => Producer::Single(SingleProducer::new(Arc::clone(&ring))),
        ProducerType::Multi => Producer::Multi(MultiProducer::new(Arc::clone(&ring))),
    };
    Ok((producer, Consumer::new(ring)))
}
