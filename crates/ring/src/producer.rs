//! Producer handles
//!
//! A publish either succeeds or, if the ring has been halted, hands the
//! record back to the caller. The only wait is for a free slot.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crossbeam::utils::Backoff;
use serde::{Deserialize, Serialize};

use crate::INITIAL_SEQUENCE;
use crate::error::RingError;
use crate::ring::Ring;

/// How many threads may publish into a ring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerType {
    /// Exactly one publishing thread; claims without atomic read-modify-write
    Single,
    /// Any number of publishing threads; claims with compare-and-swap
    #[default]
    Multi,
}

impl std::fmt::Display for ProducerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProducerType::Single => write!(f, "single"),
            ProducerType::Multi => write!(f, "multi"),
        }
    }
}

/// Producer end of a ring, in either mode
pub enum Producer<T> {
    Single(SingleProducer<T>),
    Multi(MultiProducer<T>),
}

impl<T> Producer<T> {
    /// Publish a record, waiting while the ring is full
    ///
    /// Returns the record if the ring has been halted.
    #[inline]
    pub fn publish(&mut self, value: T) -> Result<(), T> {
        match self {
            Producer::Single(producer) => producer.publish(value),
            Producer::Multi(producer) => producer.publish(value),
        }
    }

    /// Another handle onto the same ring (multi-producer rings only)
    pub fn try_clone(&self) -> Result<Self, RingError> {
        match self {
            Producer::Single(_) => Err(RingError::SingleProducer),
            Producer::Multi(producer) => Ok(Producer::Multi(producer.clone())),
        }
    }

    pub fn producer_type(&self) -> ProducerType {
        match self {
            Producer::Single(_) => ProducerType::Single,
            Producer::Multi(_) => ProducerType::Multi,
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.ring().capacity() as usize
    }

    /// Records published or claimed but not yet consumed
    pub fn len(&self) -> usize {
        self.ring().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free slots
    pub fn remaining_capacity(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Whether the ring has been halted
    pub fn is_halted(&self) -> bool {
        self.ring().is_alerted()
    }

    fn ring(&self) -> &Ring<T> {
        match self {
            Producer::Single(producer) => &producer.ring,
            Producer::Multi(producer) => &producer.ring,
        }
    }
}

/// The only producer of a single-producer ring
///
/// Claim state lives in the handle itself, so the ring's cursor only ever
/// sees plain release stores.
pub struct SingleProducer<T> {
    ring: Arc<Ring<T>>,

    /// Last claimed (and published) sequence
    next: i64,

    /// Last observed consumer sequence
    cached_gate: i64,
}

impl<T> SingleProducer<T> {
    pub(crate) fn new(ring: Arc<Ring<T>>) -> Self {
        Self {
            ring,
            next: INITIAL_SEQUENCE,
            cached_gate: INITIAL_SEQUENCE,
        }
    }

    pub fn publish(&mut self, value: T) -> Result<(), T> {
        let ring = &*self.ring;
        if ring.is_alerted() {
            return Err(value);
        }

        let sequence = self.next + 1;
        let wrap_point = sequence - ring.capacity();

        if wrap_point > self.cached_gate {
            let backoff = Backoff::new();
            loop {
                let gate = ring.consumed();
                if wrap_point <= gate {
                    self.cached_gate = gate;
                    break;
                }
                if ring.is_alerted() {
                    return Err(value);
                }
                backoff.snooze();
            }
        }

        // SAFETY: `sequence` is claimed by this, the only producer
        unsafe { ring.write(sequence, value) };
        self.next = sequence;
        ring.cursor().store(sequence, Ordering::Release);
        ring.wait_strategy().signal_all_when_blocking();
        Ok(())
    }
}

/// One of possibly many producers of a multi-producer ring
pub struct MultiProducer<T> {
    ring: Arc<Ring<T>>,
}

impl<T> MultiProducer<T> {
    pub(crate) fn new(ring: Arc<Ring<T>>) -> Self {
        Self { ring }
    }

    pub fn publish(&self, value: T) -> Result<(), T> {
        let ring = &*self.ring;
        let cursor = ring.cursor();
        let backoff = Backoff::new();

        let sequence = loop {
            if ring.is_alerted() {
                return Err(value);
            }

            let current = cursor.load(Ordering::Acquire);
            let next = current + 1;

            // The consumer sequence only grows, so a free slot stays free
            if next - ring.capacity() > ring.consumed() {
                backoff.snooze();
                continue;
            }

            if cursor
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                break next;
            }
            backoff.spin();
        };

        // SAFETY: the CAS gave this producer exclusive ownership of `sequence`
        unsafe { ring.write(sequence, value) };
        ring.mark_published(sequence);
        ring.wait_strategy().signal_all_when_blocking();
        Ok(())
    }
}

impl<T> Clone for MultiProducer<T> {
    fn clone(&self) -> Self {
        Self {
            ring: Arc::clone(&self.ring),
        }
    }
}
