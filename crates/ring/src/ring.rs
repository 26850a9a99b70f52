//! Shared ring state: slot arena plus sequence counters

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crossbeam::utils::CachePadded;

use crate::INITIAL_SEQUENCE;
use crate::producer::ProducerType;
use crate::wait::WaitStrategy;

/// One pre-allocated slot
pub(crate) struct Slot<T> {
    value: UnsafeCell<Option<T>>,

    /// Sequence this slot was last published under (multi-producer only)
    published: AtomicI64,
}

/// State shared by the producer handles and the consumer
///
/// Slot access protocol:
/// - a producer owns slot `s & mask` from claiming `s` until it publishes `s`
/// - the consumer owns it from observing `s` as published until it advances
///   the consumer sequence past `s`
/// - a producer may only claim `s` once the consumer sequence is at least
///   `s - capacity`
pub(crate) struct Ring<T> {
    slots: Box<[Slot<T>]>,
    mask: i64,
    capacity: i64,
    producer_type: ProducerType,

    /// Single-producer: highest published. Multi-producer: highest claimed.
    cursor: CachePadded<AtomicI64>,

    /// Highest sequence the consumer has finished with
    consumed: CachePadded<AtomicI64>,

    alerted: AtomicBool,
    wait: Box<dyn WaitStrategy>,
}

// Slots are only touched under the access protocol above.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    pub(crate) fn new(capacity: usize, producer_type: ProducerType, wait: Box<dyn WaitStrategy>) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                value: UnsafeCell::new(None),
                published: AtomicI64::new(INITIAL_SEQUENCE),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            mask: capacity as i64 - 1,
            capacity: capacity as i64,
            producer_type,
            cursor: CachePadded::new(AtomicI64::new(INITIAL_SEQUENCE)),
            consumed: CachePadded::new(AtomicI64::new(INITIAL_SEQUENCE)),
            alerted: AtomicBool::new(false),
            wait,
        }
    }

    #[inline]
    fn slot(&self, sequence: i64) -> &Slot<T> {
        &self.slots[(sequence & self.mask) as usize]
    }

    #[inline]
    pub(crate) fn capacity(&self) -> i64 {
        self.capacity
    }

    #[inline]
    pub(crate) fn cursor(&self) -> &AtomicI64 {
        &self.cursor
    }

    #[inline]
    pub(crate) fn consumed(&self) -> i64 {
        self.consumed.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }

    pub(crate) fn wait_strategy(&self) -> &dyn WaitStrategy {
        self.wait.as_ref()
    }

    pub(crate) fn alerted_flag(&self) -> &AtomicBool {
        &self.alerted
    }

    pub(crate) fn halt(&self) {
        self.alerted.store(true, Ordering::Release);
        self.wait.signal_all_when_blocking();
    }

    /// Store a record in the slot for a claimed sequence
    ///
    /// # Safety
    ///
    /// The caller must have claimed `sequence` and not yet published it.
    #[inline]
    pub(crate) unsafe fn write(&self, sequence: i64, value: T) {
        // SAFETY: the claim gives this producer exclusive access to the slot
        unsafe { *self.slot(sequence).value.get() = Some(value) };
    }

    /// Make a written multi-producer slot visible to the consumer
    #[inline]
    pub(crate) fn mark_published(&self, sequence: i64) {
        self.slot(sequence).published.store(sequence, Ordering::Release);
    }

    /// Take the record out of a published slot
    ///
    /// # Safety
    ///
    /// Only the consumer may call this, for a sequence it has observed as
    /// published and not yet released.
    #[inline]
    pub(crate) unsafe fn take(&self, sequence: i64) -> Option<T> {
        // SAFETY: the consumer owns published, unreleased slots
        unsafe { (*self.slot(sequence).value.get()).take() }
    }

    /// Hand slots up to and including `sequence` back to the producers
    #[inline]
    pub(crate) fn release(&self, sequence: i64) {
        self.consumed.store(sequence, Ordering::Release);
    }

    /// Highest sequence from `lower` on that the consumer may read
    ///
    /// Returns `lower - 1` when nothing new is available.
    pub(crate) fn highest_published(&self, lower: i64) -> i64 {
        let cursor = self.cursor.load(Ordering::Acquire);
        match self.producer_type {
            ProducerType::Single => cursor,
            ProducerType::Multi => {
                let mut sequence = lower;
                while sequence <= cursor {
                    if self.slot(sequence).published.load(Ordering::Acquire) != sequence {
                        break;
                    }
                    sequence += 1;
                }
                sequence - 1
            }
        }
    }

    /// Claimed but not yet consumed sequences
    pub(crate) fn len(&self) -> usize {
        let cursor = self.cursor.load(Ordering::Acquire);
        (cursor - self.consumed()).clamp(0, self.capacity) as usize
    }
}
