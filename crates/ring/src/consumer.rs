//! Consumer end of the ring

use std::sync::Arc;

use crate::error::Alerted;
use crate::ring::Ring;

/// The single consumer of a ring
///
/// Not cloneable: exactly one thread takes records out.
pub struct Consumer<T> {
    ring: Arc<Ring<T>>,

    /// Next sequence to process
    next: i64,
}

impl<T> Consumer<T> {
    pub(crate) fn new(ring: Arc<Ring<T>>) -> Self {
        Self { ring, next: 0 }
    }

    /// Wait for at least one record and process everything available
    ///
    /// `handler` receives each record with its sequence and whether it is
    /// the last record of this batch. Slots are released to the producers
    /// once the whole batch has been handled. Returns the batch size, or
    /// `Alerted` once the ring is halted (records may still be pending;
    /// use [`Consumer::drain`] to collect them).
    pub fn process_batch<F>(&mut self, handler: F) -> Result<usize, Alerted>
    where
        F: FnMut(T, i64, bool),
    {
        let ring = &*self.ring;
        let lower = self.next;
        let available = ring.wait_strategy().wait_for(
            lower,
            &|| ring.highest_published(lower),
            ring.alerted_flag(),
        )?;
        Ok(self.consume(available, handler))
    }

    /// Process whatever is already published, without waiting
    ///
    /// Works on a halted ring; returns the number of records handled.
    pub fn drain<F>(&mut self, mut handler: F) -> usize
    where
        F: FnMut(T, i64, bool),
    {
        let mut total = 0;
        loop {
            let available = self.ring.highest_published(self.next);
            if available < self.next {
                return total;
            }
            total += self.consume(available, &mut handler);
        }
    }

    fn consume<F>(&mut self, available: i64, mut handler: F) -> usize
    where
        F: FnMut(T, i64, bool),
    {
        let lower = self.next;
        for sequence in lower..=available {
            // SAFETY: every sequence up to `available` is published and unreleased
            if let Some(value) = unsafe { self.ring.take(sequence) } {
                handler(value, sequence, sequence == available);
            }
        }
        self.next = available + 1;
        self.ring.release(available);
        (available - lower + 1) as usize
    }

    /// Alert the consumer and unblock waiting producers
    pub fn halt(&self) {
        self.ring.halt();
    }

    pub fn is_halted(&self) -> bool {
        self.ring.is_alerted()
    }

    /// Cloneable handle that can halt this ring from another thread
    pub fn halter(&self) -> Halter
    where
        T: Send + 'static,
    {
        let ring = Arc::clone(&self.ring);
        Halter {
            halt: Arc::new(move || ring.halt()),
        }
    }

    /// Sequence of the last processed record
    pub fn sequence(&self) -> i64 {
        self.next - 1
    }

    /// Records published (or claimed) but not yet processed
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity() as usize
    }
}

/// Halts a ring from any thread
#[derive(Clone)]
pub struct Halter {
    halt: Arc<dyn Fn() + Send + Sync>,
}

impl Halter {
    pub fn halt(&self) {
        (self.halt)();
    }
}

impl std::fmt::Debug for Halter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Halter").finish_non_exhaustive()
    }
}
