// ============================================================================
// BOUNDED RING BUFFER
// ============================================================================
// Fixed-capacity FIFO used for both raw samples and finalized aggregates.
// Overflow evicts the oldest item; nothing here ever blocks or grows past
// the capacity chosen at construction.
// ============================================================================

use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// A fixed-capacity FIFO that evicts its oldest item on overflow.
///
/// Items come back in insertion order, which is not necessarily timestamp
/// order for time-series data.
#[derive(Debug, Clone)]
pub struct BoundedRingBuffer<T> {
    items: VecDeque<T>,
    capacity: NonZeroUsize,
    /// Items pushed since construction or the last clear (including evicted)
    total_pushed: u64,
    /// Items dropped to make room
    evicted: u64,
}

impl<T: Clone> BoundedRingBuffer<T> {
    /// Create an empty buffer holding at most `capacity` items.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.get()),
            capacity,
            total_pushed: 0,
            evicted: 0,
        }
    }

    /// Append an item, evicting the oldest if the buffer is full.
    ///
    /// Returns the evicted item, if any.
    #[inline]
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity.get() {
            self.evicted += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        self.total_pushed += 1;
        evicted
    }

    /// Copy of every retained item, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    /// Copy of the retained items matching `predicate`, oldest first.
    pub fn snapshot_filtered<F>(&self, mut predicate: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.items.iter().filter(|item| predicate(item)).cloned().collect()
    }

    /// The most recently pushed item.
    #[inline]
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    /// Iterate over retained items, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.total_pushed = 0;
        self.evicted = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    #[inline]
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    #[inline]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
