//! Reorder completions into submission order.

use std::collections::BTreeMap;

/// Buffers out-of-order completions and releases them in sequence.
///
/// Sequence numbers start at zero and must each be completed exactly once.
#[derive(Debug)]
pub struct ResponseSequencer<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> Default for ResponseSequencer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResponseSequencer<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Record completion of `seq` and return every item now releasable, in order.
    pub fn complete(&mut self, seq: u64, item: T) -> Vec<T> {
        if seq < self.next {
            tracing::warn!(seq, next = self.next, "Ignoring duplicate completion");
            return Vec::new();
        }
        self.pending.insert(seq, item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        ready
    }

    /// Number of completions held back waiting for an earlier one.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}
