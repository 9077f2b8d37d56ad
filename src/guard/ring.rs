//! Fixed-capacity ring buffer for error and memory histories.

use std::collections::VecDeque;

/// Keeps the most recent `capacity` items.
///
/// # Examples
///
/// ```
/// use codesplit::guard::RingBuffer;
///
/// let mut ring = RingBuffer::new(2);
/// ring.push(1);
/// ring.push(2);
/// ring.push(3);
/// assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Creates a ring holding at most `capacity` items (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an item, dropping the oldest when full.
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Number of items held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the ring is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of items.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent item.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    /// Item `n` positions before the most recent one.
    #[must_use]
    pub fn nth_back(&self, n: usize) -> Option<&T> {
        self.items.len().checked_sub(n + 1).and_then(|i| self.items.get(i))
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Drops every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_bounded() {
        let mut ring = RingBuffer::new(3);
        for i in 0..10 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.last(), Some(&9));
        assert_eq!(ring.nth_back(2), Some(&7));
        assert_eq!(ring.nth_back(3), None);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut ring = RingBuffer::new(0);
        ring.push("a");
        ring.push("b");
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.iter().collect::<Vec<_>>(), vec![&"b"]);
    }

    #[test]
    fn test_clear() {
        let mut ring = RingBuffer::new(2);
        ring.push(1);
        ring.clear();
        assert!(ring.is_empty());
    }
}
