//! Fixed-capacity FIFO buffers of trajectory data.
use crate::error::BufferError;
use std::collections::VecDeque;

/// Capability set of a trajectory buffer.
pub trait Buffer {
    /// Type of the stored items.
    type Item;

    /// Maximum number of items the buffer holds.
    fn capacity(&self) -> usize;

    /// Number of items currently held.
    fn len(&self) -> usize;

    /// Whether the buffer holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends an item. Never fails; the oldest item is evicted when the
    /// buffer is full.
    fn push(&mut self, item: Self::Item);

    /// Returns the oldest `batch_size` items in FIFO order without removing
    /// them.
    ///
    /// Fails with [`BufferError::InsufficientData`] when fewer items are held,
    /// unless `sample_less` is set, in which case all held items are returned.
    fn sample(&self, batch_size: usize, sample_less: bool)
        -> Result<Vec<Self::Item>, BufferError>;

    /// Like [`Buffer::sample`], but removes the returned items from the
    /// buffer.
    fn sample_and_pop(
        &mut self,
        batch_size: usize,
        sample_less: bool,
    ) -> Result<Vec<Self::Item>, BufferError>;
}

/// A fixed-capacity FIFO buffer backed by a deque.
pub struct ReplayBuffer<T> {
    capacity: usize,
    buffer: VecDeque<T>,
}

impl<T: Clone> ReplayBuffer<T> {
    /// Creates an empty buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    fn check_available(&self, batch_size: usize) -> Result<(), BufferError> {
        if batch_size > self.buffer.len() {
            return Err(BufferError::InsufficientData {
                requested: batch_size,
                available: self.buffer.len(),
            });
        }
        Ok(())
    }
}

impl<T: Clone> Buffer for ReplayBuffer<T> {
    type Item = T;

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(item);
    }

    fn sample(&self, batch_size: usize, sample_less: bool) -> Result<Vec<T>, BufferError> {
        if sample_less {
            return Ok(self.buffer.iter().cloned().collect());
        }
        self.check_available(batch_size)?;
        Ok(self.buffer.iter().take(batch_size).cloned().collect())
    }

    fn sample_and_pop(
        &mut self,
        batch_size: usize,
        sample_less: bool,
    ) -> Result<Vec<T>, BufferError> {
        let n = if sample_less {
            self.buffer.len()
        } else {
            self.check_available(batch_size)?;
            batch_size
        };
        Ok(self.buffer.drain(..n).collect())
    }
}

#[cfg(test)]
mod test {
    use super::{Buffer, ReplayBuffer};
    use crate::error::BufferError;

    fn filled(capacity: usize, items: &[i32]) -> ReplayBuffer<i32> {
        let mut buffer = ReplayBuffer::new(capacity);
        for &item in items {
            buffer.push(item);
        }
        buffer
    }

    #[test]
    fn test_push_evicts_oldest() {
        let buffer = filled(4, &[1, 2, 3, 4, 5]);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.sample(4, false).unwrap(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut buffer = ReplayBuffer::new(3);
        for i in 0..10 {
            buffer.push(i);
            assert!(buffer.len() <= buffer.capacity());
        }
    }

    #[test]
    fn test_sample_too_many_fails() {
        let buffer = filled(4, &[1, 2]);
        let err = buffer.sample(3, false).unwrap_err();
        assert!(matches!(
            err,
            BufferError::InsufficientData {
                requested: 3,
                available: 2
            }
        ));
    }

    #[test]
    fn test_sample_less_returns_all_held() {
        let buffer = filled(4, &[1, 2]);
        assert_eq!(buffer.sample(10, true).unwrap(), vec![1, 2]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_sample_keeps_items() {
        let buffer = filled(4, &[1, 2, 3]);
        assert_eq!(buffer.sample(2, false).unwrap(), vec![1, 2]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_sample_and_pop_removes_in_fifo_order() {
        let mut buffer = filled(4, &[1, 2, 3, 4]);
        assert_eq!(buffer.sample_and_pop(2, false).unwrap(), vec![1, 2]);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.sample_and_pop(2, false).unwrap(), vec![3, 4]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_sample_and_pop_less_drains_buffer() {
        let mut buffer = filled(4, &[1, 2, 3]);
        assert_eq!(buffer.sample_and_pop(10, true).unwrap(), vec![1, 2, 3]);
        assert!(buffer.is_empty());
    }
}
