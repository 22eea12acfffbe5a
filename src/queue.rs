use crate::Error;

const DEFAULT_CAPACITY: usize = 8;

/// A growable FIFO ring buffer.
///
/// One slot is always left unused so that a full buffer can be told apart from an empty one by
/// its indices alone. When a push finds the buffer full, the capacity doubles and the live entries
/// are moved to the start of the new buffer in FIFO order.
#[derive(Debug)]
pub struct WorkQueue<E> {
    buf: Box<[Option<E>]>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<E> WorkQueue<E> {
    /// Returns an empty queue with the default capacity of 8 slots.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Returns an empty queue with `capacity` slots, one of which is reserved.
    ///
    /// Capacities below 2 are rounded up to 2.
    pub fn with_capacity(capacity: usize) -> Self {
        WorkQueue {
            buf: (0..capacity.max(2)).map(|_| None).collect(),
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Returns the number of queued entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if the next push will grow the buffer.
    #[inline]
    pub fn is_full(&self) -> bool {
        (self.tail + 1) % self.buf.len() == self.head
    }

    /// Returns the number of slots in the buffer, including the reserved one.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Appends `item` to the back of the queue.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is full and cannot be grown.
    pub fn push(&mut self, item: E) {
        if let Err(err) = self.try_push(item) {
            panic!("{err}");
        }
    }

    /// Appends `item` to the back of the queue, growing the buffer if it is full.
    ///
    /// On allocation failure the queue is left unchanged and `item` is dropped.
    pub fn try_push(&mut self, item: E) -> Result<(), Error> {
        if self.is_full() {
            self.grow()?;
        }

        self.buf[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.buf.len();
        self.len += 1;

        Ok(())
    }

    /// Removes and returns the oldest entry.
    pub fn pop(&mut self) -> Result<E, Error> {
        if self.is_empty() {
            return Err(Error::EmptyQueue);
        }

        let item = self.buf[self.head].take();
        self.head = (self.head + 1) % self.buf.len();
        self.len -= 1;

        debug_assert!(item.is_some(), "occupied slot was empty");
        item.ok_or(Error::EmptyQueue)
    }

    fn grow(&mut self) -> Result<(), Error> {
        let old_capacity = self.buf.len();
        let new_capacity = old_capacity.saturating_mul(2);

        // Allocate first so a failure leaves the entries where they are.
        let mut buf = Vec::new();
        buf.try_reserve_exact(new_capacity)?;

        for i in 0..self.len {
            buf.push(self.buf[(self.head + i) % old_capacity].take());
        }
        buf.resize_with(new_capacity, || None);

        self.buf = buf.into_boxed_slice();
        self.head = 0;
        self.tail = self.len;

        log::trace!("grew work queue from {old_capacity} to {new_capacity} slots");

        Ok(())
    }
}

impl<E> Default for WorkQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn pop_empty() {
        let mut queue: WorkQueue<u32> = WorkQueue::new();
        assert_eq!(queue.pop(), Err(Error::EmptyQueue));

        queue.push(1);
        assert_eq!(queue.pop(), Ok(1));
        assert_eq!(queue.pop(), Err(Error::EmptyQueue));
        assert!(queue.is_empty());
    }

    #[test]
    fn full_reserves_one_slot() {
        let mut queue = WorkQueue::new();

        for i in 0..DEFAULT_CAPACITY - 1 {
            assert!(!queue.is_full());
            queue.push(i);
        }

        assert!(queue.is_full());
        assert_eq!(queue.capacity(), DEFAULT_CAPACITY);
        assert_eq!(queue.len(), DEFAULT_CAPACITY - 1);

        queue.push(DEFAULT_CAPACITY - 1);
        assert!(!queue.is_full());
        assert_eq!(queue.capacity(), DEFAULT_CAPACITY * 2);
    }

    #[test_log::test]
    fn grow_while_wrapped() {
        let mut queue = WorkQueue::with_capacity(4);

        // Move the head forward so the live entries wrap around the end of the buffer.
        queue.push(0);
        queue.push(1);
        assert_eq!(queue.pop(), Ok(0));
        assert_eq!(queue.pop(), Ok(1));

        for i in 2..5 {
            queue.push(i);
        }
        assert!(queue.is_full());

        queue.push(5);
        assert_eq!(queue.capacity(), 8);

        let drained: Vec<_> = core::iter::from_fn(|| queue.pop().ok()).collect();
        assert_eq!(drained, [2, 3, 4, 5]);
    }

    #[test]
    fn tiny_capacity_rounds_up() {
        let mut queue = WorkQueue::with_capacity(0);
        assert_eq!(queue.capacity(), 2);

        for i in 0..100 {
            queue.push(i);
        }
        assert_eq!(queue.len(), 100);
        assert_eq!(queue.capacity(), 128);
    }

    proptest::proptest! {
        #[test]
        fn fifo_order(ops in proptest::collection::vec(proptest::option::of(0u32..1000), 0..500)) {
            let mut queue = WorkQueue::new();
            let mut model = VecDeque::new();

            for op in ops {
                match op {
                    Some(value) => {
                        queue.push(value);
                        model.push_back(value);
                    }
                    None => {
                        prop_assert_eq!(queue.pop().ok(), model.pop_front());
                    }
                }

                prop_assert_eq!(queue.len(), model.len());
                prop_assert!(queue.len() < queue.capacity());
            }

            while let Some(expected) = model.pop_front() {
                prop_assert_eq!(queue.pop(), Ok(expected));
            }
            prop_assert!(queue.is_empty());
        }
    }
}
