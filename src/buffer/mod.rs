//! Fixed-capacity FIFO ring buffer.
//!
//! Holds events waiting for a deferred flush and completion handles waiting
//! for an async flush. The buffer never grows: a push into a full buffer is
//! rejected with [`Error::Overflow`] so the caller decides what to do with
//! the backlog.
//!
//! The buffer itself is not synchronized. Channels wrap it in a mutex.

use crate::{Error, Result};
use std::fmt;

/// Default capacity used by channels for both of their buffers.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A bounded circular FIFO buffer.
pub struct RingBuffer<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config("ring buffer capacity must be at least 1"));
        }

        let slots = std::iter::repeat_with(|| None).take(capacity).collect();
        Ok(Self {
            slots,
            head: 0,
            tail: 0,
            len: 0,
        })
    }

    /// Append an item at the back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] when the buffer is full. The buffer is
    /// left untouched and `item` is dropped.
    pub fn push(&mut self, item: T) -> Result<()> {
        if self.is_full() {
            return Err(Error::Overflow {
                capacity: self.capacity(),
            });
        }

        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.capacity();
        self.len += 1;
        Ok(())
    }

    /// Remove the item at the front.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Underflow`] when the buffer is empty.
    pub fn pop(&mut self) -> Result<T> {
        if self.is_empty() {
            return Err(Error::Underflow);
        }

        let item = self.slots[self.head].take().ok_or(Error::Underflow)?;
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        Ok(item)
    }

    /// Borrow the item at the front without removing it.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            None
        } else {
            self.slots[self.head].as_ref()
        }
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Maximum number of items.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether the buffer holds no items.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the next push would overflow.
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Drop every item and reset the indices.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }

    /// Remove every item, yielding them in FIFO order.
    ///
    /// Items not consumed by the iterator are dropped with it.
    pub fn drain(&mut self) -> Drain<'_, T> {
        Drain { buffer: self }
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Draining iterator returned by [`RingBuffer::drain`].
#[derive(Debug)]
pub struct Drain<'a, T> {
    buffer: &'a mut RingBuffer<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.buffer.pop().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.buffer.len(), Some(self.buffer.len()))
    }
}

impl<T> ExactSizeIterator for Drain<'_, T> {}

impl<T> Drop for Drain<'_, T> {
    fn drop(&mut self) {
        self.buffer.clear();
    }
}
