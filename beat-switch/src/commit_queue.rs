// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A fixed-capacity byte ring with speculative writes.
//!
//! The [`CommitQueue`] has three cursors:
//!
//!  - `write`: where the next speculative byte will be stored,
//!  - `commit`: the end of the last published frame,
//!  - `read`: the start of the oldest published frame.
//!
//! `read <= commit <= write` always holds. Bytes between `commit` and `write`
//! belong to a frame that has not been published yet and are invisible to
//! [`peek`](CommitQueue::peek) and [`dequeue`](CommitQueue::dequeue). The
//! length of every published frame is kept in a second, fixed-size ring of
//! descriptors so that frames can be dequeued whole.
//!
//! Cursors are absolute byte counts and are only reduced modulo the capacity
//! when indexing storage.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueError {
    /// Not enough free space, or no free descriptor.
    Full,
    /// Nothing to commit.
    Empty,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueueError::Full => write!(f, "queue full"),
            QueueError::Empty => write!(f, "nothing to commit"),
        }
    }
}

impl std::error::Error for QueueError {}

pub struct CommitQueue {
    data: Box<[u8]>,
    lengths: Box<[usize]>,
    read: usize,
    commit: usize,
    write: usize,
    head_frame: usize,
    tail_frame: usize,
}

impl CommitQueue {
    /// Create a queue of `capacity_bytes` that can hold at most
    /// `capacity_frames` published frames.
    #[must_use]
    pub fn new(capacity_bytes: usize, capacity_frames: usize) -> Self {
        Self {
            data: vec![0; capacity_bytes].into_boxed_slice(),
            lengths: vec![0; capacity_frames].into_boxed_slice(),
            read: 0,
            commit: 0,
            write: 0,
            head_frame: 0,
            tail_frame: 0,
        }
    }

    #[must_use]
    pub fn capacity_bytes(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn capacity_frames(&self) -> usize {
        self.lengths.len()
    }

    /// Bytes in use, published or not.
    #[must_use]
    pub fn occupancy_bytes(&self) -> usize {
        self.write - self.read
    }

    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.capacity_bytes() - self.occupancy_bytes()
    }

    #[must_use]
    pub fn committed_bytes(&self) -> usize {
        self.commit - self.read
    }

    #[must_use]
    pub fn speculative_bytes(&self) -> usize {
        self.write - self.commit
    }

    /// Number of published frames.
    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.tail_frame - self.head_frame
    }

    /// No published frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_frames() == 0
    }

    /// No published frames and no frame in progress.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.is_empty() && self.speculative_bytes() == 0
    }

    fn descriptors_full(&self) -> bool {
        self.num_frames() == self.capacity_frames()
    }

    /// Returns true if `num_bytes` more speculative bytes can be written now.
    #[must_use]
    pub fn can_write(&self, num_bytes: usize) -> bool {
        !self.descriptors_full() && self.free_bytes() >= num_bytes
    }

    /// Append one speculative byte.
    pub fn write(&mut self, byte: u8) -> Result<(), QueueError> {
        if !self.can_write(1) {
            return Err(QueueError::Full);
        }
        let index = self.write % self.capacity_bytes();
        self.data[index] = byte;
        self.write += 1;
        Ok(())
    }

    /// Append speculative bytes. Either all bytes are written or none are.
    pub fn write_slice(&mut self, bytes: &[u8]) -> Result<(), QueueError> {
        if !self.can_write(bytes.len()) {
            return Err(QueueError::Full);
        }
        let capacity = self.capacity_bytes();
        let start = self.write % capacity;
        let first = bytes.len().min(capacity - start);
        self.data[start..start + first].copy_from_slice(&bytes[..first]);
        self.data[..bytes.len() - first].copy_from_slice(&bytes[first..]);
        self.write += bytes.len();
        Ok(())
    }

    /// Publish the speculative bytes as one frame and return its length.
    pub fn commit(&mut self) -> Result<usize, QueueError> {
        let length = self.speculative_bytes();
        if length == 0 {
            return Err(QueueError::Empty);
        }
        if self.descriptors_full() {
            return Err(QueueError::Full);
        }
        let index = self.tail_frame % self.capacity_frames();
        self.lengths[index] = length;
        self.tail_frame += 1;
        self.commit = self.write;
        Ok(length)
    }

    /// Discard the speculative bytes and return how many there were.
    pub fn revert(&mut self) -> usize {
        let discarded = self.speculative_bytes();
        self.write = self.commit;
        discarded
    }

    /// Length of the oldest published frame.
    #[must_use]
    pub fn peek_length(&self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        Some(self.lengths[self.head_frame % self.capacity_frames()])
    }

    /// Copy of up to `max_bytes` from the start of the oldest published frame.
    #[must_use]
    pub fn peek_prefix(&self, max_bytes: usize) -> Option<Vec<u8>> {
        let length = self.peek_length()?.min(max_bytes);
        let capacity = self.capacity_bytes();
        let start = self.read % capacity;
        let first = length.min(capacity - start);
        let mut bytes = Vec::with_capacity(length);
        bytes.extend_from_slice(&self.data[start..start + first]);
        bytes.extend_from_slice(&self.data[..length - first]);
        Some(bytes)
    }

    /// Copy of the oldest published frame.
    #[must_use]
    pub fn peek(&self) -> Option<Vec<u8>> {
        self.peek_prefix(usize::MAX)
    }

    /// Remove and return the oldest published frame.
    pub fn dequeue(&mut self) -> Option<Vec<u8>> {
        let bytes = self.peek()?;
        self.discard();
        Some(bytes)
    }

    /// Remove the oldest published frame, returning its length.
    pub fn discard(&mut self) -> Option<usize> {
        let length = self.peek_length()?;
        self.read += length;
        self.head_frame += 1;
        Some(length)
    }

    /// Empty the queue, including any frame in progress.
    pub fn clear(&mut self) {
        self.read = self.write;
        self.commit = self.write;
        self.head_frame = self.tail_frame;
    }
}
