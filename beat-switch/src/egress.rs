// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Per-port egress queue.
//!
//! Written only by the output arbiter and read only by the port's transmit
//! process. Frames arrive whole, so every write is immediately committed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::commit_queue::{CommitQueue, QueueError};

/// What to do when a granted frame does not fit.
#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Refuse the grant and leave the frame queued at ingress
    #[default]
    DropNewest,

    /// Evict frames from the head of the queue to make room
    DropOldest,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

pub struct EgressQueue {
    queue: CommitQueue,
    policy: OverflowPolicy,
}

impl EgressQueue {
    #[must_use]
    pub fn new(capacity_bytes: usize, capacity_frames: usize, policy: OverflowPolicy) -> Self {
        Self {
            queue: CommitQueue::new(capacity_bytes, capacity_frames),
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Frames this long can never be queued.
    #[must_use]
    pub fn too_large(&self, num_bytes: usize) -> bool {
        num_bytes > self.queue.capacity_bytes()
    }

    /// Whether a frame of `num_bytes` would be accepted now.
    #[must_use]
    pub fn can_accept(&self, num_bytes: usize) -> bool {
        match self.policy {
            OverflowPolicy::DropNewest => self.queue.can_write(num_bytes),
            OverflowPolicy::DropOldest => !self.too_large(num_bytes),
        }
    }

    /// Queue a whole frame, returning how many older frames were evicted to
    /// make room for it.
    pub fn offer(&mut self, bytes: &[u8]) -> Result<usize, QueueError> {
        if self.too_large(bytes.len()) {
            return Err(QueueError::Full);
        }
        let mut evicted = 0;
        while !self.queue.can_write(bytes.len()) {
            if self.policy == OverflowPolicy::DropNewest || self.queue.discard().is_none() {
                return Err(QueueError::Full);
            }
            evicted += 1;
        }
        self.queue.write_slice(bytes)?;
        self.queue.commit()?;
        Ok(evicted)
    }

    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.queue.dequeue()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.queue.num_frames()
    }

    #[must_use]
    pub fn occupancy_bytes(&self) -> usize {
        self.queue.occupancy_bytes()
    }

    #[must_use]
    pub fn capacity_bytes(&self) -> usize {
        self.queue.capacity_bytes()
    }

    /// Fill level in percent, the greater of byte and frame occupancy.
    #[must_use]
    pub fn occupancy_percent(&self) -> u32 {
        let bytes = self.queue.occupancy_bytes() * 100 / self.queue.capacity_bytes();
        let frames = self.queue.num_frames() * 100 / self.queue.capacity_frames();
        bytes.max(frames) as u32
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
