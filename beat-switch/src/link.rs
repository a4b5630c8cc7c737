// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The station at the far end of each switch port.
//!
//! A [`Peer`] holds the frames it still has to send to the switch and
//! captures every frame the switch sends to it. Frames towards the switch
//! are offered a beat at a time; the switch decides how much of each beat it
//! takes, which is how ingress backpressure reaches the peer.

use std::collections::VecDeque;
use std::rc::Rc;

use beat_track::entity::Entity;
use beat_track::id::Unique;
use beat_track::{debug, exit};

use crate::flow_control::ticks_per_quantum;
use crate::frame::Frame;

/// A slice of the frame currently being sent.
pub struct Beat<'a> {
    pub bytes: &'a [u8],
    /// This beat ends the frame.
    pub last: bool,
}

pub struct Peer {
    pub entity: Rc<Entity>,
    honors_pause: bool,
    can_stall: bool,
    ticks_per_quantum: u64,
    to_switch: VecDeque<Frame>,
    offset: usize,
    paused_until: u64,
    received: Vec<Frame>,
    pauses_received: u64,
}

impl Peer {
    #[must_use]
    pub fn new(
        parent: &Rc<Entity>,
        name: &str,
        bytes_per_tick: usize,
        honors_pause: bool,
        can_stall: bool,
    ) -> Self {
        Self {
            entity: Rc::new(Entity::new(parent, name)),
            honors_pause,
            can_stall,
            ticks_per_quantum: ticks_per_quantum(bytes_per_tick),
            to_switch: VecDeque::new(),
            offset: 0,
            paused_until: 0,
            received: Vec::new(),
            pauses_received: 0,
        }
    }

    #[must_use]
    pub fn can_stall(&self) -> bool {
        self.can_stall
    }

    /// Queue a frame to be sent to the switch.
    pub fn send(&mut self, frame: Frame) {
        self.to_switch.push_back(frame);
    }

    /// Frames not yet completely sent.
    #[must_use]
    pub fn num_pending(&self) -> usize {
        self.to_switch.len()
    }

    /// Between frames.
    #[must_use]
    pub fn at_frame_start(&self) -> bool {
        self.offset == 0
    }

    #[must_use]
    pub fn is_paused(&self, now: u64) -> bool {
        now < self.paused_until
    }

    /// The next `max_bytes` of the current frame. A paused peer only stops
    /// at a frame boundary.
    #[must_use]
    pub fn next_beat(&self, now: u64, max_bytes: usize) -> Option<Beat<'_>> {
        if self.at_frame_start() && self.is_paused(now) {
            return None;
        }
        let frame = self.to_switch.front()?;
        let end = (self.offset + max_bytes).min(frame.len());
        Some(Beat {
            bytes: &frame.bytes()[self.offset..end],
            last: end == frame.len(),
        })
    }

    /// The switch has taken `num_bytes` of the current beat.
    pub fn advance(&mut self, num_bytes: usize) {
        let Some(frame) = self.to_switch.front() else {
            return;
        };
        self.offset += num_bytes;
        if self.offset >= frame.len() {
            exit!(self.entity ; frame.id());
            self.to_switch.pop_front();
            self.offset = 0;
        }
    }

    /// A frame has arrived from the switch.
    pub fn receive(&mut self, now: u64, frame: Frame) {
        if let Some(quanta) = frame.pause_quanta() {
            self.pauses_received += 1;
            if self.honors_pause {
                debug!(self.entity ; "pause for {} quanta", quanta);
                self.paused_until = now + quanta as u64 * self.ticks_per_quantum;
            }
        }
        self.received.push(frame);
    }

    /// Take every frame received so far, PAUSE frames included.
    pub fn take_received(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.received)
    }

    #[must_use]
    pub fn num_received(&self) -> usize {
        self.received.len()
    }

    #[must_use]
    pub fn pauses_received(&self) -> u64 {
        self.pauses_received
    }
}
