// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Datapath state of one switch port.
//!
//! A port owns both directions of its link: the receive side (validator and
//! ingress queue) and the transmit side (egress queue, flow-control unit and
//! the frame currently on the wire).

use std::rc::Rc;

use beat_track::entity::Entity;
use beat_track::trace;

use crate::commit_queue::CommitQueue;
use crate::config::PortConfig;
use crate::egress::{EgressQueue, OverflowPolicy};
use crate::flow_control::{FlowControlConfig, FlowControlUnit};
use crate::frame::{Frame, HEADER_BYTES, Header, MacAddr, pause_quanta};
use crate::link::Peer;
use crate::port_mask::PortMask;
use crate::validator::{FrameLimits, FrameValidator, RejectReason, Verdict};

/// Enough of a frame to recognise a PAUSE request.
const PAUSE_PREFIX_BYTES: usize = HEADER_BYTES + 4;

/// Source address the switch uses for frames it originates on `port`.
#[must_use]
pub fn switch_port_mac(port: usize) -> MacAddr {
    MacAddr::from_u64(0x02BE_A7FF_0000 | port as u64)
}

/// Outcome of one tick of the receive side.
pub(crate) enum RxEvent {
    Idle,
    /// The peer was held off.
    Stalled,
    /// The frame in progress was dropped because ingress could not hold it.
    Overflow,
    Rejected(RejectReason),
    /// A whole valid frame is waiting in the speculative region of the
    /// ingress queue to be committed or reverted.
    Accepted {
        len: usize,
        header: Header,
        pause: Option<u16>,
    },
}

/// The oldest committed ingress frame once its destinations are known.
#[derive(Clone, Copy, Debug)]
pub(crate) struct HeadOfLine {
    /// Egress ports still to be granted.
    pub pending: PortMask,
    pub len: usize,
}

pub(crate) struct TxDone {
    pub len: usize,
    pub pause: bool,
}

struct TxFrame {
    frame: Frame,
    sent: usize,
    pause: bool,
}

pub(crate) struct Port {
    pub entity: Rc<Entity>,
    mac: MacAddr,
    bytes_per_tick: usize,
    pub peer: Peer,
    validator: FrameValidator,
    rx_prefix: Vec<u8>,
    rx_dropping: bool,
    pub ingress: CommitQueue,
    pub hol: Option<HeadOfLine>,
    /// Destinations of the most recent head-of-line frame.
    pub last_targets: PortMask,
    pub egress: EgressQueue,
    pub fcu: FlowControlUnit,
    pub pending_pause: Option<u16>,
    tx: Option<TxFrame>,
}

impl Port {
    pub fn new(
        parent: &Rc<Entity>,
        index: usize,
        config: &PortConfig,
        limits: FrameLimits,
        overflow_policy: OverflowPolicy,
        flow_control: FlowControlConfig,
    ) -> Self {
        let entity = Rc::new(Entity::new(parent, &format!("port{index}")));
        let peer = Peer::new(
            &entity,
            "peer",
            config.bytes_per_tick,
            config.honors_pause,
            config.can_stall,
        );
        Self {
            mac: switch_port_mac(index),
            bytes_per_tick: config.bytes_per_tick,
            peer,
            validator: FrameValidator::new(limits),
            rx_prefix: Vec::with_capacity(PAUSE_PREFIX_BYTES),
            rx_dropping: false,
            ingress: CommitQueue::new(config.ingress_bytes, config.ingress_frames),
            hol: None,
            last_targets: PortMask::EMPTY,
            egress: EgressQueue::new(config.egress_bytes, config.egress_frames, overflow_policy),
            fcu: FlowControlUnit::new(flow_control, config.bytes_per_tick),
            pending_pause: None,
            tx: None,
            entity,
        }
    }

    #[must_use]
    pub fn bytes_per_tick(&self) -> usize {
        self.bytes_per_tick
    }

    pub fn set_limits(&mut self, limits: FrameLimits) {
        self.validator.set_limits(limits);
    }

    /// Take at most one beat from the peer.
    pub fn receive(&mut self, now: u64) -> RxEvent {
        let Some(beat) = self.peer.next_beat(now, self.bytes_per_tick) else {
            return RxEvent::Idle;
        };
        let (len, last) = (beat.bytes.len(), beat.last);

        if self.rx_dropping {
            self.peer.advance(len);
            self.rx_dropping = !last;
            return RxEvent::Idle;
        }

        if self.validator.is_empty() && self.fcu.is_degraded() && self.peer.can_stall() {
            return RxEvent::Stalled;
        }

        if self.ingress.write_slice(beat.bytes).is_err() {
            let never_fits =
                self.ingress.speculative_bytes() + len > self.ingress.capacity_bytes();
            if self.peer.can_stall() && !never_fits {
                return RxEvent::Stalled;
            }
            self.abandon_frame(last);
            self.peer.advance(len);
            return RxEvent::Overflow;
        }

        self.validator.push_slice(beat.bytes);
        let room = PAUSE_PREFIX_BYTES.saturating_sub(self.rx_prefix.len());
        self.rx_prefix
            .extend_from_slice(&beat.bytes[..room.min(len)]);
        self.peer.advance(len);
        trace!(self.entity ; "rx {} bytes", len);

        if self.validator.is_oversize() {
            self.abandon_frame(last);
            return RxEvent::Rejected(RejectReason::Oversize);
        }
        if !last {
            return RxEvent::Idle;
        }

        let header = self.validator.header();
        let verdict = self.validator.finish();
        let pause = pause_quanta(&self.rx_prefix);
        self.rx_prefix.clear();
        match (verdict, header) {
            (Verdict::Accept, Some(header)) => RxEvent::Accepted {
                len: self.ingress.speculative_bytes(),
                header,
                pause,
            },
            (Verdict::Accept, None) => {
                self.ingress.revert();
                RxEvent::Rejected(RejectReason::Runt)
            }
            (Verdict::Reject(reason), _) => {
                self.ingress.revert();
                RxEvent::Rejected(reason)
            }
        }
    }

    /// Drop the frame in progress, ignoring the rest of it unless `last`.
    fn abandon_frame(&mut self, last: bool) {
        self.ingress.revert();
        self.validator.reset();
        self.rx_prefix.clear();
        self.rx_dropping = !last;
    }

    /// Move one beat of the frame being transmitted, starting a new frame if
    /// the link is free. Returns the frame that completed, if any.
    pub fn transmit(&mut self, now: u64, enabled: bool) -> Option<TxDone> {
        if self.tx.is_none() {
            if let Some(quanta) = self.pending_pause.take() {
                self.tx = Some(TxFrame {
                    frame: Frame::pause(&self.entity, self.mac, quanta),
                    sent: 0,
                    pause: true,
                });
            } else if enabled && self.fcu.tx_allowed(now) {
                if let Some(bytes) = self.egress.pop() {
                    self.tx = Some(TxFrame {
                        frame: Frame::new(&self.entity, bytes),
                        sent: 0,
                        pause: false,
                    });
                }
            }
        }

        let tx = self.tx.as_mut()?;
        tx.sent += self.bytes_per_tick;
        if tx.sent < tx.frame.len() {
            return None;
        }
        let tx = self.tx.take()?;
        let done = TxDone {
            len: tx.frame.len(),
            pause: tx.pause,
        };
        self.peer.receive(now, tx.frame);
        Some(done)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.peer.num_pending() == 0
            && self.validator.is_empty()
            && !self.rx_dropping
            && self.ingress.is_idle()
            && self.hol.is_none()
            && self.egress.is_empty()
            && self.tx.is_none()
            && self.pending_pause.is_none()
            && self.fcu.is_idle()
    }
}
