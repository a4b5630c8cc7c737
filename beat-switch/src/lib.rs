// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The forwarding core of a small multi-port Ethernet L2 switch.
//!
//! Frames arrive from a [`Peer`](crate::link::Peer) on each port a beat at a
//! time. A [`FrameValidator`](crate::validator::FrameValidator) checks
//! length and FCS as the bytes are written speculatively into a
//! [`CommitQueue`](crate::commit_queue::CommitQueue); only whole valid
//! frames are ever committed. Source addresses are learned into an
//! [`AddressLookup`](crate::address_table::AddressLookup) table, each
//! committed frame is given a set of egress ports by the
//! [`ForwardingPolicy`](crate::forwarding::ForwardingPolicy), and every
//! egress port picks between competing ingress ports with an
//! [`Arbitrate`](crate::arbiter::Arbitrate) policy. Egress occupancy drives a
//! [`FlowControlUnit`](crate::flow_control::FlowControlUnit) per port which
//! pauses the peers feeding congestion.
//!
//! Everything is tied together by the [`Switch`](crate::switch::Switch)
//! component, which is configured and monitored through the
//! [`RegisterBus`](crate::registers::RegisterBus) trait.

pub mod address_table;
pub mod arbiter;
pub mod checksum;
pub mod commit_queue;
pub mod config;
pub mod egress;
pub mod error_vector;
pub mod flow_control;
pub mod forwarding;
pub mod frame;
pub mod link;
pub mod maintenance;
pub mod port_mask;
pub mod registers;
pub mod stats;
pub mod switch;
pub mod traffic;
pub mod validator;
