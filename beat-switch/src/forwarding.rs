// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Destination port selection.

use crate::address_table::AddressLookup;
use crate::frame::Header;
use crate::port_mask::PortMask;

/// Outcome of a forwarding decision for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Invalid addressing, or no port left to send to.
    Drop,
    /// Addressed to the switch itself.
    Consume,
    Forward {
        ports: PortMask,
        /// The frame was flooded rather than sent to a learned port.
        flooded: bool,
    },
}

/// Port-level forwarding controls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardingPolicy {
    pub num_ports: usize,
    pub enabled: PortMask,
    /// Ports that receive a copy of every forwarded frame.
    pub promiscuous: PortMask,
    /// Ports that receive frames for unknown unicast destinations.
    pub miss_bcast: PortMask,
    /// Ports each ingress port may send to.
    pub isolation: Vec<PortMask>,
    pub learn_enable: bool,
}

impl ForwardingPolicy {
    /// Everything enabled, nothing isolated.
    #[must_use]
    pub fn open(num_ports: usize) -> Self {
        let all = PortMask::all(num_ports);
        Self {
            num_ports,
            enabled: all,
            promiscuous: PortMask::EMPTY,
            miss_bcast: all,
            isolation: vec![all; num_ports],
            learn_enable: true,
        }
    }

    #[must_use]
    pub fn all_ports(&self) -> PortMask {
        PortMask::all(self.num_ports)
    }

    /// Whether the source of a frame received on `ingress` should be learned.
    #[must_use]
    pub fn should_learn(&self, ingress: usize, header: &Header) -> bool {
        self.learn_enable && self.enabled.contains(ingress) && header.src.is_unicast()
    }

    pub fn decide(&self, ingress: usize, header: &Header, table: &dyn AddressLookup) -> Decision {
        if !header.src.is_unicast() || header.dst.is_none() {
            return Decision::Drop;
        }
        if header.dst.is_swcontrol() {
            return Decision::Consume;
        }

        let (mut ports, flooded) = if header.dst.is_multicast() {
            (self.all_ports(), true)
        } else {
            match table.lookup(&header.dst) {
                Some(port) => (PortMask::single(port), false),
                None => (self.miss_bcast, true),
            }
        };

        ports |= self.promiscuous;
        if self.enabled.contains(ingress) {
            ports &= self.isolation[ingress] & self.enabled;
        } else {
            ports = PortMask::EMPTY;
        }
        ports.remove(ingress);

        if ports.is_empty() {
            Decision::Drop
        } else {
            Decision::Forward { ports, flooded }
        }
    }
}
