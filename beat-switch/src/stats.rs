// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Per-port statistics.
//!
//! Counters only ever increase; the only way to lower one is an explicit
//! reset. Reads return a copy of all counters for a port taken at a single
//! point in time.

use std::fmt;

use beat_engine::sim_error;
use beat_engine::types::SimError;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::frame::EtherType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum CounterId {
    RxFrames = 0,
    RxBytes,
    /// Broadcast and multicast frames received.
    RxBroadcastFrames,
    RxBroadcastBytes,
    TxFrames,
    TxBytes,
    DropRunt,
    DropOversize,
    DropChecksum,
    DropIngressOverflow,
    DropEgressOverflow,
    DropNoDestination,
    /// Ticks on which ingress held its peer off.
    AdmissionStall,
    Flooded,
    PauseSent,
    PauseReceived,
    PauseTimeout,
    /// Frames queued for, or waiting on, a port when it was disabled.
    DropPortDisabled,
}

pub const NUM_COUNTERS: usize = CounterId::DropPortDisabled as usize + 1;

impl CounterId {
    pub fn all() -> impl Iterator<Item = CounterId> {
        (0..NUM_COUNTERS).filter_map(CounterId::from_usize)
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A consistent copy of every counter of one port.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortStats {
    counters: [u64; NUM_COUNTERS],
}

impl PortStats {
    #[must_use]
    pub fn get(&self, id: CounterId) -> u64 {
        self.counters[id as usize]
    }

    /// Total frames dropped for any reason.
    #[must_use]
    pub fn total_drops(&self) -> u64 {
        [
            CounterId::DropRunt,
            CounterId::DropOversize,
            CounterId::DropChecksum,
            CounterId::DropIngressOverflow,
            CounterId::DropEgressOverflow,
            CounterId::DropNoDestination,
            CounterId::DropPortDisabled,
        ]
        .iter()
        .map(|id| self.get(*id))
        .sum()
    }

    fn add(&mut self, id: CounterId, amount: u64) {
        let counter = &mut self.counters[id as usize];
        *counter = counter.saturating_add(amount);
    }
}

impl std::ops::Add for PortStats {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        for (a, b) in self.counters.iter_mut().zip(rhs.counters.iter()) {
            *a = a.saturating_add(*b);
        }
        self
    }
}

pub struct StatisticsBlock {
    ports: Vec<PortStats>,
}

impl StatisticsBlock {
    #[must_use]
    pub fn new(num_ports: usize) -> Self {
        Self {
            ports: vec![PortStats::default(); num_ports],
        }
    }

    pub fn increment(&mut self, port: usize, id: CounterId) {
        self.add(port, id, 1);
    }

    pub fn add(&mut self, port: usize, id: CounterId, amount: u64) {
        if let Some(stats) = self.ports.get_mut(port) {
            stats.add(id, amount);
        }
    }

    pub fn snapshot(&self, port: usize) -> Result<PortStats, SimError> {
        match self.ports.get(port) {
            Some(stats) => Ok(*stats),
            None => sim_error!(format!("No statistics for port {port}")),
        }
    }

    /// Sum of all ports.
    #[must_use]
    pub fn totals(&self) -> PortStats {
        self.ports
            .iter()
            .fold(PortStats::default(), |acc, stats| acc + *stats)
    }

    pub fn reset_port(&mut self, port: usize) -> Result<(), SimError> {
        match self.ports.get_mut(port) {
            Some(stats) => {
                *stats = PortStats::default();
                Ok(())
            }
            None => sim_error!(format!("No statistics for port {port}")),
        }
    }

    pub fn reset_all(&mut self) {
        self.ports.fill(PortStats::default());
    }
}

/// Switch-wide count of frames matching an EtherType filter.
///
/// Reading the count clears it.
#[derive(Default)]
pub struct TrafficCounter {
    /// Zero matches every frame.
    filter: u16,
    count: u32,
}

impl TrafficCounter {
    #[must_use]
    pub fn filter(&self) -> u16 {
        self.filter
    }

    /// Change the filter and start counting again.
    pub fn set_filter(&mut self, filter: u16) {
        self.filter = filter;
        self.count = 0;
    }

    pub fn observe(&mut self, ethertype: EtherType) {
        if self.filter == 0 || self.filter == ethertype.0 {
            self.count = self.count.saturating_add(1);
        }
    }

    pub fn read_and_clear(&mut self) -> u32 {
        std::mem::take(&mut self.count)
    }
}
