// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The forwarding pipeline shared by the switch component and its staged
//! updates.

use std::rc::Rc;

use beat_engine::sim_error;
use beat_engine::types::{SimError, SimResult};
use beat_track::entity::Entity;
use beat_track::{debug, info, trace, warn};

use super::port::{Port, RxEvent};
use crate::address_table::{AddressLookup, LearnOutcome, build_table};
use crate::arbiter::{Arbitrate, build_arbiter};
use crate::config::{SwitchConfig, validate_frame_size, validate_watermarks};
use crate::error_vector::{ErrorBit, ErrorVector};
use crate::flow_control::{FcEvent, FlowControlConfig};
use crate::forwarding::{Decision, ForwardingPolicy};
use crate::frame::{HEADER_BYTES, Header, MacAddr};
use crate::maintenance::{ScrubEvent, ScrubTimer};
use crate::port_mask::PortMask;
use crate::registers::{Reg, RegAddr, STATS_RESET_ALL};
use crate::stats::{CounterId, PortStats, StatisticsBlock, TrafficCounter};
use crate::validator::{FrameLimits, RejectReason};

/// A change that becomes visible at the end of the tick.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Update {
    Learn {
        addr: MacAddr,
        port: usize,
    },
    Register {
        addr: RegAddr,
        value: u32,
    },
    TableEntry {
        slot: usize,
        addr: MacAddr,
        port: usize,
    },
}

pub(crate) struct SwitchState {
    entity: Rc<Entity>,
    pub ports: Vec<Port>,
    arbiters: Vec<Box<dyn Arbitrate>>,
    pub table: Box<dyn AddressLookup>,
    pub policy: ForwardingPolicy,
    pub stats: StatisticsBlock,
    traffic: TrafficCounter,
    pub errors: ErrorVector,
    pub scrub: ScrubTimer,
    limits: FrameLimits,
    flow_control: FlowControlConfig,
    latched: PortStats,
    stats_select: u32,
    core_clock_mhz: f64,
    now: u64,
}

impl SwitchState {
    pub fn new(entity: &Rc<Entity>, config: &SwitchConfig) -> Result<Self, SimError> {
        let num_ports = config.num_ports;
        let limits = config.frame_limits();
        let ports = (0..num_ports)
            .map(|i| {
                Port::new(
                    entity,
                    i,
                    config.port(i),
                    limits,
                    config.overflow_policy,
                    config.flow_control.clone(),
                )
            })
            .collect();

        let weights: Vec<usize> = (0..num_ports).map(|i| config.port(i).weight).collect();
        let arbiters = (0..num_ports)
            .map(|_| build_arbiter(config.arbiter, &weights))
            .collect::<Result<Vec<_>, SimError>>()?;

        let mut policy = ForwardingPolicy::open(num_ports);
        policy.learn_enable = config.learn_enable;
        for i in 0..num_ports {
            let port = config.port(i);
            if !port.enabled {
                policy.enabled.remove(i);
            }
            if port.promiscuous {
                policy.promiscuous.insert(i);
            }
            if !port.miss_bcast {
                policy.miss_bcast.remove(i);
            }
        }

        Ok(Self {
            entity: entity.clone(),
            ports,
            arbiters,
            table: build_table(config.table_kind, config.table_capacity)?,
            policy,
            stats: StatisticsBlock::new(num_ports),
            traffic: TrafficCounter::default(),
            errors: ErrorVector::default(),
            scrub: ScrubTimer::new(config.scrub_interval_ticks),
            limits,
            flow_control: config.flow_control.clone(),
            latched: PortStats::default(),
            stats_select: 0,
            core_clock_mhz: config.core_clock_mhz,
            now: 0,
        })
    }

    pub fn num_ports(&self) -> usize {
        self.ports.len()
    }

    /// Advance every port by one tick, returning the sources to learn.
    pub fn tick(&mut self, now: u64) -> Vec<(MacAddr, usize)> {
        self.now = now;
        let mut learns = Vec::new();
        self.scrub_tick(now);
        self.receive(now, &mut learns);
        self.head_of_line();
        self.arbitrate();
        self.flow_control(now);
        self.transmit(now);
        learns
    }

    fn scrub_tick(&mut self, now: u64) {
        match self.scrub.tick(now) {
            Some(ScrubEvent::Requested) => info!(self.entity ; "scrub requested"),
            Some(ScrubEvent::Overrun) => {
                self.errors.raise(ErrorBit::ScrubOverrun);
                warn!(self.entity ; "scrub request overrun");
            }
            None => {}
        }
    }

    fn receive(&mut self, now: u64, learns: &mut Vec<(MacAddr, usize)>) {
        for p in 0..self.ports.len() {
            match self.ports[p].receive(now) {
                RxEvent::Idle => {}
                RxEvent::Stalled => self.stats.increment(p, CounterId::AdmissionStall),
                RxEvent::Overflow => {
                    self.stats.increment(p, CounterId::DropIngressOverflow);
                    self.errors.raise(ErrorBit::IngressOverflow);
                    warn!(self.ports[p].entity ; "ingress overflow, frame dropped");
                }
                RxEvent::Rejected(reason) => {
                    let (counter, bit) = match reason {
                        RejectReason::Runt => (CounterId::DropRunt, ErrorBit::Runt),
                        RejectReason::Oversize => (CounterId::DropOversize, ErrorBit::Oversize),
                        RejectReason::ChecksumMismatch => {
                            (CounterId::DropChecksum, ErrorBit::Checksum)
                        }
                    };
                    self.stats.increment(p, counter);
                    self.errors.raise(bit);
                    debug!(self.ports[p].entity ; "dropped frame: {}", reason);
                }
                RxEvent::Accepted { len, header, pause } => {
                    self.accept(p, now, len, &header, pause, learns);
                }
            }
        }
    }

    fn accept(
        &mut self,
        p: usize,
        now: u64,
        len: usize,
        header: &Header,
        pause: Option<u16>,
        learns: &mut Vec<(MacAddr, usize)>,
    ) {
        // PAUSE is consumed by MAC control and only counted as such
        if let Some(quanta) = pause {
            let port = &mut self.ports[p];
            port.ingress.revert();
            port.fcu.receive_pause(now, quanta);
            self.stats.increment(p, CounterId::PauseReceived);
            debug!(port.entity ; "peer requested pause of {} quanta", quanta);
            return;
        }

        self.stats.increment(p, CounterId::RxFrames);
        self.stats.add(p, CounterId::RxBytes, len as u64);
        if header.dst.is_multicast() {
            self.stats.increment(p, CounterId::RxBroadcastFrames);
            self.stats.add(p, CounterId::RxBroadcastBytes, len as u64);
        }
        self.traffic.observe(header.ethertype);

        let port = &mut self.ports[p];
        if port.ingress.commit().is_err() {
            port.ingress.revert();
            self.stats.increment(p, CounterId::DropIngressOverflow);
            self.errors.raise(ErrorBit::IngressOverflow);
            warn!(port.entity ; "no descriptor for frame, dropped");
            return;
        }
        trace!(port.entity ; "committed {} byte frame {} -> {}", len, header.src, header.dst);
        if self.policy.should_learn(p, header) {
            learns.push((header.src, p));
        }
    }

    /// Decide the destinations of each port's oldest committed frame.
    fn head_of_line(&mut self) {
        for p in 0..self.ports.len() {
            let port = &mut self.ports[p];
            if port.hol.is_some() {
                continue;
            }
            let Some(len) = port.ingress.peek_length() else {
                continue;
            };
            let decision = match port
                .ingress
                .peek_prefix(HEADER_BYTES)
                .and_then(|prefix| Header::parse(&prefix))
            {
                Some(header) => self.policy.decide(p, &header, self.table.as_ref()),
                None => Decision::Drop,
            };
            match decision {
                Decision::Drop => {
                    port.ingress.discard();
                    self.stats.increment(p, CounterId::DropNoDestination);
                    debug!(port.entity ; "no destination for {} byte frame", len);
                }
                Decision::Consume => {
                    port.ingress.discard();
                    debug!(port.entity ; "consumed MAC control frame");
                }
                Decision::Forward { ports, flooded } => {
                    if flooded {
                        self.stats.increment(p, CounterId::Flooded);
                    }
                    trace!(port.entity ; "forward {} bytes to {}", len, ports);
                    port.last_targets = ports;
                    port.hol = Some(super::port::HeadOfLine {
                        pending: ports,
                        len,
                    });
                }
            }
        }
    }

    /// Grant at most one ingress port per egress port.
    fn arbitrate(&mut self) {
        let num_ports = self.ports.len();
        let mut ready = vec![false; num_ports];
        for e in 0..num_ports {
            for i in 0..num_ports {
                ready[i] = false;
                let Some(hol) = self.ports[i].hol else {
                    continue;
                };
                if !hol.pending.contains(e) {
                    continue;
                }
                if self.ports[e].egress.too_large(hol.len) {
                    self.clear_pending(i, e);
                    self.stats.increment(e, CounterId::DropEgressOverflow);
                    self.errors.raise(ErrorBit::EgressOverflow);
                    warn!(self.ports[e].entity ; "{} byte frame from port {} can never be queued", hol.len, i);
                    continue;
                }
                ready[i] = self.ports[e].egress.can_accept(hol.len);
            }
            if let Some(granted) = self.arbiters[e].arbitrate(&self.ports[e].entity, &ready) {
                self.forward(granted, e);
            }
        }

        for port in &mut self.ports {
            if port.hol.is_some_and(|hol| hol.pending.is_empty()) {
                port.ingress.discard();
                port.hol = None;
            }
        }
    }

    fn clear_pending(&mut self, ingress: usize, egress: usize) {
        if let Some(hol) = self.ports[ingress].hol.as_mut() {
            hol.pending.remove(egress);
        }
    }

    fn forward(&mut self, ingress: usize, egress: usize) {
        let Some(bytes) = self.ports[ingress].ingress.peek() else {
            return;
        };
        self.clear_pending(ingress, egress);
        let port = &mut self.ports[egress];
        match port.egress.offer(&bytes) {
            Ok(0) => trace!(port.entity ; "queued {} bytes from port {}", bytes.len(), ingress),
            Ok(evicted) => {
                self.stats
                    .add(egress, CounterId::DropEgressOverflow, evicted as u64);
                self.errors.raise(ErrorBit::EgressOverflow);
                warn!(port.entity ; "evicted {} frames for frame from port {}", evicted, ingress);
            }
            Err(e) => {
                self.stats.increment(egress, CounterId::DropEgressOverflow);
                self.errors.raise(ErrorBit::EgressOverflow);
                warn!(port.entity ; "frame from port {} dropped: {}", ingress, e);
            }
        }
    }

    fn flow_control(&mut self, now: u64) {
        for p in 0..self.ports.len() {
            let occupancy = self.ports[p]
                .last_targets
                .iter()
                .map(|e| self.ports[e].egress.occupancy_percent())
                .max()
                .unwrap_or(0);
            let port = &mut self.ports[p];
            match port.fcu.observe(now, occupancy) {
                Some(FcEvent::Assert(quanta)) => {
                    debug!(port.entity ; "pause {} quanta at {}% occupancy", quanta, occupancy);
                    port.pending_pause = Some(quanta);
                }
                Some(FcEvent::Release) => {
                    debug!(port.entity ; "release pause at {}% occupancy", occupancy);
                    port.pending_pause = Some(0);
                }
                Some(FcEvent::Timeout) => {
                    warn!(port.entity ; "pause timed out at {}% occupancy", occupancy);
                    port.pending_pause = Some(0);
                    self.stats.increment(p, CounterId::PauseTimeout);
                    self.errors.raise(ErrorBit::PauseTimeout);
                }
                None => {}
            }
        }
    }

    fn transmit(&mut self, now: u64) {
        for p in 0..self.ports.len() {
            let enabled = self.policy.enabled.contains(p);
            let Some(done) = self.ports[p].transmit(now, enabled) else {
                continue;
            };
            if done.pause {
                self.stats.increment(p, CounterId::PauseSent);
            } else {
                self.stats.increment(p, CounterId::TxFrames);
                self.stats.add(p, CounterId::TxBytes, done.len as u64);
            }
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.ports.iter().all(Port::is_idle)
    }

    /// Apply staged updates: learns in port order first, then everything
    /// else in the order it was issued.
    pub fn apply(&mut self, updates: Vec<Update>) {
        let (learns, writes): (Vec<_>, Vec<_>) = updates
            .into_iter()
            .partition(|u| matches!(u, Update::Learn { .. }));
        for update in learns.into_iter().chain(writes) {
            match update {
                Update::Learn { addr, port } => self.learn(addr, port),
                Update::Register { addr, value } => self.write_register(addr, value),
                Update::TableEntry { slot, addr, port } => {
                    if let Err(e) = self.table.write_slot(slot, addr, port) {
                        warn!(self.entity ; "table write ignored: {}", e);
                    }
                }
            }
        }
    }

    fn learn(&mut self, addr: MacAddr, port: usize) {
        match self.table.learn(addr, port) {
            LearnOutcome::Inserted { slot } => {
                trace!(self.entity ; "learned {} on port {} (slot {})", addr, port, slot);
            }
            LearnOutcome::Refreshed { .. } => {}
            LearnOutcome::Moved { from, .. } => {
                debug!(self.entity ; "{} moved from port {} to port {}", addr, from, port);
            }
            LearnOutcome::Evicted {
                victim,
                victim_port,
                ..
            } => {
                self.errors.raise(ErrorBit::TableFull);
                warn!(self.entity ; "table full: evicted {} (port {}) for {}", victim, victim_port, addr);
            }
        }
    }

    /// Drop every frame waiting on a port that has just been disabled.
    fn flush_disabled(&mut self, disabled: PortMask) {
        for e in disabled.iter() {
            let port = &mut self.ports[e];
            let flushed = port.egress.num_frames();
            port.egress.clear();
            if flushed > 0 {
                self.stats
                    .add(e, CounterId::DropPortDisabled, flushed as u64);
                warn!(port.entity ; "disabled with {} frames queued, dropped", flushed);
            }
        }
        for port in &mut self.ports {
            let Some(hol) = port.hol.as_mut() else {
                continue;
            };
            let lost = hol.pending & disabled;
            for e in lost.iter() {
                hol.pending.remove(e);
                self.stats.increment(e, CounterId::DropPortDisabled);
            }
            if !lost.is_empty() {
                debug!(port.entity ; "head-of-line frame lost disabled ports {}", lost);
            }
        }
    }

    fn port_mask(&self, value: u32) -> PortMask {
        PortMask::from_bits(value) & self.policy.all_ports()
    }

    fn set_flow_control(&mut self, flow_control: FlowControlConfig) {
        for port in &mut self.ports {
            port.fcu.set_config(flow_control.clone());
        }
        self.flow_control = flow_control;
    }

    fn set_limits(&mut self, limits: FrameLimits) {
        for port in &mut self.ports {
            port.set_limits(limits);
        }
        self.limits = limits;
    }

    /// Reject a write that could never be applied.
    pub fn check_write(&self, addr: RegAddr, value: u32) -> SimResult {
        addr.check_write()?;
        let num_ports = self.num_ports();
        match addr {
            RegAddr::Fixed(Reg::FrameSize) => {
                validate_frame_size((value & 0xFFFF) as usize, (value >> 16) as usize)
            }
            RegAddr::Fixed(Reg::FcHighWater) => {
                validate_watermarks(value, self.flow_control.low_water_percent)
            }
            RegAddr::Fixed(Reg::FcLowWater) => {
                validate_watermarks(self.flow_control.high_water_percent, value)
            }
            RegAddr::Fixed(Reg::StatsSelect) if value == STATS_RESET_ALL => Ok(()),
            RegAddr::Fixed(Reg::StatsSelect | Reg::StatsReset) if value as usize >= num_ports => {
                sim_error!(format!("Port {value} out of range ({num_ports} ports)"))
            }
            _ => Ok(()),
        }
    }

    fn write_register(&mut self, addr: RegAddr, value: u32) {
        debug!(self.entity ; "write {:?} = 0x{:08x}", addr, value);
        let reg = match addr {
            RegAddr::Fixed(reg) => reg,
            RegAddr::Isolation(p) => {
                let mask = self.port_mask(value);
                if let Some(isolation) = self.policy.isolation.get_mut(p) {
                    *isolation = mask;
                }
                return;
            }
            RegAddr::StatsData(_) => return,
        };

        match reg {
            Reg::Promisc => self.policy.promiscuous = self.port_mask(value),
            Reg::PortEnable => {
                let enabled = self.port_mask(value);
                let disabled = PortMask::from_bits(self.policy.enabled.bits() & !enabled.bits());
                self.policy.enabled = enabled;
                self.flush_disabled(disabled);
            }
            Reg::MissBcast => self.policy.miss_bcast = self.port_mask(value),
            Reg::LearnEnable => self.policy.learn_enable = value & 1 != 0,
            Reg::PktCount => self.traffic.set_filter(value as u16),
            Reg::FrameSize => {
                let limits = FrameLimits {
                    min_bytes: (value & 0xFFFF) as usize,
                    max_bytes: (value >> 16) as usize,
                    ..self.limits
                };
                self.set_limits(limits);
            }
            Reg::Jumbo => {
                let limits = FrameLimits {
                    jumbo: value & 1 != 0,
                    ..self.limits
                };
                self.set_limits(limits);
            }
            Reg::FcHighWater | Reg::FcLowWater | Reg::FcMaxAssert => {
                let mut flow_control = self.flow_control.clone();
                match reg {
                    Reg::FcHighWater => flow_control.high_water_percent = value,
                    Reg::FcLowWater => flow_control.low_water_percent = value,
                    _ => flow_control.max_assert_ticks = value as u64,
                }
                if let Err(e) = validate_watermarks(
                    flow_control.high_water_percent,
                    flow_control.low_water_percent,
                ) {
                    warn!(self.entity ; "flow-control write ignored: {}", e);
                    return;
                }
                self.set_flow_control(flow_control);
            }
            Reg::ErrorVector => self.errors.write_one_to_clear(value),
            Reg::ErrorMask => self.errors.set_interrupt_mask(value),
            Reg::TableClear => {
                info!(self.entity ; "address table cleared");
                self.table.clear();
            }
            Reg::ScrubInterval => self.scrub.set_interval(self.now, value as u64),
            Reg::ScrubStatus => {
                if value & 1 != 0 {
                    self.scrub.acknowledge();
                }
            }
            Reg::StatsSelect => {
                if value == STATS_RESET_ALL {
                    self.stats.reset_all();
                    self.latched = PortStats::default();
                } else if let Ok(snapshot) = self.stats.snapshot(value as usize) {
                    self.latched = snapshot;
                    self.stats_select = value;
                }
            }
            Reg::StatsReset => {
                if let Err(e) = self.stats.reset_port(value as usize) {
                    warn!(self.entity ; "{}", e);
                }
            }
            Reg::PortCount
            | Reg::Datapath
            | Reg::CoreClock
            | Reg::MacCount
            | Reg::TableOccupancy => {}
        }
    }

    pub fn read_register(&mut self, addr: RegAddr) -> u32 {
        let reg = match addr {
            RegAddr::Fixed(reg) => reg,
            RegAddr::StatsData(id) => return self.latched.get(id) as u32,
            RegAddr::Isolation(p) => {
                return self.policy.isolation.get(p).map_or(0, PortMask::bits);
            }
        };
        match reg {
            Reg::PortCount => self.num_ports() as u32,
            Reg::Datapath => self.ports.first().map_or(0, |p| p.bytes_per_tick() as u32),
            Reg::CoreClock => self.core_clock_mhz as u32,
            Reg::MacCount => self.table.capacity() as u32,
            Reg::Promisc => self.policy.promiscuous.bits(),
            Reg::PortEnable => self.policy.enabled.bits(),
            Reg::PktCount => self.traffic.read_and_clear(),
            Reg::FrameSize => self.limits.min_bytes as u32 | (self.limits.max_bytes as u32) << 16,
            Reg::MissBcast => self.policy.miss_bcast.bits(),
            Reg::LearnEnable => self.policy.learn_enable as u32,
            Reg::Jumbo => self.limits.jumbo as u32,
            Reg::FcHighWater => self.flow_control.high_water_percent,
            Reg::FcLowWater => self.flow_control.low_water_percent,
            Reg::FcMaxAssert => self.flow_control.max_assert_ticks.min(u32::MAX as u64) as u32,
            Reg::ErrorVector => self.errors.value(),
            Reg::ErrorMask => self.errors.interrupt_mask(),
            Reg::TableOccupancy => self.table.len() as u32,
            Reg::ScrubInterval => self.scrub.interval().min(u32::MAX as u64) as u32,
            Reg::ScrubStatus => self.scrub.pending() as u32,
            Reg::StatsSelect => self.stats_select,
            Reg::TableClear | Reg::StatsReset => 0,
        }
    }
}
