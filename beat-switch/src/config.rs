// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Switch configuration.
//!
//! All structures deserialise with defaults for missing fields so that a
//! configuration file only needs to name what it changes.

use beat_engine::sim_error;
use beat_engine::types::SimResult;
use serde::{Deserialize, Serialize};

use crate::address_table::{DEFAULT_TABLE_CAPACITY, TableKind};
use crate::arbiter::ArbiterKind;
use crate::checksum::FCS_BYTES;
use crate::egress::OverflowPolicy;
use crate::flow_control::FlowControlConfig;
use crate::frame::{HEADER_BYTES, MAX_FRAME_BYTES, MIN_FRAME_BYTES};
use crate::port_mask::MAX_PORTS;
use crate::validator::FrameLimits;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PortConfig {
    pub ingress_bytes: usize,
    pub ingress_frames: usize,
    pub egress_bytes: usize,
    pub egress_frames: usize,

    /// Datapath width: bytes moved per tick in each direction.
    pub bytes_per_tick: usize,

    /// The peer can be held off mid-frame when ingress is full. Otherwise
    /// the frame is dropped.
    pub can_stall: bool,

    /// The peer obeys PAUSE frames.
    pub honors_pause: bool,

    pub enabled: bool,
    pub promiscuous: bool,

    /// Receive frames for unknown unicast destinations.
    pub miss_bcast: bool,

    /// Weight for weighted round-robin arbitration.
    pub weight: usize,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            ingress_bytes: 8192,
            ingress_frames: 64,
            egress_bytes: 8192,
            egress_frames: 64,
            bytes_per_tick: 8,
            can_stall: true,
            honors_pause: true,
            enabled: true,
            promiscuous: false,
            miss_bcast: true,
            weight: 1,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SwitchConfig {
    pub num_ports: usize,

    /// Reported through the `CORE_CLOCK` register.
    pub core_clock_mhz: f64,

    pub table_kind: TableKind,
    pub table_capacity: usize,
    pub learn_enable: bool,

    pub min_frame_bytes: usize,
    pub max_frame_bytes: usize,
    pub jumbo: bool,

    pub arbiter: ArbiterKind,
    pub overflow_policy: OverflowPolicy,
    pub flow_control: FlowControlConfig,

    /// Ticks between scrub requests, zero to disable.
    pub scrub_interval_ticks: u64,

    /// Settings for any port not listed in `ports`.
    pub port_defaults: PortConfig,

    /// Per-port settings, by port index.
    pub ports: Vec<PortConfig>,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            num_ports: 4,
            core_clock_mhz: 125.0,
            table_kind: TableKind::default(),
            table_capacity: DEFAULT_TABLE_CAPACITY,
            learn_enable: true,
            min_frame_bytes: MIN_FRAME_BYTES,
            max_frame_bytes: MAX_FRAME_BYTES,
            jumbo: false,
            arbiter: ArbiterKind::default(),
            overflow_policy: OverflowPolicy::default(),
            flow_control: FlowControlConfig::default(),
            scrub_interval_ticks: 0,
            port_defaults: PortConfig::default(),
            ports: Vec::new(),
        }
    }
}

impl SwitchConfig {
    #[must_use]
    pub fn with_ports(num_ports: usize) -> Self {
        Self {
            num_ports,
            ..Default::default()
        }
    }

    /// Settings for `port`.
    #[must_use]
    pub fn port(&self, port: usize) -> &PortConfig {
        self.ports.get(port).unwrap_or(&self.port_defaults)
    }

    /// Mutable settings for `port`, creating explicit entries as needed.
    pub fn port_mut(&mut self, port: usize) -> &mut PortConfig {
        while self.ports.len() <= port {
            self.ports.push(self.port_defaults.clone());
        }
        &mut self.ports[port]
    }

    #[must_use]
    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            min_bytes: self.min_frame_bytes,
            max_bytes: self.max_frame_bytes,
            jumbo: self.jumbo,
        }
    }

    pub fn validate(&self) -> SimResult {
        if self.num_ports == 0 || self.num_ports > MAX_PORTS {
            return sim_error!(format!(
                "Number of ports must be between 1 and {MAX_PORTS}, got {}",
                self.num_ports
            ));
        }
        if self.ports.len() > self.num_ports {
            return sim_error!(format!(
                "{} port configurations given for {} ports",
                self.ports.len(),
                self.num_ports
            ));
        }
        if self.table_capacity == 0 {
            return sim_error!("Address table capacity must be at least 1");
        }
        validate_frame_size(self.min_frame_bytes, self.max_frame_bytes)?;
        validate_watermarks(
            self.flow_control.high_water_percent,
            self.flow_control.low_water_percent,
        )?;

        let largest_frame = self.frame_limits().max_accepted();
        for i in 0..self.num_ports {
            let port = self.port(i);
            if port.bytes_per_tick == 0 {
                return sim_error!(format!("Port {i}: bytes_per_tick must be at least 1"));
            }
            if port.ingress_bytes < largest_frame || port.egress_bytes < largest_frame {
                return sim_error!(format!(
                    "Port {i}: queues must hold a {largest_frame} byte frame"
                ));
            }
            if port.ingress_frames == 0 || port.egress_frames == 0 {
                return sim_error!(format!("Port {i}: queues must hold at least one frame"));
            }
            if port.weight == 0 {
                return sim_error!(format!("Port {i}: weight must be at least 1"));
            }
        }
        Ok(())
    }
}

/// Check a pair of frame length limits.
pub fn validate_frame_size(min_bytes: usize, max_bytes: usize) -> SimResult {
    if min_bytes < HEADER_BYTES + FCS_BYTES {
        return sim_error!(format!(
            "Minimum frame size {min_bytes} is smaller than a header and FCS"
        ));
    }
    if max_bytes < min_bytes || max_bytes > u16::MAX as usize {
        return sim_error!(format!(
            "Maximum frame size {max_bytes} must be between {min_bytes} and {}",
            u16::MAX
        ));
    }
    Ok(())
}

/// Check a pair of flow-control watermarks.
pub fn validate_watermarks(high_percent: u32, low_percent: u32) -> SimResult {
    if high_percent == 0 || high_percent > 100 || low_percent >= high_percent {
        return sim_error!(format!(
            "Flow-control watermarks must satisfy low < high <= 100 (low {low_percent}, high {high_percent})"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_valid() {
        SwitchConfig::default().validate().unwrap();
        SwitchConfig::with_ports(32).validate().unwrap();
    }

    #[test]
    fn invalid_configs() {
        assert!(SwitchConfig::with_ports(0).validate().is_err());
        assert!(SwitchConfig::with_ports(33).validate().is_err());

        let mut config = SwitchConfig::default();
        config.port_mut(1).ingress_bytes = 1000;
        assert!(config.validate().is_err());

        let mut config = SwitchConfig::default();
        config.jumbo = true;
        assert!(config.validate().is_err());
        config.port_defaults.ingress_bytes = 16384;
        config.port_defaults.egress_bytes = 16384;
        config.validate().unwrap();

        let mut config = SwitchConfig::default();
        config.flow_control.low_water_percent = 80;
        assert!(config.validate().is_err());

        let mut config = SwitchConfig::default();
        config.min_frame_bytes = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn per_port_overrides() {
        let mut config = SwitchConfig::with_ports(4);
        config.port_mut(2).can_stall = false;
        assert_eq!(config.ports.len(), 3);
        assert!(config.port(1).can_stall);
        assert!(!config.port(2).can_stall);
        assert!(config.port(3).can_stall);
    }
}
