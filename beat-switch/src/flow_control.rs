// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! IEEE 802.3x style flow control.
//!
//! One [`FlowControlUnit`] per port. On the receive side it watches the
//! congestion that the port's own traffic is feeding and asks the peer to
//! pause. On the transmit side it holds off transmission while the peer has
//! asked this port to pause.
//!
//! Pause durations are expressed in quanta of 512 bit times.

use serde::{Deserialize, Serialize};

/// One pause quantum is 512 bit times.
pub const BYTES_PER_QUANTUM: u64 = 64;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FlowControlConfig {
    /// Send PAUSE requests to peers.
    pub enabled: bool,

    /// Assert pause at or above this egress occupancy (percent).
    pub high_water_percent: u32,

    /// Release pause below this egress occupancy (percent).
    pub low_water_percent: u32,

    /// Quanta requested in each PAUSE frame, before capping.
    pub pause_quanta: u16,

    /// Longest time a single pause request may hold a peer off.
    pub max_assert_ticks: u64,
}

impl Default for FlowControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            high_water_percent: 75,
            low_water_percent: 25,
            pause_quanta: u16::MAX,
            max_assert_ticks: 4096,
        }
    }
}

/// Number of ticks one quantum lasts on a port moving `bytes_per_tick`.
#[must_use]
pub fn ticks_per_quantum(bytes_per_tick: usize) -> u64 {
    BYTES_PER_QUANTUM.div_ceil(bytes_per_tick.max(1) as u64)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FcEvent {
    /// Send a PAUSE with these quanta.
    Assert(u16),
    /// Send a zero-quanta PAUSE.
    Release,
    /// The request ran for its maximum time without congestion clearing.
    /// Send a zero-quanta PAUSE and fall back to local backpressure.
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FcState {
    Idle,
    Asserted { deadline: u64 },
    Degraded,
}

pub struct FlowControlUnit {
    config: FlowControlConfig,
    ticks_per_quantum: u64,
    state: FcState,
    tx_paused_until: u64,
}

impl FlowControlUnit {
    #[must_use]
    pub fn new(config: FlowControlConfig, bytes_per_tick: usize) -> Self {
        Self {
            config,
            ticks_per_quantum: ticks_per_quantum(bytes_per_tick),
            state: FcState::Idle,
            tx_paused_until: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &FlowControlConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: FlowControlConfig) {
        self.config = config;
    }

    /// Quanta sent when asserting, capped to the maximum assertion time.
    #[must_use]
    pub fn request_quanta(&self) -> u16 {
        let max_quanta = self.config.max_assert_ticks / self.ticks_per_quantum;
        max_quanta.min(self.config.pause_quanta as u64) as u16
    }

    /// Update with the occupancy of the congestion point this port feeds.
    pub fn observe(&mut self, now: u64, occupancy_percent: u32) -> Option<FcEvent> {
        match self.state {
            FcState::Idle => {
                if !self.config.enabled || occupancy_percent < self.config.high_water_percent {
                    return None;
                }
                let quanta = self.request_quanta();
                if quanta == 0 {
                    // A request this short cannot be expressed
                    self.state = FcState::Degraded;
                    return None;
                }
                self.state = FcState::Asserted {
                    deadline: now + self.config.max_assert_ticks,
                };
                Some(FcEvent::Assert(quanta))
            }
            FcState::Asserted { deadline } => {
                if occupancy_percent < self.config.low_water_percent {
                    self.state = FcState::Idle;
                    Some(FcEvent::Release)
                } else if now >= deadline {
                    self.state = FcState::Degraded;
                    Some(FcEvent::Timeout)
                } else {
                    None
                }
            }
            FcState::Degraded => {
                if occupancy_percent < self.config.low_water_percent {
                    self.state = FcState::Idle;
                }
                None
            }
        }
    }

    #[must_use]
    pub fn is_asserted(&self) -> bool {
        matches!(self.state, FcState::Asserted { .. })
    }

    /// Pausing the peer has failed; the port must hold off new frames
    /// itself.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.state == FcState::Degraded
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == FcState::Idle
    }

    /// The peer has asked this port to stop transmitting.
    pub fn receive_pause(&mut self, now: u64, quanta: u16) {
        self.tx_paused_until = now + quanta as u64 * self.ticks_per_quantum;
    }

    /// A new frame may be started.
    #[must_use]
    pub fn tx_allowed(&self, now: u64) -> bool {
        now >= self.tx_paused_until
    }
}
