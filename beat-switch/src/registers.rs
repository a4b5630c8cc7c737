// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Control and status register map.
//!
//! All registers are 32 bits wide. Reads return the current state
//! immediately. Writes are staged and take effect when the engine resolves
//! the tick in which they were issued.
//!
//! | Addr   | Register         | Access |
//! |--------|------------------|--------|
//! | 0x00   | `PORT_COUNT`     | RO     |
//! | 0x01   | `DATAPATH`       | RO     |
//! | 0x02   | `CORE_CLOCK`     | RO     |
//! | 0x03   | `MAC_COUNT`      | RO     |
//! | 0x04   | `PROMISC`        | RW     |
//! | 0x05   | `PORT_ENABLE`    | RW     |
//! | 0x06   | `PKT_COUNT`      | RW     |
//! | 0x07   | `FRAME_SIZE`     | RW     |
//! | 0x08   | `MISS_BCAST`     | RW     |
//! | 0x09   | `LEARN_ENABLE`   | RW     |
//! | 0x0A   | `JUMBO`          | RW     |
//! | 0x0B   | `FC_HIGH_WATER`  | RW     |
//! | 0x0C   | `FC_LOW_WATER`   | RW     |
//! | 0x0D   | `FC_MAX_ASSERT`  | RW     |
//! | 0x10   | `ERROR_VECTOR`   | RW1C   |
//! | 0x11   | `ERROR_MASK`     | RW     |
//! | 0x12   | `TABLE_OCCUPANCY`| RO     |
//! | 0x13   | `TABLE_CLEAR`    | WO     |
//! | 0x14   | `SCRUB_INTERVAL` | RW     |
//! | 0x15   | `SCRUB_STATUS`   | RW1C   |
//! | 0x16   | `STATS_SELECT`   | RW     |
//! | 0x17   | `STATS_RESET`    | WO     |
//! | 0x20+n | `STATS_DATA[n]`  | RO     |
//! | 0x40+p | `ISOLATION[p]`   | RW     |

use beat_engine::sim_error;
use beat_engine::types::{SimError, SimResult};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::stats::CounterId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum Reg {
    PortCount = 0x00,
    Datapath = 0x01,
    CoreClock = 0x02,
    MacCount = 0x03,
    Promisc = 0x04,
    PortEnable = 0x05,
    /// Write: EtherType filter (0 counts all). Read: frames since last read.
    PktCount = 0x06,
    /// Minimum frame length in bits 15:0, maximum in bits 31:16.
    FrameSize = 0x07,
    MissBcast = 0x08,
    LearnEnable = 0x09,
    Jumbo = 0x0A,
    FcHighWater = 0x0B,
    FcLowWater = 0x0C,
    FcMaxAssert = 0x0D,
    ErrorVector = 0x10,
    ErrorMask = 0x11,
    TableOccupancy = 0x12,
    TableClear = 0x13,
    ScrubInterval = 0x14,
    ScrubStatus = 0x15,
    /// Write a port index to latch its counters, or [`STATS_RESET_ALL`].
    StatsSelect = 0x16,
    StatsReset = 0x17,
}

pub const STATS_DATA_BASE: u32 = 0x20;
pub const ISOLATION_BASE: u32 = 0x40;

/// Written to `STATS_SELECT` to reset every port's counters.
pub const STATS_RESET_ALL: u32 = 0xFFFF_FFFF;

/// A decoded register address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegAddr {
    Fixed(Reg),
    StatsData(CounterId),
    Isolation(usize),
}

impl RegAddr {
    pub fn decode(addr: u32, num_ports: usize) -> Result<Self, SimError> {
        if let Some(reg) = Reg::from_u32(addr) {
            return Ok(RegAddr::Fixed(reg));
        }
        if addr >= ISOLATION_BASE && ((addr - ISOLATION_BASE) as usize) < num_ports {
            return Ok(RegAddr::Isolation((addr - ISOLATION_BASE) as usize));
        }
        if addr >= STATS_DATA_BASE {
            if let Some(id) = CounterId::from_u32(addr - STATS_DATA_BASE) {
                return Ok(RegAddr::StatsData(id));
            }
        }
        sim_error!(format!("Unknown register address 0x{addr:02x}"))
    }

    #[must_use]
    pub fn is_readable(&self) -> bool {
        !matches!(
            self,
            RegAddr::Fixed(Reg::TableClear) | RegAddr::Fixed(Reg::StatsReset)
        )
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        match self {
            RegAddr::Fixed(reg) => !matches!(
                reg,
                Reg::PortCount
                    | Reg::Datapath
                    | Reg::CoreClock
                    | Reg::MacCount
                    | Reg::TableOccupancy
            ),
            RegAddr::StatsData(_) => false,
            RegAddr::Isolation(_) => true,
        }
    }

    pub fn check_read(&self) -> SimResult {
        if !self.is_readable() {
            return sim_error!(format!("Register {self:?} is write-only"));
        }
        Ok(())
    }

    pub fn check_write(&self) -> SimResult {
        if !self.is_writable() {
            return sim_error!(format!("Register {self:?} is read-only"));
        }
        Ok(())
    }
}

/// The generic register bus through which the switch is configured and
/// monitored.
pub trait RegisterBus {
    fn read(&self, addr: u32) -> Result<u32, SimError>;

    /// Stage a write. Errors are reported immediately.
    fn write(&self, addr: u32, value: u32) -> SimResult;
}
