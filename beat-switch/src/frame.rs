// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Ethernet frames and the addresses they carry.
//!
//! A [`Frame`] holds the exact bytes that appear on the wire from the
//! destination address up to and including the FCS. The preamble and start
//! of frame delimiter are not modelled.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use beat_engine::sim_error;
use beat_engine::traits::TotalBytes;
use beat_engine::types::SimError;
use beat_track::entity::Entity;
use beat_track::id::Unique;
use beat_track::{Id, create, create_id};

use crate::checksum::{FCS_BYTES, append_fcs, check_fcs};

pub const MAC_BYTES: usize = 6;
pub const ETHERTYPE_BYTES: usize = 2;
pub const HEADER_BYTES: usize = 2 * MAC_BYTES + ETHERTYPE_BYTES;

/// Smallest legal frame, including the FCS.
pub const MIN_FRAME_BYTES: usize = 64;

/// Largest legal frame, including the FCS.
pub const MAX_FRAME_BYTES: usize = 1518;

/// Largest frame accepted when jumbo frames are enabled.
pub const MAX_JUMBO_FRAME_BYTES: usize = 9022;

/// 6-byte Ethernet MAC address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; MAC_BYTES]);

impl MacAddr {
    pub const NONE: Self = Self([0; MAC_BYTES]);
    pub const BROADCAST: Self = Self([0xFF; MAC_BYTES]);

    /// Destination of IEEE 802.3x PAUSE frames.
    pub const PAUSE: Self = Self([0x01, 0x80, 0xC2, 0x00, 0x00, 0x01]);

    /// Build an address from the low 48 bits of `value`, most significant
    /// byte first.
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        let bytes = value.to_be_bytes();
        let mut mac = [0; MAC_BYTES];
        mac.copy_from_slice(&bytes[2..]);
        Self(mac)
    }

    #[must_use]
    pub fn to_u64(&self) -> u64 {
        self.0.iter().fold(0, |acc, b| (acc << 8) | *b as u64)
    }

    /// Read an address from the start of `bytes`.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let mac: [u8; MAC_BYTES] = bytes.get(..MAC_BYTES)?.try_into().ok()?;
        Some(Self(mac))
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Group addresses, including broadcast.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// An address that may be learned as a station.
    #[must_use]
    pub fn is_unicast(&self) -> bool {
        !self.is_multicast() && !self.is_none()
    }

    /// The reserved MAC-control range `01:80:C2:00:00:0x`.
    ///
    /// Frames sent to these addresses are consumed by the switch.
    #[must_use]
    pub fn is_swcontrol(&self) -> bool {
        self.0[..5] == [0x01, 0x80, 0xC2, 0x00, 0x00] && self.0[5] & 0xF0 == 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for MacAddr {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mac = [0; MAC_BYTES];
        let mut parts = s.split(':');
        for byte in &mut mac {
            let Some(part) = parts.next() else {
                return sim_error!(format!("MAC address '{s}' is too short"));
            };
            *byte = match u8::from_str_radix(part, 16) {
                Ok(b) if part.len() == 2 => b,
                _ => return sim_error!(format!("Invalid MAC address byte '{part}' in '{s}'")),
            };
        }
        if parts.next().is_some() {
            return sim_error!(format!("MAC address '{s}' is too long"));
        }
        Ok(Self(mac))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EtherType(pub u16);

impl EtherType {
    pub const IPV4: Self = Self(0x0800);
    pub const ARP: Self = Self(0x0806);
    pub const VLAN: Self = Self(0x8100);
    pub const IPV6: Self = Self(0x86DD);
    pub const MAC_CONTROL: Self = Self(0x8808);
    /// IEEE 802 local experimental EtherType, used for generated traffic.
    pub const LOCAL_EXPERIMENTAL: Self = Self(0x88B5);
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl fmt::Debug for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Opcode of a PAUSE request within a MAC-control frame.
pub const PAUSE_OPCODE: u16 = 0x0001;

/// The addressing fields at the start of every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: EtherType,
}

impl Header {
    /// Parse the header from the first [`HEADER_BYTES`] of a frame.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_BYTES {
            return None;
        }
        Some(Self {
            dst: MacAddr::from_slice(&bytes[..MAC_BYTES])?,
            src: MacAddr::from_slice(&bytes[MAC_BYTES..])?,
            ethertype: EtherType(u16::from_be_bytes([bytes[12], bytes[13]])),
        })
    }
}

/// Returns the requested pause quanta if `bytes` is a PAUSE frame.
#[must_use]
pub fn pause_quanta(bytes: &[u8]) -> Option<u16> {
    let header = Header::parse(bytes)?;
    if header.ethertype != EtherType::MAC_CONTROL || !header.dst.is_swcontrol() {
        return None;
    }
    let body = bytes.get(HEADER_BYTES..HEADER_BYTES + 4)?;
    if u16::from_be_bytes([body[0], body[1]]) != PAUSE_OPCODE {
        return None;
    }
    Some(u16::from_be_bytes([body[2], body[3]]))
}

#[derive(Clone, Debug)]
pub struct Frame {
    id: Id,
    bytes: Vec<u8>,
}

impl Frame {
    /// Wrap raw wire bytes, which need not form a valid frame.
    #[must_use]
    pub fn new(created_by: &Rc<Entity>, bytes: Vec<u8>) -> Self {
        let frame = Self {
            id: create_id!(created_by),
            bytes,
        };
        create!(created_by ; frame, frame.total_bytes());
        frame
    }

    /// Build a valid frame.
    ///
    /// The payload is zero padded so that the frame reaches
    /// [`MIN_FRAME_BYTES`] and the FCS is appended.
    #[must_use]
    pub fn build(
        created_by: &Rc<Entity>,
        dst: MacAddr,
        src: MacAddr,
        ethertype: EtherType,
        payload: &[u8],
    ) -> Self {
        let mut bytes = Vec::with_capacity(HEADER_BYTES + payload.len() + FCS_BYTES);
        bytes.extend_from_slice(&dst.0);
        bytes.extend_from_slice(&src.0);
        bytes.extend_from_slice(&ethertype.0.to_be_bytes());
        bytes.extend_from_slice(payload);
        if bytes.len() < MIN_FRAME_BYTES - FCS_BYTES {
            bytes.resize(MIN_FRAME_BYTES - FCS_BYTES, 0);
        }
        append_fcs(&mut bytes);
        Self::new(created_by, bytes)
    }

    /// Build an IEEE 802.3x PAUSE frame requesting `quanta` units of 512 bit
    /// times. Zero quanta resumes the peer immediately.
    #[must_use]
    pub fn pause(created_by: &Rc<Entity>, src: MacAddr, quanta: u16) -> Self {
        let mut payload = Vec::with_capacity(4);
        payload.extend_from_slice(&PAUSE_OPCODE.to_be_bytes());
        payload.extend_from_slice(&quanta.to_be_bytes());
        Self::build(
            created_by,
            MacAddr::PAUSE,
            src,
            EtherType::MAC_CONTROL,
            &payload,
        )
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn header(&self) -> Option<Header> {
        Header::parse(&self.bytes)
    }

    #[must_use]
    pub fn dst(&self) -> MacAddr {
        self.header().map_or(MacAddr::NONE, |h| h.dst)
    }

    #[must_use]
    pub fn src(&self) -> MacAddr {
        self.header().map_or(MacAddr::NONE, |h| h.src)
    }

    /// The payload between the header and the FCS.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        if self.bytes.len() < HEADER_BYTES + FCS_BYTES {
            return &[];
        }
        &self.bytes[HEADER_BYTES..self.bytes.len() - FCS_BYTES]
    }

    #[must_use]
    pub fn has_valid_fcs(&self) -> bool {
        check_fcs(&self.bytes)
    }

    #[must_use]
    pub fn pause_quanta(&self) -> Option<u16> {
        pause_quanta(&self.bytes)
    }

    /// Invalidate the FCS by flipping the bits of its last byte.
    pub fn corrupt_fcs(&mut self) {
        if let Some(last) = self.bytes.last_mut() {
            *last ^= 0xFF;
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.header() {
            Some(h) => write!(
                f,
                "{} -> {} {} ({} bytes)",
                h.src,
                h.dst,
                h.ethertype,
                self.bytes.len()
            ),
            None => write!(f, "fragment ({} bytes)", self.bytes.len()),
        }
    }
}

impl TotalBytes for Frame {
    fn total_bytes(&self) -> usize {
        self.bytes.len()
    }
}

impl Unique for Frame {
    fn id(&self) -> Id {
        self.id
    }
}
