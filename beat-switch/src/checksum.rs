// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Ethernet frame check sequence (CRC-32).
//!
//! The reflected polynomial `0xEDB88320` is used with an initial value of
//! `0xFFFF_FFFF` and a final inversion. The FCS is transmitted least
//! significant byte first.

use crc::{CRC_32_ISO_HDLC, Crc, Digest};

/// Number of bytes in the frame check sequence.
pub const FCS_BYTES: usize = 4;

static ALGORITHM: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Incremental CRC-32 state.
#[derive(Clone)]
pub struct Crc32 {
    digest: Digest<'static, u32>,
}

impl Crc32 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            digest: ALGORITHM.digest(),
        }
    }

    pub fn update(&mut self, byte: u8) {
        self.digest.update(&[byte]);
    }

    pub fn update_slice(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    /// The CRC of all bytes seen so far.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.digest.clone().finalize()
    }

    pub fn reset(&mut self) {
        self.digest = ALGORITHM.digest();
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

#[must_use]
pub fn crc32(bytes: &[u8]) -> u32 {
    ALGORITHM.checksum(bytes)
}

/// Append the FCS of `bytes` to the end of `bytes`.
pub fn append_fcs(bytes: &mut Vec<u8>) {
    let fcs = crc32(bytes);
    bytes.extend_from_slice(&fcs.to_le_bytes());
}

/// Returns true if the last four bytes of `frame` are the FCS of the rest.
#[must_use]
pub fn check_fcs(frame: &[u8]) -> bool {
    if frame.len() < FCS_BYTES {
        return false;
    }
    let (body, fcs) = frame.split_at(frame.len() - FCS_BYTES);
    let expected = u32::from_le_bytes([fcs[0], fcs[1], fcs[2], fcs[3]]);
    crc32(body) == expected
}
