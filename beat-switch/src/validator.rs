// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Per-port frame validation as bytes arrive.
//!
//! The [`FrameValidator`] never buffers a frame. It keeps a running length,
//! a running CRC and the last four bytes seen (the candidate FCS) in a small
//! shift register. The CRC only ever covers bytes that have left the shift
//! register, so at end of frame it covers exactly the bytes before the FCS.

use std::fmt;

use crate::checksum::{Crc32, FCS_BYTES};
use crate::frame::{HEADER_BYTES, Header, MAX_FRAME_BYTES, MAX_JUMBO_FRAME_BYTES, MIN_FRAME_BYTES};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Shorter than the minimum frame length.
    Runt,
    /// Longer than the maximum frame length.
    Oversize,
    ChecksumMismatch,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RejectReason::Runt => write!(f, "runt"),
            RejectReason::Oversize => write!(f, "oversize"),
            RejectReason::ChecksumMismatch => write!(f, "checksum mismatch"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

/// Frame length bounds, including the FCS.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLimits {
    pub min_bytes: usize,
    pub max_bytes: usize,
    /// When set the upper bound is [`MAX_JUMBO_FRAME_BYTES`].
    pub jumbo: bool,
}

impl FrameLimits {
    #[must_use]
    pub fn max_accepted(&self) -> usize {
        if self.jumbo {
            MAX_JUMBO_FRAME_BYTES.max(self.max_bytes)
        } else {
            self.max_bytes
        }
    }
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            min_bytes: MIN_FRAME_BYTES,
            max_bytes: MAX_FRAME_BYTES,
            jumbo: false,
        }
    }
}

pub struct FrameValidator {
    limits: FrameLimits,
    crc: Crc32,
    fcs_shift: [u8; FCS_BYTES],
    header: [u8; HEADER_BYTES],
    length: usize,
}

impl FrameValidator {
    #[must_use]
    pub fn new(limits: FrameLimits) -> Self {
        Self {
            limits,
            crc: Crc32::new(),
            fcs_shift: [0; FCS_BYTES],
            header: [0; HEADER_BYTES],
            length: 0,
        }
    }

    #[must_use]
    pub fn limits(&self) -> FrameLimits {
        self.limits
    }

    /// Change the limits. A frame already in progress is classified against
    /// the new limits.
    pub fn set_limits(&mut self, limits: FrameLimits) {
        self.limits = limits;
    }

    /// Number of bytes of the current frame seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn push(&mut self, byte: u8) {
        let slot = self.length % FCS_BYTES;
        if self.length >= FCS_BYTES {
            self.crc.update(self.fcs_shift[slot]);
        }
        self.fcs_shift[slot] = byte;
        if self.length < HEADER_BYTES {
            self.header[self.length] = byte;
        }
        self.length += 1;
    }

    pub fn push_slice(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.push(*b);
        }
    }

    /// True as soon as the frame in progress is known to be too long.
    #[must_use]
    pub fn is_oversize(&self) -> bool {
        self.length > self.limits.max_accepted()
    }

    /// The header of the frame in progress, once it has been received.
    #[must_use]
    pub fn header(&self) -> Option<Header> {
        if self.length < HEADER_BYTES {
            return None;
        }
        Header::parse(&self.header)
    }

    /// Classify the frame at its end and prepare for the next one.
    pub fn finish(&mut self) -> Verdict {
        let verdict = if self.length < self.limits.min_bytes || self.length < FCS_BYTES {
            Verdict::Reject(RejectReason::Runt)
        } else if self.is_oversize() {
            Verdict::Reject(RejectReason::Oversize)
        } else if self.crc.value() != self.received_fcs() {
            Verdict::Reject(RejectReason::ChecksumMismatch)
        } else {
            Verdict::Accept
        };
        self.reset();
        verdict
    }

    /// Abandon the frame in progress.
    pub fn reset(&mut self) {
        self.crc.reset();
        self.length = 0;
    }

    fn received_fcs(&self) -> u32 {
        // The oldest byte in the shift register is the first FCS byte
        let first = self.length % FCS_BYTES;
        let mut fcs = [0; FCS_BYTES];
        for (i, b) in fcs.iter_mut().enumerate() {
            *b = self.fcs_shift[(first + i) % FCS_BYTES];
        }
        u32::from_le_bytes(fcs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::append_fcs;

    fn valid_frame(len: usize) -> Vec<u8> {
        let mut bytes: Vec<u8> = (0..len - FCS_BYTES).map(|i| (i * 13 + 5) as u8).collect();
        append_fcs(&mut bytes);
        bytes
    }

    fn classify(validator: &mut FrameValidator, bytes: &[u8]) -> Verdict {
        validator.push_slice(bytes);
        validator.finish()
    }

    #[test]
    fn accepts_valid_lengths() {
        let mut validator = FrameValidator::new(FrameLimits::default());
        for len in [64, 65, 66, 67, 500, 1517, 1518] {
            assert_eq!(classify(&mut validator, &valid_frame(len)), Verdict::Accept);
        }
    }

    #[test]
    fn rejects_in_order() {
        let mut validator = FrameValidator::new(FrameLimits::default());
        assert_eq!(
            classify(&mut validator, &valid_frame(63)),
            Verdict::Reject(RejectReason::Runt)
        );
        assert_eq!(
            classify(&mut validator, &[1, 2, 3]),
            Verdict::Reject(RejectReason::Runt)
        );
        assert_eq!(
            classify(&mut validator, &valid_frame(1519)),
            Verdict::Reject(RejectReason::Oversize)
        );

        // A short frame with a bad checksum is still reported as a runt
        let mut short = valid_frame(40);
        short[0] ^= 1;
        assert_eq!(
            classify(&mut validator, &short),
            Verdict::Reject(RejectReason::Runt)
        );

        let mut bad = valid_frame(100);
        bad[50] ^= 0x80;
        assert_eq!(
            classify(&mut validator, &bad),
            Verdict::Reject(RejectReason::ChecksumMismatch)
        );
    }

    #[test]
    fn jumbo_limit() {
        let mut validator = FrameValidator::new(FrameLimits {
            jumbo: true,
            ..Default::default()
        });
        assert_eq!(classify(&mut validator, &valid_frame(9022)), Verdict::Accept);
        assert_eq!(
            classify(&mut validator, &valid_frame(9023)),
            Verdict::Reject(RejectReason::Oversize)
        );
    }

    #[test]
    fn early_oversize_and_header() {
        let mut validator = FrameValidator::new(FrameLimits::default());
        let frame = valid_frame(1600);
        validator.push_slice(&frame[..HEADER_BYTES - 1]);
        assert!(validator.header().is_none());
        validator.push_slice(&frame[HEADER_BYTES - 1..1518]);
        assert!(validator.header().is_some());
        assert!(!validator.is_oversize());
        validator.push(frame[1518]);
        assert!(validator.is_oversize());
        validator.reset();
        assert!(validator.is_empty());
    }
}
