// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Generated test traffic.
//!
//! Every generated frame carries its source port and a per-source sequence
//! number at the start of its payload so that delivery and ordering can be
//! checked at the far end.

use std::fmt;
use std::rc::Rc;

use beat_track::entity::Entity;
use rand::seq::IteratorRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::checksum::FCS_BYTES;
use crate::frame::{EtherType, Frame, HEADER_BYTES, MacAddr};

const TAG_BYTES: usize = 10;

#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TrafficPattern {
    /// All sources send to one destination
    #[default]
    AllToOne,

    /// All sources send to random destinations
    Random,

    /// All sources send to every other port in turn
    AllToAllSeq,
}

impl fmt::Display for TrafficPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The station address used by the peer on `port`.
#[must_use]
pub fn station_mac(port: usize) -> MacAddr {
    MacAddr::from_u64(0x02BE_A700_0000 | (port as u64 + 1))
}

/// The port whose station owns `mac`, if it is one of ours.
#[must_use]
pub fn station_port(mac: &MacAddr) -> Option<usize> {
    let value = mac.to_u64();
    if value & 0xFFFF_FFFF_0000 != 0x02BE_A700_0000 || value & 0xFFFF == 0 {
        return None;
    }
    Some((value & 0xFFFF) as usize - 1)
}

/// Source port and sequence number of a generated frame.
#[must_use]
pub fn frame_tag(frame: &Frame) -> Option<(usize, u64)> {
    let payload = frame.payload();
    if payload.len() < TAG_BYTES {
        return None;
    }
    let source = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    let mut seq = [0; 8];
    seq.copy_from_slice(&payload[2..TAG_BYTES]);
    Some((source, u64::from_be_bytes(seq)))
}

pub struct FrameGen {
    pub entity: Rc<Entity>,
    source_index: usize,
    num_ports: usize,
    dest_index: usize,
    pattern: TrafficPattern,
    min_bytes: usize,
    max_bytes: usize,
    num_frames: usize,
    num_generated: usize,
    corrupt_fraction: f64,
    num_corrupted: usize,
    rng: Xoshiro256PlusPlus,
}

impl FrameGen {
    #[expect(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        parent: &Rc<Entity>,
        source_index: usize,
        num_ports: usize,
        initial_dest_index: usize,
        pattern: TrafficPattern,
        frame_bytes: (usize, usize),
        num_frames: usize,
        seed: u64,
    ) -> Self {
        // Create a local RNG which is different per source
        let rng = Xoshiro256PlusPlus::seed_from_u64(seed ^ (source_index as u64));
        let (min_bytes, max_bytes) = frame_bytes;
        let min_bytes = min_bytes.max(HEADER_BYTES + TAG_BYTES + FCS_BYTES);
        Self {
            entity: Rc::new(Entity::new(parent, &format!("gen{source_index}"))),
            source_index,
            num_ports,
            dest_index: initial_dest_index,
            pattern,
            min_bytes,
            max_bytes: max_bytes.max(min_bytes),
            num_frames,
            num_generated: 0,
            corrupt_fraction: 0.0,
            num_corrupted: 0,
            rng,
        }
    }

    /// Give this fraction of frames a bad FCS.
    #[must_use]
    pub fn with_corruption(mut self, fraction: f64) -> Self {
        self.corrupt_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn num_corrupted(&self) -> usize {
        self.num_corrupted
    }

    fn next_dest(&mut self) -> usize {
        let others = (0..self.num_ports).filter(|p| *p != self.source_index);
        match self.pattern {
            TrafficPattern::AllToOne => self.dest_index,
            TrafficPattern::Random => others.choose(&mut self.rng).unwrap_or(self.dest_index),
            TrafficPattern::AllToAllSeq => {
                let mut dest = (self.dest_index + 1) % self.num_ports;
                if dest == self.source_index {
                    dest = (dest + 1) % self.num_ports;
                }
                self.dest_index = dest;
                dest
            }
        }
    }
}

impl Iterator for FrameGen {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_generated == self.num_frames {
            return None;
        }
        let dest = self.next_dest();
        let total_bytes = self.rng.gen_range(self.min_bytes..=self.max_bytes);
        let mut payload = vec![0; total_bytes - HEADER_BYTES - FCS_BYTES];
        payload[..2].copy_from_slice(&(self.source_index as u16).to_be_bytes());
        payload[2..TAG_BYTES].copy_from_slice(&(self.num_generated as u64).to_be_bytes());
        self.rng.fill(&mut payload[TAG_BYTES..]);

        let mut frame = Frame::build(
            &self.entity,
            station_mac(dest),
            station_mac(self.source_index),
            EtherType::LOCAL_EXPERIMENTAL,
            &payload,
        );
        if self.corrupt_fraction > 0.0 && self.rng.gen_bool(self.corrupt_fraction) {
            frame.corrupt_fcs();
            self.num_corrupted += 1;
        }
        self.num_generated += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use beat_track::entity::toplevel;
    use beat_track::tracker::dev_null_tracker;

    use super::*;

    #[test]
    fn tagged_frames() {
        let top = toplevel(&dev_null_tracker(), "top");
        let frames: Vec<_> =
            FrameGen::new(&top, 2, 4, 0, TrafficPattern::Random, (64, 1518), 100, 1).collect();
        assert_eq!(frames.len(), 100);
        for (i, frame) in frames.iter().enumerate() {
            assert!(frame.has_valid_fcs());
            assert!((64..=1518).contains(&frame.len()));
            assert_eq!(frame_tag(frame), Some((2, i as u64)));
            assert_eq!(station_port(&frame.src()), Some(2));
            assert_ne!(station_port(&frame.dst()), Some(2));
        }
    }

    #[test]
    fn sequential_skips_self() {
        let top = toplevel(&dev_null_tracker(), "top");
        let dests: Vec<_> =
            FrameGen::new(&top, 1, 3, 0, TrafficPattern::AllToAllSeq, (64, 64), 4, 1)
                .map(|f| station_port(&f.dst()))
                .collect();
        assert_eq!(dests, vec![Some(2), Some(0), Some(2), Some(0)]);
    }

    #[test]
    fn corruption() {
        let top = toplevel(&dev_null_tracker(), "top");
        let mut generator =
            FrameGen::new(&top, 0, 2, 1, TrafficPattern::AllToOne, (64, 128), 200, 3)
                .with_corruption(0.25);
        let bad = generator.by_ref().filter(|f| !f.has_valid_fcs()).count();
        assert_eq!(bad, generator.num_corrupted());
        assert!(bad > 20 && bad < 80);
    }
}
