// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Brute-force address table.
//!
//! Every operation compares against every slot, which mirrors a parallel
//! compare in hardware. Kept simple enough to act as a reference for
//! [`IndexedTable`](super::IndexedTable).

use beat_engine::types::SimError;

use super::{AddressLookup, LearnOutcome, TableEntry, check_slot_write};
use crate::frame::MacAddr;

pub struct LinearTable {
    slots: Box<[Option<TableEntry>]>,
    generation: u64,
}

impl LinearTable {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            generation: 0,
        }
    }

    fn next_marker(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn find_slot(&self, addr: &MacAddr) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.is_some_and(|e| e.addr == *addr))
    }

    /// Oldest marker, lowest slot on a tie.
    fn victim_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|e| (e.marker, i)))
            .min()
            .map(|(_, i)| i)
    }
}

impl AddressLookup for LinearTable {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn lookup(&self, addr: &MacAddr) -> Option<usize> {
        let slot = self.find_slot(addr)?;
        self.slots[slot].map(|e| e.port)
    }

    fn learn(&mut self, addr: MacAddr, port: usize) -> LearnOutcome {
        let marker = self.next_marker();
        let entry = TableEntry { addr, port, marker };

        if let Some(slot) = self.find_slot(&addr) {
            let from = self.slots[slot].map_or(port, |e| e.port);
            self.slots[slot] = Some(entry);
            return if from == port {
                LearnOutcome::Refreshed { slot }
            } else {
                LearnOutcome::Moved { slot, from }
            };
        }

        if let Some(slot) = self.slots.iter().position(Option::is_none) {
            self.slots[slot] = Some(entry);
            return LearnOutcome::Inserted { slot };
        }

        let slot = self.victim_slot().unwrap_or(0);
        let victim = self.slots[slot].replace(entry);
        match victim {
            Some(v) => LearnOutcome::Evicted {
                slot,
                victim: v.addr,
                victim_port: v.port,
            },
            None => LearnOutcome::Inserted { slot },
        }
    }

    fn read_slot(&self, slot: usize) -> Option<TableEntry> {
        self.slots.get(slot).copied().flatten()
    }

    fn write_slot(&mut self, slot: usize, addr: MacAddr, port: usize) -> Result<(), SimError> {
        check_slot_write(self.capacity(), slot, &addr)?;
        if let Some(existing) = self.find_slot(&addr) {
            self.slots[existing] = None;
        }
        let marker = self.next_marker();
        self.slots[slot] = Some(TableEntry { addr, port, marker });
        Ok(())
    }

    fn entries(&self) -> Vec<(usize, TableEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|e| (i, e)))
            .collect()
    }

    fn clear(&mut self) {
        self.slots.fill(None);
    }
}
