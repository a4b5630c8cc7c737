// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Hashed address table with O(1) learn and lookup.
//!
//! Entries live in a fixed arena of slots. An open-addressed index of twice
//! the slot count (rounded up to a power of two) maps addresses to slots
//! using linear probing; deletions shift later entries back so that no
//! tombstones are needed. The slots are also threaded onto a doubly linked
//! recency list by index, most recent at the head, so the eviction victim is
//! always the tail. Empty slots are kept in a two-level bitset so the lowest
//! free slot is found without scanning the arena.

use beat_engine::types::SimError;

use super::{AddressLookup, LearnOutcome, TableEntry, check_slot_write};
use crate::frame::MacAddr;

const NIL: usize = usize::MAX;

const WORD_BITS: usize = u64::BITS as usize;

fn low_bits(n: usize) -> u64 {
    if n >= WORD_BITS {
        u64::MAX
    } else {
        (1 << n) - 1
    }
}

/// Empty slots, one bit each, with a summary bit per non-empty word.
struct FreeSlots {
    words: Box<[u64]>,
    summary: Box<[u64]>,
}

impl FreeSlots {
    fn new(capacity: usize) -> Self {
        let num_words = capacity.div_ceil(WORD_BITS);
        let mut free = Self {
            words: vec![0; num_words].into_boxed_slice(),
            summary: vec![0; num_words.div_ceil(WORD_BITS)].into_boxed_slice(),
        };
        free.reset(capacity);
        free
    }

    /// Mark every slot below `capacity` free.
    fn reset(&mut self, capacity: usize) {
        for (w, word) in self.words.iter_mut().enumerate() {
            *word = low_bits(capacity - w * WORD_BITS);
        }
        let num_words = self.words.len();
        for (s, summary) in self.summary.iter_mut().enumerate() {
            *summary = low_bits(num_words - s * WORD_BITS);
        }
    }

    fn insert(&mut self, slot: usize) {
        let w = slot / WORD_BITS;
        self.words[w] |= 1 << (slot % WORD_BITS);
        self.summary[w / WORD_BITS] |= 1 << (w % WORD_BITS);
    }

    fn remove(&mut self, slot: usize) {
        let w = slot / WORD_BITS;
        self.words[w] &= !(1 << (slot % WORD_BITS));
        if self.words[w] == 0 {
            self.summary[w / WORD_BITS] &= !(1 << (w % WORD_BITS));
        }
    }

    fn lowest(&self) -> Option<usize> {
        let (s, bits) = self
            .summary
            .iter()
            .enumerate()
            .find(|(_, bits)| **bits != 0)?;
        let w = s * WORD_BITS + bits.trailing_zeros() as usize;
        Some(w * WORD_BITS + self.words[w].trailing_zeros() as usize)
    }
}

#[derive(Clone, Copy)]
struct Slot {
    entry: TableEntry,
    newer: usize,
    older: usize,
}

pub struct IndexedTable {
    slots: Box<[Option<Slot>]>,
    index: Box<[usize]>,
    index_shift: u32,
    free: FreeSlots,
    newest: usize,
    oldest: usize,
    len: usize,
    generation: u64,
}

impl IndexedTable {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let index_len = (2 * capacity).next_power_of_two().max(2);
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            index: vec![NIL; index_len].into_boxed_slice(),
            index_shift: 64 - index_len.trailing_zeros(),
            free: FreeSlots::new(capacity),
            newest: NIL,
            oldest: NIL,
            len: 0,
            generation: 0,
        }
    }

    fn mask(&self) -> usize {
        self.index.len() - 1
    }

    /// Fibonacci hashing of the 48-bit address.
    fn bucket(&self, addr: &MacAddr) -> usize {
        (addr.to_u64().wrapping_mul(0x9E37_79B9_7F4A_7C15) >> self.index_shift) as usize
    }

    fn next_marker(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn slot_addr(&self, slot: usize) -> Option<MacAddr> {
        self.slots[slot].map(|s| s.entry.addr)
    }

    /// Position in the index holding `addr`.
    fn find_position(&self, addr: &MacAddr) -> Option<usize> {
        let mask = self.mask();
        let mut pos = self.bucket(addr);
        loop {
            let slot = self.index[pos];
            if slot == NIL {
                return None;
            }
            if self.slot_addr(slot).as_ref() == Some(addr) {
                return Some(pos);
            }
            pos = (pos + 1) & mask;
        }
    }

    fn find_slot(&self, addr: &MacAddr) -> Option<usize> {
        self.find_position(addr).map(|pos| self.index[pos])
    }

    fn index_insert(&mut self, addr: &MacAddr, slot: usize) {
        let mask = self.mask();
        let mut pos = self.bucket(addr);
        while self.index[pos] != NIL {
            pos = (pos + 1) & mask;
        }
        self.index[pos] = slot;
    }

    /// Remove `addr` from the index. The slot must still hold `addr`.
    fn index_remove(&mut self, addr: &MacAddr) {
        let Some(mut hole) = self.find_position(addr) else {
            return;
        };
        let mask = self.mask();
        self.index[hole] = NIL;
        let mut pos = (hole + 1) & mask;
        while self.index[pos] != NIL {
            let slot = self.index[pos];
            if let Some(moving) = self.slot_addr(slot) {
                let home = self.bucket(&moving);
                // Move back if the entry's home is not between the hole and
                // its current position
                if (pos.wrapping_sub(home) & mask) >= (pos.wrapping_sub(hole) & mask) {
                    self.index[hole] = slot;
                    self.index[pos] = NIL;
                    hole = pos;
                }
            }
            pos = (pos + 1) & mask;
        }
    }

    fn unlink(&mut self, slot: usize) {
        let Some(s) = self.slots[slot] else {
            return;
        };
        match s.newer {
            NIL => self.newest = s.older,
            newer => {
                if let Some(n) = self.slots[newer].as_mut() {
                    n.older = s.older;
                }
            }
        }
        match s.older {
            NIL => self.oldest = s.newer,
            older => {
                if let Some(o) = self.slots[older].as_mut() {
                    o.newer = s.newer;
                }
            }
        }
    }

    fn push_newest(&mut self, slot: usize) {
        let old_newest = self.newest;
        if let Some(s) = self.slots[slot].as_mut() {
            s.newer = NIL;
            s.older = old_newest;
        }
        match old_newest {
            NIL => self.oldest = slot,
            n => {
                if let Some(s) = self.slots[n].as_mut() {
                    s.newer = slot;
                }
            }
        }
        self.newest = slot;
    }

    /// Remove whatever occupies `slot`.
    fn remove_slot(&mut self, slot: usize) {
        if let Some(addr) = self.slot_addr(slot) {
            self.index_remove(&addr);
            self.unlink(slot);
            self.slots[slot] = None;
            self.free.insert(slot);
            self.len -= 1;
        }
    }

    /// Fill an empty `slot` and make it the most recent entry.
    fn fill_slot(&mut self, slot: usize, addr: MacAddr, port: usize) {
        let marker = self.next_marker();
        self.slots[slot] = Some(Slot {
            entry: TableEntry { addr, port, marker },
            newer: NIL,
            older: NIL,
        });
        self.index_insert(&addr, slot);
        self.push_newest(slot);
        self.free.remove(slot);
        self.len += 1;
    }

}

impl AddressLookup for IndexedTable {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn lookup(&self, addr: &MacAddr) -> Option<usize> {
        let slot = self.find_slot(addr)?;
        self.slots[slot].map(|s| s.entry.port)
    }

    fn learn(&mut self, addr: MacAddr, port: usize) -> LearnOutcome {
        if let Some(slot) = self.find_slot(&addr) {
            let marker = self.next_marker();
            self.unlink(slot);
            let mut from = port;
            if let Some(s) = self.slots[slot].as_mut() {
                from = s.entry.port;
                s.entry.port = port;
                s.entry.marker = marker;
            }
            self.push_newest(slot);
            return if from == port {
                LearnOutcome::Refreshed { slot }
            } else {
                LearnOutcome::Moved { slot, from }
            };
        }

        if let Some(slot) = self.free.lowest() {
            self.fill_slot(slot, addr, port);
            return LearnOutcome::Inserted { slot };
        }

        let slot = self.oldest;
        let victim = self.slots[slot].map(|s| s.entry);
        self.remove_slot(slot);
        self.fill_slot(slot, addr, port);
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
        self.slots.get(slot).copied().flatten().map(|s| s.entry)
    }

    fn write_slot(&mut self, slot: usize, addr: MacAddr, port: usize) -> Result<(), SimError> {
        check_slot_write(self.capacity(), slot, &addr)?;
        if let Some(existing) = self.find_slot(&addr) {
            self.remove_slot(existing);
        }
        self.remove_slot(slot);
        self.fill_slot(slot, addr, port);
        Ok(())
    }

    fn entries(&self) -> Vec<(usize, TableEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|s| (i, s.entry)))
            .collect()
    }

    fn clear(&mut self) {
        self.slots.fill(None);
        self.index.fill(NIL);
        self.free.reset(self.slots.len());
        self.newest = NIL;
        self.oldest = NIL;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colliding_deletes_keep_index_consistent() {
        // A small table forces long probe chains
        let mut table = IndexedTable::new(8);
        for round in 0..50_u64 {
            for i in 0..12 {
                let addr = MacAddr::from_u64(0x0200_0000_0000 | (round * 7 + i) % 23);
                table.learn(addr, i as usize);
                assert_eq!(table.lookup(&addr), Some(i as usize));
            }
            for (slot, entry) in table.entries() {
                assert_eq!(table.find_slot(&entry.addr), Some(slot));
            }
            assert_eq!(table.len(), 8);
        }
    }

    #[test]
    fn free_slots_span_words() {
        let station = |i: u64| MacAddr::from_u64(0x0200_0000_0000 | i);
        let mut table = IndexedTable::new(130);
        for i in 0..130 {
            assert_eq!(table.learn(station(i), 0), LearnOutcome::Inserted { slot: i as usize });
        }
        assert_eq!(table.free.lowest(), None);

        // Moving slot 100's address into slot 5 frees slot 100
        table.write_slot(5, station(100), 1).unwrap();
        assert_eq!(table.free.lowest(), Some(100));
        assert_eq!(table.learn(station(500), 2), LearnOutcome::Inserted { slot: 100 });
        assert_eq!(table.free.lowest(), None);

        table.clear();
        assert_eq!(table.free.lowest(), Some(0));
        assert_eq!(table.learn(station(7), 0), LearnOutcome::Inserted { slot: 0 });
        assert_eq!(table.free.lowest(), Some(1));
    }

    #[test]
    fn recency_list_order() {
        let mut table = IndexedTable::new(3);
        for i in 1..=3 {
            table.learn(MacAddr::from_u64(0x0200_0000_0000 | i), 0);
        }
        table.learn(MacAddr::from_u64(0x0200_0000_0001), 0);
        assert_eq!(table.oldest, 1);
        assert_eq!(table.newest, 0);
    }
}
