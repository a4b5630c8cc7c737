// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The MAC address table.
//!
//! Maps learned station addresses to the port they were last seen on. The
//! table has a fixed number of slots. When a new address is learned into a
//! full table the least recently learned entry is evicted.
//!
//! Every learn or slot write stamps the entry with a fresh generation marker
//! from a counter shared by the whole table, so markers are unique and the
//! oldest entry is always well defined. Should two entries ever carry the
//! same marker the lowest slot index is evicted.
//!
//! A [`lookup`](AddressLookup::lookup) never changes recency; only learning
//! does.
//!
//! Two interchangeable implementations are provided:
//!  - [`IndexedTable`]: hashed index plus an intrusive LRU list, O(1).
//!  - [`LinearTable`]: brute-force compare across all slots.

use std::fmt;

use beat_engine::types::SimError;
use serde::{Deserialize, Serialize};

use crate::frame::MacAddr;

pub mod indexed;
pub mod linear;

pub use indexed::IndexedTable;
pub use linear::LinearTable;

/// Default number of table slots.
pub const DEFAULT_TABLE_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableEntry {
    pub addr: MacAddr,
    pub port: usize,
    /// Generation at which this entry was last learned or written.
    pub marker: u64,
}

/// What a [`learn`](AddressLookup::learn) did to the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LearnOutcome {
    /// A new entry was placed in a free slot.
    Inserted { slot: usize },
    /// The address was already known on the same port.
    Refreshed { slot: usize },
    /// The address was known on a different port.
    Moved { slot: usize, from: usize },
    /// The table was full so the oldest entry was replaced.
    Evicted {
        slot: usize,
        victim: MacAddr,
        victim_port: usize,
    },
}

impl LearnOutcome {
    #[must_use]
    pub fn slot(&self) -> usize {
        match self {
            LearnOutcome::Inserted { slot }
            | LearnOutcome::Refreshed { slot }
            | LearnOutcome::Moved { slot, .. }
            | LearnOutcome::Evicted { slot, .. } => *slot,
        }
    }
}

pub trait AddressLookup {
    fn capacity(&self) -> usize;

    /// Number of occupied slots.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Port on which `addr` was last learned.
    fn lookup(&self, addr: &MacAddr) -> Option<usize>;

    /// Insert or refresh `addr` on `port`, making it the most recent entry.
    fn learn(&mut self, addr: MacAddr, port: usize) -> LearnOutcome;

    fn read_slot(&self, slot: usize) -> Option<TableEntry>;

    /// Place `addr` in `slot`, replacing its previous contents and removing
    /// any other entry for `addr`. The entry becomes the most recent.
    fn write_slot(&mut self, slot: usize, addr: MacAddr, port: usize) -> Result<(), SimError>;

    /// All occupied slots as `(slot, entry)`, lowest slot first.
    fn entries(&self) -> Vec<(usize, TableEntry)>;

    fn clear(&mut self);
}

#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TableKind {
    /// Hashed index with an LRU list
    #[default]
    Indexed,

    /// Brute-force search of every slot
    Linear,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Build an empty table of the requested kind.
pub fn build_table(
    kind: TableKind,
    capacity: usize,
) -> Result<Box<dyn AddressLookup>, SimError> {
    if capacity == 0 {
        return beat_engine::sim_error!("Address table capacity must be at least 1");
    }
    Ok(match kind {
        TableKind::Indexed => Box::new(IndexedTable::new(capacity)),
        TableKind::Linear => Box::new(LinearTable::new(capacity)),
    })
}

fn check_slot_write(capacity: usize, slot: usize, addr: &MacAddr) -> Result<(), SimError> {
    if slot >= capacity {
        return beat_engine::sim_error!(format!(
            "Table slot {slot} out of range (capacity {capacity})"
        ));
    }
    if !addr.is_unicast() {
        return beat_engine::sim_error!(format!("Cannot write non-unicast address {addr}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    use super::*;

    fn mac(n: u64) -> MacAddr {
        MacAddr::from_u64(0x0200_0000_0000 | n)
    }

    fn both(capacity: usize) -> Vec<Box<dyn AddressLookup>> {
        vec![
            build_table(TableKind::Indexed, capacity).unwrap(),
            build_table(TableKind::Linear, capacity).unwrap(),
        ]
    }

    #[test]
    fn learn_then_lookup() {
        for mut table in both(4) {
            assert!(table.lookup(&mac(1)).is_none());
            assert_eq!(table.learn(mac(1), 2), LearnOutcome::Inserted { slot: 0 });
            assert_eq!(table.lookup(&mac(1)), Some(2));
            assert_eq!(
                table.learn(mac(1), 3),
                LearnOutcome::Moved { slot: 0, from: 2 }
            );
            assert_eq!(table.lookup(&mac(1)), Some(3));
            assert_eq!(table.len(), 1);
        }
    }

    #[test]
    fn relearn_is_idempotent() {
        for mut table in both(4) {
            table.learn(mac(1), 1);
            table.learn(mac(2), 2);
            let once: Vec<_> = table
                .entries()
                .iter()
                .map(|(s, e)| (*s, e.addr, e.port))
                .collect();
            assert_eq!(table.learn(mac(2), 2), LearnOutcome::Refreshed { slot: 1 });
            let twice: Vec<_> = table
                .entries()
                .iter()
                .map(|(s, e)| (*s, e.addr, e.port))
                .collect();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn evicts_least_recently_learned() {
        for mut table in both(3) {
            table.learn(mac(1), 0);
            table.learn(mac(2), 1);
            table.learn(mac(3), 2);
            // Lookups do not refresh
            assert_eq!(table.lookup(&mac(1)), Some(0));
            // Re-learning does
            table.learn(mac(2), 1);
            assert_eq!(
                table.learn(mac(4), 3),
                LearnOutcome::Evicted {
                    slot: 0,
                    victim: mac(1),
                    victim_port: 0
                }
            );
            assert!(table.lookup(&mac(1)).is_none());
            assert_eq!(
                table.learn(mac(5), 0),
                LearnOutcome::Evicted {
                    slot: 2,
                    victim: mac(3),
                    victim_port: 2
                }
            );
            assert_eq!(table.len(), 3);
        }
    }

    #[test]
    fn slot_access() {
        for mut table in both(4) {
            table.learn(mac(1), 0);
            table.learn(mac(2), 1);
            table.write_slot(3, mac(1), 2).unwrap();
            // The old entry for the address is removed
            assert!(table.read_slot(0).is_none());
            assert_eq!(table.read_slot(3).map(|e| (e.addr, e.port)), Some((mac(1), 2)));
            assert_eq!(table.lookup(&mac(1)), Some(2));
            assert_eq!(table.len(), 2);

            // The freed slot is reused first
            assert_eq!(table.learn(mac(3), 3), LearnOutcome::Inserted { slot: 0 });

            assert!(table.write_slot(4, mac(9), 0).is_err());
            assert!(table.write_slot(0, MacAddr::BROADCAST, 0).is_err());
            assert!(table.write_slot(0, MacAddr::NONE, 0).is_err());

            table.clear();
            assert!(table.is_empty());
            assert!(table.lookup(&mac(2)).is_none());
        }
    }

    /// Drive both implementations with the same random operations and check
    /// that they agree at every step.
    #[test]
    fn implementations_agree() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(64);
        let mut indexed = IndexedTable::new(16);
        let mut linear = LinearTable::new(16);

        for step in 0..50_000 {
            let addr = mac(rng.gen_range(0..40));
            let port = rng.gen_range(0..8);
            match rng.gen_range(0..100) {
                0..=54 => {
                    assert_eq!(
                        indexed.learn(addr, port),
                        linear.learn(addr, port),
                        "learn at step {step}"
                    );
                }
                55..=94 => assert_eq!(indexed.lookup(&addr), linear.lookup(&addr)),
                95..=98 => {
                    let slot = rng.gen_range(0..16);
                    indexed.write_slot(slot, addr, port).unwrap();
                    linear.write_slot(slot, addr, port).unwrap();
                }
                _ => {
                    indexed.clear();
                    linear.clear();
                }
            }
            assert_eq!(indexed.len(), linear.len());
            if step % 97 == 0 {
                assert_eq!(indexed.entries(), linear.entries());
            }
        }
        assert_eq!(indexed.entries(), linear.entries());
    }
}
