// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Sets of switch ports.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign};

use itertools::Itertools;

/// Largest number of ports a switch can have.
pub const MAX_PORTS: usize = 32;

/// A set of ports, one bit per port.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PortMask(u32);

impl PortMask {
    pub const EMPTY: Self = Self(0);

    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// All of the first `num_ports` ports.
    #[must_use]
    pub fn all(num_ports: usize) -> Self {
        if num_ports >= MAX_PORTS {
            Self(u32::MAX)
        } else {
            Self((1 << num_ports) - 1)
        }
    }

    #[must_use]
    pub fn single(port: usize) -> Self {
        Self(1 << port)
    }

    #[must_use]
    pub fn bits(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn contains(&self, port: usize) -> bool {
        port < MAX_PORTS && self.0 & (1 << port) != 0
    }

    pub fn insert(&mut self, port: usize) {
        self.0 |= 1 << port;
    }

    pub fn remove(&mut self, port: usize) {
        self.0 &= !(1 << port);
    }

    #[must_use]
    pub fn without(self, port: usize) -> Self {
        Self(self.0 & !(1 << port))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Ports in the set, lowest first.
    pub fn iter(&self) -> impl Iterator<Item = usize> + use<> {
        let bits = self.0;
        (0..MAX_PORTS).filter(move |p| bits & (1 << p) != 0)
    }
}

impl BitAnd for PortMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for PortMask {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitOr for PortMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PortMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for PortMask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{}}}", self.iter().join(","))
    }
}

impl fmt::Debug for PortMask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PortMask{self}")
    }
}
