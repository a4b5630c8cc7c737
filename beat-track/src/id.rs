// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Identifiers shared by entities and the objects they track.

/// IDs that should be unique across the simulation
///
/// Each _log_/_trace_ event within the application is given a unique ID to
/// identify it. There are two reserved ID values: [NO_ID](crate::NO_ID)
/// and [ROOT](crate::ROOT)
#[derive(Copy, Clone, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Id(pub u64);

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `Unique` trait provides a unique ID for logging
pub trait Unique {
    /// Return a unique ID for an object.
    fn id(&self) -> Id;
}
