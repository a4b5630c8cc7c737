// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! This module provides combined _track_ capabilities for the BEAT project.
//!
//! _Track_ means the combination of _log_ and _trace_ where:
//!
//!   - _log_ are text-based human-readable messages emitted at various levels
//!     of verbosity (from `Trace` through to `Error`).
//!   - _trace_ provides a standard set of modelling events that can be emitted.
//!     For example, frames entering/exiting switch ports or
//!     [`Entities`](crate::entity::Entity) being created.
//!
//! All events are filtered per entity before any formatting work is done, so
//! a disabled `trace!` in the per-beat datapath costs a single lookup.

// Enable warnings for missing documentation
#![warn(missing_docs)]

use std::cell::RefCell;
use std::rc::Rc;

pub use log;

pub mod builder;
pub mod entity;
pub mod id;

/// Include the trackers.
pub mod tracker;
pub use tracker::{Track, Tracker};

/// A type alias for objects that receive _log_ / _trace_ events.
pub type Writer = Box<dyn std::io::Write>;
type SharedWriter = Rc<RefCell<Writer>>;

/// Type used for unique IDs
///
/// Each _log_/_trace_ event within the application is given a unique ID to
/// identify it. There are two reserved ID values: [NO_ID](constant.NO_ID.html)
/// and [ROOT](constant.ROOT.html)
pub use id::Id;

pub mod test_helpers;

/// ID value which indicates where there is no valid ID
pub const NO_ID: Id = id::Id(0);

/// The root ID from which all other IDs are derived
pub const ROOT: Id = id::Id(1);

/// Track an object entering an entity.
#[macro_export]
macro_rules! enter {
    ($entity:expr ; $enter_id:expr) => {
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Trace)
        {
            $entity.tracker.enter($entity.id, $enter_id);
        }
    };
}

/// Track an object leaving an entity.
#[macro_export]
macro_rules! exit {
    ($entity:expr ; $exit_id:expr) => {
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Trace)
        {
            $entity.tracker.exit($entity.id, $exit_id);
        }
    };
}

/// Create a unique ID for tracking.
///
/// The user must specify an entity with a [`Tracker`] to create the ID.
///
/// **Note:** this macro should be used when the object being assigned the
///           [`Id`] will have its creation tracked with [`create`].
#[macro_export]
macro_rules! create_id {
    ($entity:expr) => {{ $entity.tracker.unique_id() }};
}

/// Add an entity creation event
#[macro_export]
macro_rules! create {
    ($entity:expr) => {{
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Trace)
        {
            let parent_id = match &$entity.parent {
                Some(parent) => parent.id,
                None => $crate::NO_ID,
            };
            $entity
                .tracker
                .create(parent_id, $entity.id, 0, $entity.full_name().as_str());
        }
    }};
    ($entity:expr ; $created:expr, $num_bytes:expr) => {{
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Trace)
        {
            $entity.tracker.create(
                $entity.id,
                $crate::id::Unique::id(&$created),
                $num_bytes,
                format!("{}", $created).as_str(),
            );
        }
    }};
}

/// Add an entity destroy event
#[macro_export]
macro_rules! destroy {
    ($entity:expr) => {{
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Trace)
        {
            match &$entity.parent {
                Some(parent) => $entity.tracker.destroy($entity.id, parent.id),
                None => $entity.tracker.destroy($entity.id, $crate::NO_ID),
            };
        }
    }};
}

/// Update the current time.
#[macro_export]
macro_rules! set_time {
    ($entity:expr ; $time_ns:expr) => {{
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Trace)
        {
            $entity.tracker.time($entity.id, $time_ns);
        }
    }};
}

/// Base macro for log messages of all level.
///
/// The message is only formatted if the entity is enabled at the given level.
#[macro_export]
macro_rules! log_base {
    ($entity:expr ; $lvl:expr, $($arg:tt)+) => (
        if $entity.tracker.is_entity_enabled($entity.id, $lvl) {
            $entity.tracker.log($entity.id, $lvl, format_args!($($arg)+));
        }
    );
}

/// The `trace` macro provides a wrapper for the [`log_base`] macro
/// at level `log::Level::Trace`
#[macro_export]
macro_rules! trace {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Trace, $($arg)+);
    );
}

/// The `debug` macro provides a wrapper for the [`log_base`] macro
/// at level `log::Level::Debug`
#[macro_export]
macro_rules! debug {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Debug, $($arg)+);
    );
}

/// The `info` macro provides a wrapper for the [`log_base`] macro at
/// level `log::Level::Info`
#[macro_export]
macro_rules! info {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Info, $($arg)+);
    );
}

/// The `warn` macro provides a wrapper for the [`log_base`] macro at
/// level `log::Level::Warn`
#[macro_export]
macro_rules! warn {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Warn, $($arg)+);
    );
}

/// the `error` macro provides a wrapper for the [`log_base`] macro
/// at level `log::Level::Error`
#[macro_export]
macro_rules! error {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Error, $($arg)+);
    );
}
