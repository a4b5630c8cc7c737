// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The switch forwarding core as an engine component.
//!
//! Every tick each port in turn:
//!  - takes one beat from its peer through the frame validator into its
//!    ingress queue, committing or reverting the frame at its end,
//!  - decides the destinations of its oldest committed frame,
//!  - arbitrates (as an egress port) between the ingress ports ready to send
//!    to it, copying the granted frame into its egress queue,
//!  - updates its flow-control unit from the occupancy its traffic feeds,
//!  - transmits one beat to its peer.
//!
//! Address learning and register writes are staged and applied when the
//! engine resolves the tick, so a lookup never sees a table that is being
//! changed.
//!
//! # Example
//!
//! ```rust
//! use beat_engine::engine::Engine;
//! use beat_engine::run_simulation;
//! use beat_switch::config::SwitchConfig;
//! use beat_switch::frame::{EtherType, Frame, MacAddr};
//! use beat_switch::switch::Switch;
//!
//! let engine = Engine::default();
//! let top = engine.top().clone();
//! let switch = Switch::new_and_register(&engine, &top, "switch", SwitchConfig::with_ports(2))
//!     .unwrap();
//!
//! let a = MacAddr::from_u64(0x0200_0000_0001);
//! switch
//!     .inject(0, Frame::build(&top, MacAddr::BROADCAST, a, EtherType::ARP, &[]))
//!     .unwrap();
//! run_simulation!(engine);
//!
//! assert_eq!(switch.take_received(1).unwrap().len(), 1);
//! assert_eq!(switch.lookup(&a), Some(0));
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use beat_engine::engine::Engine;
use beat_engine::sim_error;
use beat_engine::time::clock::{Clock, ClockTick};
use beat_engine::traits::{Resolve, Resolver, Runnable};
use beat_engine::types::{SimError, SimResult};
use beat_track::entity::Entity;
use beat_track::id::Unique;
use beat_track::{enter, info};

use crate::address_table::TableEntry;
use crate::config::SwitchConfig;
use crate::error_vector::ErrorVector;
use crate::frame::{Frame, MacAddr};
use crate::registers::{RegAddr, RegisterBus};
use crate::stats::PortStats;

mod port;
mod state;

pub use port::switch_port_mac;
use state::{SwitchState, Update};

/// Changes made during a tick, applied when the tick is resolved.
struct StagedUpdates {
    state: Rc<RefCell<SwitchState>>,
    clock: Clock,
    pending: RefCell<Vec<Update>>,
    registered: Cell<bool>,
}

impl StagedUpdates {
    fn push(self: &Rc<Self>, update: Update) {
        self.pending.borrow_mut().push(update);
        if !self.registered.replace(true) {
            self.clock.add_resolve(self.clone());
        }
    }

    fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}

impl Resolve for StagedUpdates {
    fn resolve(&self) {
        self.registered.set(false);
        let updates = std::mem::take(&mut *self.pending.borrow_mut());
        self.state.borrow_mut().apply(updates);
    }
}

pub struct Switch {
    pub entity: Rc<Entity>,
    state: Rc<RefCell<SwitchState>>,
    staged: Rc<StagedUpdates>,
}

impl Switch {
    pub fn new_and_register(
        engine: &Engine,
        parent: &Rc<Entity>,
        name: &str,
        config: SwitchConfig,
    ) -> Result<Rc<Self>, SimError> {
        config.validate()?;
        let entity = Rc::new(Entity::new(parent, name));
        let state = Rc::new(RefCell::new(SwitchState::new(&entity, &config)?));
        info!(entity ; "{} ports, {} table of {} entries, {} arbitration, {} on egress overflow",
            config.num_ports, config.table_kind, config.table_capacity, config.arbiter,
            config.overflow_policy);

        let staged = Rc::new(StagedUpdates {
            state: state.clone(),
            clock: engine.default_clock(),
            pending: RefCell::new(Vec::new()),
            registered: Cell::new(false),
        });
        let rc_self = Rc::new(Self {
            entity,
            state,
            staged,
        });
        engine.register(rc_self.clone());
        Ok(rc_self)
    }

    fn check_port(&self, port: usize) -> SimResult {
        let num_ports = self.num_ports();
        if port >= num_ports {
            return sim_error!(format!("Port {port} out of range ({num_ports} ports)"));
        }
        Ok(())
    }

    #[must_use]
    pub fn num_ports(&self) -> usize {
        self.state.borrow().num_ports()
    }

    /// Queue a frame for the peer on `port` to send into the switch.
    pub fn inject(&self, port: usize, frame: Frame) -> SimResult {
        self.check_port(port)?;
        let mut state = self.state.borrow_mut();
        enter!(state.ports[port].peer.entity ; frame.id());
        state.ports[port].peer.send(frame);
        Ok(())
    }

    /// Every frame the peer on `port` has received so far.
    pub fn take_received(&self, port: usize) -> Result<Vec<Frame>, SimError> {
        self.check_port(port)?;
        Ok(self.state.borrow_mut().ports[port].peer.take_received())
    }

    /// PAUSE frames received by the peer on `port`.
    pub fn peer_pauses_received(&self, port: usize) -> Result<u64, SimError> {
        self.check_port(port)?;
        Ok(self.state.borrow().ports[port].peer.pauses_received())
    }

    /// Frames the peer on `port` has still to send.
    pub fn peer_pending(&self, port: usize) -> Result<usize, SimError> {
        self.check_port(port)?;
        Ok(self.state.borrow().ports[port].peer.num_pending())
    }

    pub fn port_stats(&self, port: usize) -> Result<PortStats, SimError> {
        self.state.borrow().stats.snapshot(port)
    }

    /// Counters summed over all ports.
    #[must_use]
    pub fn totals(&self) -> PortStats {
        self.state.borrow().stats.totals()
    }

    pub fn egress_occupancy_percent(&self, port: usize) -> Result<u32, SimError> {
        self.check_port(port)?;
        Ok(self.state.borrow().ports[port].egress.occupancy_percent())
    }

    /// The flow-control unit of `port` is holding its peer off.
    pub fn is_pause_asserted(&self, port: usize) -> Result<bool, SimError> {
        self.check_port(port)?;
        Ok(self.state.borrow().ports[port].fcu.is_asserted())
    }

    /// The flow-control unit of `port` has fallen back to local
    /// backpressure.
    pub fn is_flow_control_degraded(&self, port: usize) -> Result<bool, SimError> {
        self.check_port(port)?;
        Ok(self.state.borrow().ports[port].fcu.is_degraded())
    }

    /// The peer on `port` is currently obeying a PAUSE request.
    pub fn peer_paused(&self, port: usize, now: u64) -> Result<bool, SimError> {
        self.check_port(port)?;
        Ok(self.state.borrow().ports[port].peer.is_paused(now))
    }

    #[must_use]
    pub fn lookup(&self, addr: &MacAddr) -> Option<usize> {
        self.state.borrow().table.lookup(addr)
    }

    #[must_use]
    pub fn table_len(&self) -> usize {
        self.state.borrow().table.len()
    }

    #[must_use]
    pub fn read_table_entry(&self, slot: usize) -> Option<TableEntry> {
        self.state.borrow().table.read_slot(slot)
    }

    /// All occupied table slots, lowest first.
    #[must_use]
    pub fn table_entries(&self) -> Vec<(usize, TableEntry)> {
        self.state.borrow().table.entries()
    }

    /// Stage a write of one table slot.
    pub fn write_table_entry(&self, slot: usize, addr: MacAddr, port: usize) -> SimResult {
        self.check_port(port)?;
        let capacity = self.state.borrow().table.capacity();
        if slot >= capacity {
            return sim_error!(format!(
                "Table slot {slot} out of range (capacity {capacity})"
            ));
        }
        if !addr.is_unicast() {
            return sim_error!(format!("Cannot write non-unicast address {addr}"));
        }
        self.staged.push(Update::TableEntry { slot, addr, port });
        Ok(())
    }

    #[must_use]
    pub fn error_vector(&self) -> ErrorVector {
        self.state.borrow().errors
    }

    /// State of the interrupt line.
    #[must_use]
    pub fn irq(&self) -> bool {
        self.state.borrow().errors.irq()
    }

    #[must_use]
    pub fn scrub_pending(&self) -> bool {
        self.state.borrow().scrub.pending()
    }
}

impl RegisterBus for Switch {
    fn read(&self, addr: u32) -> Result<u32, SimError> {
        let addr = RegAddr::decode(addr, self.num_ports())?;
        addr.check_read()?;
        Ok(self.state.borrow_mut().read_register(addr))
    }

    fn write(&self, addr: u32, value: u32) -> SimResult {
        let addr = RegAddr::decode(addr, self.num_ports())?;
        self.state.borrow().check_write(addr, value)?;
        self.staged.push(Update::Register { addr, value });
        Ok(())
    }
}

impl Runnable for Switch {
    fn tick(&self, now: ClockTick) -> SimResult {
        let learns = self.state.borrow_mut().tick(now.tick());
        for (addr, port) in learns {
            self.staged.push(Update::Learn { addr, port });
        }
        Ok(())
    }

    fn is_idle(&self) -> bool {
        self.staged.is_empty() && self.state.borrow().is_idle()
    }
}
