// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

#![allow(dead_code)]

use std::collections::HashMap;
use std::rc::Rc;

use beat_engine::engine::Engine;
use beat_switch::config::SwitchConfig;
use beat_switch::frame::{EtherType, Frame, MacAddr};
use beat_switch::switch::Switch;
use beat_switch::traffic::{FrameGen, TrafficPattern, frame_tag, station_mac};

pub const SEED: u64 = 0x5EED_BEA7;

pub fn build_switch(engine: &Engine, config: SwitchConfig) -> Rc<Switch> {
    Switch::new_and_register(engine, engine.top(), "switch", config).unwrap()
}

/// Have the stations on `ports` broadcast so that the switch learns them,
/// then throw away everything that was delivered.
pub fn announce(engine: &Engine, switch: &Switch, ports: impl IntoIterator<Item = usize>) {
    for port in ports {
        let frame = Frame::build(
            engine.top(),
            MacAddr::BROADCAST,
            station_mac(port),
            EtherType::ARP,
            &[],
        );
        switch.inject(port, frame).unwrap();
    }
    engine.run().unwrap();
    for port in 0..switch.num_ports() {
        switch.take_received(port).unwrap();
    }
}

/// Queue `num_frames` generated frames on each of `sources`.
pub fn send_traffic(
    engine: &Engine,
    switch: &Switch,
    sources: impl IntoIterator<Item = usize>,
    dest: usize,
    pattern: TrafficPattern,
    frame_bytes: (usize, usize),
    num_frames: usize,
) {
    let num_ports = switch.num_ports();
    for source in sources {
        let generator = FrameGen::new(
            engine.top(),
            source,
            num_ports,
            dest,
            pattern,
            frame_bytes,
            num_frames,
            SEED,
        );
        for frame in generator {
            switch.inject(source, frame).unwrap();
        }
    }
}

/// Only the generated frames, dropping PAUSE and announcement frames.
pub fn data_frames(frames: Vec<Frame>) -> Vec<Frame> {
    frames
        .into_iter()
        .filter(|f| f.header().is_some_and(|h| h.ethertype == EtherType::LOCAL_EXPERIMENTAL))
        .collect()
}

/// Check that the frames from each source arrived in the order sent.
pub fn check_in_order(frames: &[Frame]) {
    let mut last_seq: HashMap<usize, u64> = HashMap::new();
    for frame in frames {
        let (source, seq) = frame_tag(frame).unwrap();
        if let Some(last) = last_seq.insert(source, seq) {
            assert!(seq > last, "source {source}: frame {seq} after {last}");
        }
    }
}

/// Sources of the frames in arrival order.
pub fn sources(frames: &[Frame]) -> Vec<usize> {
    frames.iter().map(|f| frame_tag(f).unwrap().0).collect()
}
