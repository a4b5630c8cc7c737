// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::collections::HashSet;

use beat_engine::test_helpers::start_test;
use beat_engine::traits::Runnable;
use beat_switch::checksum::append_fcs;
use beat_switch::config::SwitchConfig;
use beat_switch::error_vector::ErrorBit;
use beat_switch::frame::{EtherType, Frame, MacAddr};
use beat_switch::registers::{Reg, RegisterBus};
use beat_switch::stats::CounterId;
use beat_switch::traffic::{FrameGen, TrafficPattern, frame_tag, station_mac, station_port};

mod common;
use common::*;

const NUM_PORTS: usize = 4;

#[test]
fn round_trip() {
    let engine = start_test(file!());
    let switch = build_switch(&engine, SwitchConfig::with_ports(NUM_PORTS));
    announce(&engine, &switch, 0..NUM_PORTS);

    let top = engine.top();
    let corrupt_per_port = [13, 13, 12, 12];
    let mut num_corrupted = 0;
    for source in 0..NUM_PORTS {
        let valid = FrameGen::new(
            top,
            source,
            NUM_PORTS,
            0,
            TrafficPattern::Random,
            (64, 1518),
            250,
            SEED,
        );
        let mut corrupt = FrameGen::new(
            top,
            source,
            NUM_PORTS,
            0,
            TrafficPattern::Random,
            (64, 1518),
            corrupt_per_port[source],
            SEED + 1,
        )
        .with_corruption(1.0);

        for (i, frame) in valid.enumerate() {
            switch.inject(source, frame).unwrap();
            if i % 19 == 0 {
                if let Some(bad) = corrupt.next() {
                    switch.inject(source, bad).unwrap();
                }
            }
        }
        num_corrupted += corrupt.num_corrupted();
    }
    assert_eq!(num_corrupted, 50);

    engine.run().unwrap();

    let mut delivered = HashSet::new();
    for port in 0..NUM_PORTS {
        let frames = data_frames(switch.take_received(port).unwrap());
        check_in_order(&frames);
        for frame in &frames {
            assert!(frame.has_valid_fcs());
            assert_eq!(station_port(&frame.dst()), Some(port));
            assert!(delivered.insert(frame_tag(frame).unwrap()));
        }
    }
    assert_eq!(delivered.len(), 1000);

    let totals = switch.totals();
    assert_eq!(totals.get(CounterId::DropChecksum), 50);
    assert_eq!(totals.total_drops(), 50);
    assert_eq!(totals.get(CounterId::RxFrames), 1000 + NUM_PORTS as u64);
    assert_eq!(
        totals.get(CounterId::TxFrames),
        1000 + (NUM_PORTS * (NUM_PORTS - 1)) as u64
    );
    // Only the announcements were flooded
    assert_eq!(totals.get(CounterId::Flooded), NUM_PORTS as u64);
    assert!(switch.error_vector().is_set(ErrorBit::Checksum));
}

#[test]
fn unknown_destination_floods() {
    let engine = start_test(file!());
    let switch = build_switch(&engine, SwitchConfig::with_ports(NUM_PORTS));

    let frame = Frame::build(
        engine.top(),
        station_mac(2),
        station_mac(0),
        EtherType::IPV4,
        &[],
    );
    switch.inject(0, frame).unwrap();
    engine.run().unwrap();

    assert!(switch.take_received(0).unwrap().is_empty());
    for port in 1..NUM_PORTS {
        assert_eq!(switch.take_received(port).unwrap().len(), 1);
    }
    let stats = switch.port_stats(0).unwrap();
    assert_eq!(stats.get(CounterId::Flooded), 1);
    assert_eq!(switch.lookup(&station_mac(0)), Some(0));
}

#[test]
fn learned_on_ingress_is_dropped() {
    let engine = start_test(file!());
    let switch = build_switch(&engine, SwitchConfig::with_ports(NUM_PORTS));
    announce(&engine, &switch, [0]);

    // A second station behind port 0 talking to the first
    let other = MacAddr::from_u64(0x0200_0000_00AA);
    let frame = Frame::build(engine.top(), station_mac(0), other, EtherType::IPV4, &[]);
    switch.inject(0, frame).unwrap();
    engine.run().unwrap();

    for port in 0..NUM_PORTS {
        assert!(switch.take_received(port).unwrap().is_empty());
    }
    let stats = switch.port_stats(0).unwrap();
    assert_eq!(stats.get(CounterId::DropNoDestination), 1);
    assert_eq!(switch.lookup(&other), Some(0));
}

#[test]
fn invalid_addresses_dropped() {
    let engine = start_test(file!());
    let switch = build_switch(&engine, SwitchConfig::with_ports(NUM_PORTS));
    let top = engine.top();

    // Multicast source, all-zero destination, MAC control destination
    let group = MacAddr::from_u64(0x0100_5E00_0001);
    let control = MacAddr::from_u64(0x0180_C200_0002);
    for (dst, src) in [
        (station_mac(1), group),
        (MacAddr::NONE, station_mac(0)),
        (control, station_mac(0)),
    ] {
        switch
            .inject(0, Frame::build(top, dst, src, EtherType::IPV4, &[]))
            .unwrap();
    }
    engine.run().unwrap();

    for port in 0..NUM_PORTS {
        assert!(switch.take_received(port).unwrap().is_empty());
    }
    let stats = switch.port_stats(0).unwrap();
    assert_eq!(stats.get(CounterId::RxFrames), 3);
    assert_eq!(stats.get(CounterId::DropNoDestination), 2);
    assert_eq!(switch.lookup(&group), None);
}

#[test]
fn frame_errors_are_contained() {
    let engine = start_test(file!());
    let mut config = SwitchConfig::with_ports(2);
    config.port_defaults.ingress_bytes = 16384;
    config.port_defaults.egress_bytes = 16384;
    let switch = build_switch(&engine, config);
    let top = engine.top();

    let mut runt = vec![0; 36];
    runt[..6].copy_from_slice(&station_mac(1).0);
    runt[6..12].copy_from_slice(&station_mac(0).0);
    append_fcs(&mut runt);
    let oversize = || {
        Frame::build(
            top,
            station_mac(1),
            station_mac(0),
            EtherType::IPV4,
            &[0x55; 2000],
        )
    };
    let mut corrupt = Frame::build(top, station_mac(1), station_mac(0), EtherType::IPV4, &[]);
    corrupt.corrupt_fcs();
    let good = Frame::build(top, station_mac(1), station_mac(0), EtherType::IPV4, &[7; 100]);

    switch.inject(0, Frame::new(top, runt)).unwrap();
    switch.inject(0, oversize()).unwrap();
    switch.inject(0, corrupt).unwrap();
    switch.inject(0, good.clone()).unwrap();
    engine.run().unwrap();

    let received = switch.take_received(1).unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].bytes(), good.bytes());

    let stats = switch.port_stats(0).unwrap();
    assert_eq!(stats.get(CounterId::DropRunt), 1);
    assert_eq!(stats.get(CounterId::DropOversize), 1);
    assert_eq!(stats.get(CounterId::DropChecksum), 1);
    assert_eq!(stats.get(CounterId::RxFrames), 1);
    let errors = switch.error_vector();
    assert!(errors.is_set(ErrorBit::Runt));
    assert!(errors.is_set(ErrorBit::Oversize));
    assert!(errors.is_set(ErrorBit::Checksum));
    assert!(!errors.is_set(ErrorBit::IngressOverflow));

    // Jumbo frames are accepted once enabled
    switch.write(Reg::Jumbo as u32, 1).unwrap();
    engine.step().unwrap();
    switch.inject(0, oversize()).unwrap();
    engine.run().unwrap();
    assert_eq!(switch.take_received(1).unwrap().len(), 1);
}

#[test]
fn round_robin_is_fair() {
    let engine = start_test(file!());
    let mut config = SwitchConfig::with_ports(NUM_PORTS);
    config.flow_control.enabled = false;
    config.port_mut(3).egress_bytes = 1518;
    config.port_mut(3).egress_frames = 4;
    let switch = build_switch(&engine, config);
    announce(&engine, &switch, [3]);

    send_traffic(&engine, &switch, 0..3, 3, TrafficPattern::AllToOne, (64, 64), 30);
    engine.run().unwrap();

    let frames = data_frames(switch.take_received(3).unwrap());
    assert_eq!(frames.len(), 90);
    check_in_order(&frames);
    for window in sources(&frames).windows(3) {
        let distinct: HashSet<_> = window.iter().collect();
        assert_eq!(distinct.len(), 3, "unfair window {window:?}");
    }
}

#[test]
fn weighted_round_robin() {
    let engine = start_test(file!());
    let mut config = SwitchConfig::with_ports(NUM_PORTS);
    config.arbiter = beat_switch::arbiter::ArbiterKind::WeightedRoundRobin;
    config.flow_control.enabled = false;
    config.port_mut(0).weight = 2;
    config.port_mut(3).egress_bytes = 1518;
    config.port_mut(3).egress_frames = 4;
    let switch = build_switch(&engine, config);
    announce(&engine, &switch, [3]);

    send_traffic(&engine, &switch, 0..3, 3, TrafficPattern::AllToOne, (64, 64), 60);
    engine.run().unwrap();

    let frames = data_frames(switch.take_received(3).unwrap());
    assert_eq!(frames.len(), 180);
    check_in_order(&frames);

    // While all three are backed up port 0 takes half the grants
    let contended = &sources(&frames)[20..80];
    let from_port0 = contended.iter().filter(|s| **s == 0).count();
    assert!((27..=33).contains(&from_port0), "port 0 had {from_port0} of 60");
}

#[test]
fn multicast_copies() {
    let engine = start_test(file!());
    let switch = build_switch(&engine, SwitchConfig::with_ports(NUM_PORTS));
    let top = engine.top();
    let group = MacAddr::from_u64(0x0100_5E00_0001);
    for i in 0..10u8 {
        let frame = Frame::build(top, group, station_mac(1), EtherType::IPV4, &[i; 200]);
        switch.inject(1, frame).unwrap();
    }
    engine.run().unwrap();

    for port in [0, 2, 3] {
        let received = switch.take_received(port).unwrap();
        assert_eq!(received.len(), 10);
        for (i, frame) in received.iter().enumerate() {
            assert_eq!(frame.payload()[0], i as u8);
        }
    }
    let stats = switch.port_stats(1).unwrap();
    assert_eq!(stats.get(CounterId::RxBroadcastFrames), 10);
    assert_eq!(stats.get(CounterId::Flooded), 10);
    assert!(switch.is_idle());
}
