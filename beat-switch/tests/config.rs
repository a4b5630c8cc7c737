// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use beat_switch::arbiter::ArbiterKind;
use beat_switch::config::SwitchConfig;
use beat_switch::egress::OverflowPolicy;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serial_test::serial;

fn layered(file: &str) -> Figment {
    Figment::from(Serialized::defaults(SwitchConfig::default()))
        .merge(Toml::file(file))
        .merge(Env::prefixed("BEAT_").split("__"))
}

#[test]
#[serial]
fn file_then_environment() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "switch.toml",
            r#"
                num_ports = 6
                arbiter = "weighted-round-robin"
                overflow_policy = "drop-oldest"
                scrub_interval_ticks = 1000

                [flow_control]
                high_water_percent = 80

                [port_defaults]
                egress_bytes = 16384

                [[ports]]
                weight = 3
                can_stall = false
            "#,
        )?;
        jail.set_env("BEAT_NUM_PORTS", 8);
        jail.set_env("BEAT_FLOW_CONTROL__LOW_WATER_PERCENT", 40);

        let config: SwitchConfig = layered("switch.toml").extract()?;
        config.validate().map_err(|e| e.to_string())?;

        assert_eq!(config.num_ports, 8);
        assert_eq!(config.arbiter, ArbiterKind::WeightedRoundRobin);
        assert_eq!(config.overflow_policy, OverflowPolicy::DropOldest);
        assert_eq!(config.scrub_interval_ticks, 1000);
        assert_eq!(config.flow_control.high_water_percent, 80);
        assert_eq!(config.flow_control.low_water_percent, 40);
        assert!(config.flow_control.enabled);

        // Listed ports only change what they name
        assert_eq!(config.port(0).weight, 3);
        assert!(!config.port(0).can_stall);
        assert_eq!(config.port(0).egress_bytes, 8192);
        assert_eq!(config.port(5).weight, 1);
        assert_eq!(config.port(5).egress_bytes, 16384);
        Ok(())
    });
}

#[test]
#[serial]
fn missing_file_gives_defaults() {
    figment::Jail::expect_with(|_jail| {
        let config: SwitchConfig = layered("absent.toml").extract()?;
        assert_eq!(config, SwitchConfig::default());
        Ok(())
    });
}

#[test]
#[serial]
fn invalid_settings_rejected() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "switch.toml",
            r#"
                [flow_control]
                high_water_percent = 20
            "#,
        )?;
        let config: SwitchConfig = layered("switch.toml").extract()?;
        assert!(config.validate().is_err());

        jail.set_env("BEAT_ARBITER", "lottery");
        assert!(layered("switch.toml").extract::<SwitchConfig>().is_err());
        Ok(())
    });
}
