// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Simulate a switch forwarding generated traffic between its ports.
//!
//! Settings are layered, later sources winning:
//!  - built-in defaults,
//!  - an optional TOML file given with `--config`,
//!  - environment variables prefixed `SIM_SWITCH_`, with nested fields
//!    separated by `__` (e.g. `SIM_SWITCH_SWITCH__NUM_PORTS=8`),
//!  - command-line options.
//!
//! Every station first broadcasts an ARP frame so that the switch learns
//! it, then the generated frames are sent and the simulation runs until the
//! switch is idle (or `--finish-tick` is reached).

use std::path::PathBuf;
use std::rc::Rc;

use beat_engine::engine::Engine;
use beat_engine::sim_error;
use beat_engine::traits::Runnable;
use beat_engine::types::{SimError, SimResult};
use beat_switch::address_table::TableKind;
use beat_switch::arbiter::ArbiterKind;
use beat_switch::config::SwitchConfig;
use beat_switch::egress::OverflowPolicy;
use beat_switch::frame::{EtherType, Frame, MacAddr};
use beat_switch::stats::CounterId;
use beat_switch::switch::Switch;
use beat_switch::traffic::{FrameGen, TrafficPattern, station_mac, station_port};
use beat_track::builder::{TrackerConfig, TrackersConfig, setup_trackers};
use beat_track::entity::Entity;
use beat_track::{Track, Tracker, error, info, warn};
use byte_unit::{AdjustedByte, Byte, UnitType};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use indicatif::ProgressBar;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use simplelog::{ConfigBuilder, SimpleLogger};

/// Command-line arguments.
#[derive(Parser)]
#[command(about = "Ethernet switch evaluation application")]
struct Cli {
    /// TOML file of settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Level of messages printed while the simulation is being set up.
    #[arg(long, default_value = "Info")]
    log_level: log::Level,

    /// Enable logging to the console.
    #[arg(long, default_value = "false")]
    stdout: bool,

    /// Level of log message to display.
    #[arg(long, default_value = "Info")]
    stdout_level: log::Level,

    /// Set a regular expression for which entites should have logging level set
    /// to `--stdout-level`. Others will have level set to `Error`.
    #[arg(long, default_value = "")]
    stdout_filter_regex: String,

    /// Enable logging to a text trace file.
    #[arg(long, default_value = "false")]
    trace: bool,

    /// Level of trace events to record.
    #[arg(long, default_value = "Trace")]
    trace_level: log::Level,

    /// Set a regular expression for which entites should have trace level set
    /// to `--trace-level`. Others will have level set to `Error`.
    #[arg(long, default_value = "")]
    trace_filter_regex: String,

    /// The filename trace output is written to.
    #[arg(long, default_value = "trace.txt")]
    trace_file: String,

    /// Show a progress bar for the delivered frame count (updated at the rate
    /// defined by `progress_ticks`).
    #[arg(long)]
    progress: bool,

    /// Number of ticks between collecting delivered frames.
    #[arg(long, default_value = "1000")]
    progress_ticks: u64,

    /// Configure a clock tick on which to terminate the simulation. Use 0 to
    /// run until completion.
    #[arg(long, default_value = "0")]
    finish_tick: u64,

    /// Ticks after which a switch that is still busy is reported as
    /// deadlocked.
    #[arg(long, default_value = "10000000")]
    max_ticks: u64,

    /// The number of switch ports.
    #[arg(long)]
    num_ports: Option<usize>,

    /// What traffic pattern to use.
    #[clap(long, value_enum)]
    traffic_pattern: Option<TrafficPattern>,

    /// Egress arbitration policy.
    #[clap(long, value_enum)]
    arbiter: Option<ArbiterKind>,

    /// What an egress queue does with a frame that does not fit.
    #[clap(long, value_enum)]
    overflow_policy: Option<OverflowPolicy>,

    /// Address table implementation.
    #[clap(long, value_enum)]
    table_kind: Option<TableKind>,

    /// Number of frames each station sends.
    #[arg(long)]
    frames_per_port: Option<usize>,

    /// Destination port for `all-to-one` traffic.
    #[arg(long)]
    dest_port: Option<usize>,

    /// Fraction of frames sent with a bad FCS.
    #[arg(long)]
    corrupt_fraction: Option<f64>,

    /// Seed for random number generator.
    #[arg(long)]
    seed: Option<u64>,

    /// Disable PAUSE generation.
    #[arg(long)]
    no_flow_control: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct TrafficSettings {
    pattern: TrafficPattern,
    frames_per_port: usize,
    min_frame_bytes: usize,
    max_frame_bytes: usize,
    dest_port: usize,
    corrupt_fraction: f64,
    seed: u64,
}

impl Default for TrafficSettings {
    fn default() -> Self {
        Self {
            pattern: TrafficPattern::default(),
            frames_per_port: 1000,
            min_frame_bytes: 64,
            max_frame_bytes: 1518,
            dest_port: 0,
            corrupt_fraction: 0.0,
            seed: 1,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Settings {
    switch: SwitchConfig,
    traffic: TrafficSettings,
}

impl Settings {
    fn load(args: &Cli) -> Result<Self, SimError> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = &args.config {
            if !path.exists() {
                return sim_error!(format!("Config file {} not found", path.display()));
            }
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("SIM_SWITCH_").split("__"));

        let mut settings: Settings = figment
            .extract()
            .map_err(|e| SimError(format!("Invalid settings: {e}")))?;
        settings.merge_cli(args);
        settings.validate()?;
        Ok(settings)
    }

    fn merge_cli(&mut self, args: &Cli) {
        if let Some(num_ports) = args.num_ports {
            self.switch.num_ports = num_ports;
        }
        if let Some(arbiter) = args.arbiter {
            self.switch.arbiter = arbiter;
        }
        if let Some(overflow_policy) = args.overflow_policy {
            self.switch.overflow_policy = overflow_policy;
        }
        if let Some(table_kind) = args.table_kind {
            self.switch.table_kind = table_kind;
        }
        if args.no_flow_control {
            self.switch.flow_control.enabled = false;
        }
        if let Some(pattern) = args.traffic_pattern {
            self.traffic.pattern = pattern;
        }
        if let Some(frames_per_port) = args.frames_per_port {
            self.traffic.frames_per_port = frames_per_port;
        }
        if let Some(dest_port) = args.dest_port {
            self.traffic.dest_port = dest_port;
        }
        if let Some(corrupt_fraction) = args.corrupt_fraction {
            self.traffic.corrupt_fraction = corrupt_fraction;
        }
        if let Some(seed) = args.seed {
            self.traffic.seed = seed;
        }
    }

    fn validate(&self) -> SimResult {
        self.switch.validate()?;
        let traffic = &self.traffic;
        if self.switch.num_ports < 2 {
            return sim_error!("Traffic needs at least two ports");
        }
        if traffic.dest_port >= self.switch.num_ports {
            return sim_error!(format!(
                "Destination port {} out of range ({} ports)",
                traffic.dest_port, self.switch.num_ports
            ));
        }
        let largest = self.switch.frame_limits().max_accepted();
        if traffic.min_frame_bytes > traffic.max_frame_bytes || traffic.max_frame_bytes > largest
        {
            return sim_error!(format!(
                "Frame sizes {}..={} must be ordered and no larger than {largest}",
                traffic.min_frame_bytes, traffic.max_frame_bytes
            ));
        }
        if !(0.0..=1.0).contains(&traffic.corrupt_fraction) {
            return sim_error!("Corrupt fraction must be between 0 and 1");
        }
        Ok(())
    }
}

/// Data frames that reached the station they were addressed to.
#[derive(Default)]
struct Delivered {
    frames: usize,
    bytes: u64,
}

impl Delivered {
    fn collect(&mut self, switch: &Switch) -> SimResult {
        for port in 0..switch.num_ports() {
            for frame in switch.take_received(port)? {
                let is_data = frame
                    .header()
                    .is_some_and(|h| h.ethertype == EtherType::LOCAL_EXPERIMENTAL);
                if is_data && station_port(&frame.dst()) == Some(port) {
                    self.frames += 1;
                    self.bytes += frame.len() as u64;
                }
            }
        }
        Ok(())
    }
}

fn setup_logger(level: log::Level) {
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_location_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();
    if let Err(e) = SimpleLogger::init(level.to_level_filter(), config) {
        eprintln!("Unable to set up logging: {e}");
    }
}

fn setup_all_trackers(args: &Cli) -> Result<Tracker, SimError> {
    let config = TrackersConfig {
        stdout: TrackerConfig {
            enable: args.stdout,
            level: args.stdout_level,
            filter_regex: &args.stdout_filter_regex,
            file: None,
        },
        file: TrackerConfig {
            enable: args.trace,
            level: args.trace_level,
            filter_regex: &args.trace_filter_regex,
            file: Some(&args.trace_file),
        },
    };
    setup_trackers(&config).map_err(|e| SimError(e.to_string()))
}

/// Queue the station announcements and generated frames on every port.
/// Returns the number of frames that should be delivered.
fn load_traffic(
    top: &Rc<Entity>,
    switch: &Switch,
    traffic: &TrafficSettings,
) -> Result<usize, SimError> {
    let num_ports = switch.num_ports();
    for port in 0..num_ports {
        let announce = Frame::build(
            top,
            MacAddr::BROADCAST,
            station_mac(port),
            EtherType::ARP,
            &[],
        );
        switch.inject(port, announce)?;
    }

    let mut expected = 0;
    for source in 0..num_ports {
        if traffic.pattern == TrafficPattern::AllToOne && source == traffic.dest_port {
            continue;
        }
        let mut frames = FrameGen::new(
            top,
            source,
            num_ports,
            traffic.dest_port,
            traffic.pattern,
            (traffic.min_frame_bytes, traffic.max_frame_bytes),
            traffic.frames_per_port,
            traffic.seed,
        )
        .with_corruption(traffic.corrupt_fraction);
        for frame in frames.by_ref() {
            switch.inject(source, frame)?;
        }
        expected += traffic.frames_per_port - frames.num_corrupted();
    }
    Ok(expected)
}

fn run(
    engine: &Engine,
    switch: &Switch,
    args: &Cli,
    progress_bar: &ProgressBar,
    delivered: &mut Delivered,
) -> SimResult {
    let clock = engine.default_clock();
    let progress_ticks = args.progress_ticks.max(1);
    loop {
        let now = clock.tick_now().tick();
        if switch.is_idle() {
            break;
        }
        if args.finish_tick != 0 && now >= args.finish_tick {
            info!(engine.top() ; "Finished at tick {}", now);
            break;
        }
        if now >= args.max_ticks {
            return sim_error!(format!("Deadlock: switch still busy at tick {now}"));
        }
        engine.step()?;
        if (now + 1) % progress_ticks == 0 {
            delivered.collect(switch)?;
            progress_bar.set_position(delivered.frames as u64);
        }
    }
    delivered.collect(switch)
}

fn main() -> Result<(), SimError> {
    let args = Cli::parse();
    setup_logger(args.log_level);

    let settings = Settings::load(&args).inspect_err(|e| log::error!("{e}"))?;
    log::info!(
        "{} ports, {} traffic, {} frames per port, seed {}",
        settings.switch.num_ports,
        settings.traffic.pattern,
        settings.traffic.frames_per_port,
        settings.traffic.seed
    );

    let tracker = setup_all_trackers(&args).inspect_err(|e| log::error!("{e}"))?;
    let engine = Engine::new_with_clock_mhz(&tracker, settings.switch.core_clock_mhz);
    let top = engine.top().clone();
    let switch = Switch::new_and_register(&engine, &top, "switch", settings.switch.clone())?;

    let expected = load_traffic(&top, &switch, &settings.traffic)?;
    info!(top ; "Platform built: {} frames to deliver", expected);

    let progress_bar = if args.progress {
        ProgressBar::new(expected as u64)
    } else {
        ProgressBar::hidden()
    };

    let mut delivered = Delivered::default();
    let result = run(&engine, &switch, &args, &progress_bar, &mut delivered);
    progress_bar.finish();
    if let Err(e) = result {
        error!(top ; "{}", e);
        error!(top ; "{}/{} frames delivered", delivered.frames, expected);
        tracker.shutdown();
        return Err(e);
    }

    if delivered.frames != expected && args.finish_tick == 0 {
        warn!(top ; "{}/{} frames delivered", delivered.frames, expected);
    }
    print_summary(&switch, engine.time_now_ns(), &delivered)?;
    tracker.shutdown();
    Ok(())
}

/// The summary is written through `log` so that it is shown whatever the
/// tracker levels are.
fn print_summary(switch: &Switch, time_now_ns: f64, delivered: &Delivered) -> SimResult {
    let time_now_s = time_now_ns / (1000.0 * 1000.0 * 1000.0);
    let (total, per_second) = compute_adjusted_value_and_rate(time_now_s, delivered.bytes);
    log::info!("Delivered {} frames in {:.2}ns.", delivered.frames, time_now_ns);
    log::info!("Total: {total:.2} ({per_second:.2}/s).");

    for port in 0..switch.num_ports() {
        let stats = switch.port_stats(port)?;
        log::info!(
            "port{}: rx {} tx {} flooded {} drops {} (fcs {}, overflow {}/{}) pause {}/{} stalls {}",
            port,
            stats.get(CounterId::RxFrames),
            stats.get(CounterId::TxFrames),
            stats.get(CounterId::Flooded),
            stats.total_drops(),
            stats.get(CounterId::DropChecksum),
            stats.get(CounterId::DropIngressOverflow),
            stats.get(CounterId::DropEgressOverflow),
            stats.get(CounterId::PauseSent),
            stats.get(CounterId::PauseReceived),
            stats.get(CounterId::AdmissionStall)
        );
    }

    let errors = switch.error_vector().value();
    if errors != 0 {
        log::warn!("Error vector 0x{errors:02x}");
    }
    Ok(())
}

fn compute_adjusted_value_and_rate(
    time_now_s: f64,
    num_bytes: u64,
) -> (AdjustedByte, AdjustedByte) {
    // Convert to a binary-only unit (KiB, MiB, etc)
    let count = Byte::from_u64(num_bytes).get_appropriate_unit(UnitType::Binary);
    let per_second = Byte::from_f64(num_bytes as f64 / time_now_s).unwrap_or(Byte::from_u64(0));
    let count_per_second = per_second.get_appropriate_unit(UnitType::Binary);
    (count, count_per_second)
}
