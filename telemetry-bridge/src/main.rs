//! Telemetry Bridge
//!
//! Embedded-style bridge between a vehicle CAN bus and a polling dashboard:
//! decodes a fixed subset of J1939 parameter groups into engineering-unit
//! values and serves the latest snapshot over HTTP. Uses the j1939-decoder
//! library and adds:
//! - Device operating-mode state machine (provisioning/connecting/monitoring)
//! - Network provisioning seam with a simulated collaborator
//! - The HTTP snapshot/provisioning/reset endpoints
//! - TOML configuration and CLI

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::time::Instant;

mod config;
mod mode;
mod net;
mod server;

use config::BridgeConfig;
use j1939_decoder::{
    decode, CanBusConfig, DecodeTable, FrameSource, SimulatedBus, TelemetryStore,
};
use mode::{DeviceMode, ModeChange, ModeMachine, ModePolicy};
use net::SimulatedNetwork;
use server::{AppContext, BridgeState};

/// Telemetry Bridge - decode J1939 frames and serve snapshots over HTTP
#[derive(Parser, Debug)]
#[command(name = "telemetry-bridge")]
#[command(about = "J1939 CAN telemetry bridge with HTTP snapshot server", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (bridge.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address override (e.g. 127.0.0.1:8080)
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

/// Spacing between frame polls while monitoring
const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    log::info!("Telemetry Bridge v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", j1939_decoder::VERSION);

    let mut config = BridgeConfig::load_or_default(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.http.listen = listen;
    }

    let table = match &config.can.decode_table {
        Some(path) => DecodeTable::from_toml_file(path)?,
        None => DecodeTable::builtin(),
    };
    log::info!(
        "decode table ready: {} PGNs, {} signals",
        table.len(),
        table.signal_count()
    );
    let bus_config = CanBusConfig::for_table(config.can.bit_rate, &table);

    let ctx = AppContext {
        store: Arc::new(RwLock::new(TelemetryStore::new())),
        bridge: Arc::new(Mutex::new(BridgeState {
            machine: ModeMachine::new(ModePolicy {
                max_attempts: config.wifi.max_attempts,
                link_loss_threshold: config.wifi.link_loss_threshold,
            }),
            network: Box::new(SimulatedNetwork::new()),
        })),
    };

    let server_ctx = ctx.clone();
    let listen = config.http.listen.clone();
    tokio::spawn(async move {
        if let Err(e) = server::serve(&listen, server_ctx).await {
            log::error!("snapshot server error: {e:#}");
        }
    });

    run_bridge(ctx, config, table, bus_config, SimulatedBus::new()).await
}

/// The cooperative bridge loop
///
/// Each iteration services the mode machine at the configured spacing, then
/// while monitoring reads at most one pending frame, decodes it and applies
/// the result to the store, then yields.
async fn run_bridge(
    ctx: AppContext,
    config: BridgeConfig,
    table: DecodeTable,
    bus_config: CanBusConfig,
    mut source: impl FrameSource,
) -> Result<()> {
    let service_interval = Duration::from_millis(config.wifi.retry_interval_ms);
    let mut next_service = Instant::now();

    loop {
        if Instant::now() >= next_service {
            next_service += service_interval;
            service_mode(&ctx, &table, &bus_config, &mut source);
        }

        let monitoring =
            ctx.bridge.lock().unwrap().machine.mode() == DeviceMode::Monitoring;
        if monitoring {
            match source.poll_frame() {
                Ok(Some(frame)) => {
                    let output = decode(&frame, &table);
                    let mut store = ctx.store.write().unwrap();
                    store.record_raw(&frame);
                    store.apply(&output.observations);
                    store.add_decode_errors(output.skipped_signals);
                }
                Ok(None) => {}
                Err(e) => log::warn!("transport read failure: {e}"),
            }
            ctx.store.write().unwrap().tick_rate();
        }

        tokio::time::sleep(FRAME_POLL_INTERVAL).await;
    }
}

/// One mode-machine step plus the link-state refresh for the next snapshot
fn service_mode(
    ctx: &AppContext,
    table: &DecodeTable,
    bus_config: &CanBusConfig,
    source: &mut impl FrameSource,
) {
    let mut bridge = ctx.bridge.lock().unwrap();
    let BridgeState { machine, network } = &mut *bridge;

    match machine.service(network.as_mut()) {
        Some(ModeChange::Connected) => {
            log::info!(
                "monitoring started: {} PGNs, {} bit/s",
                table.len(),
                bus_config.bit_rate
            );
            if let Err(e) = source.configure(bus_config) {
                log::error!("bus configuration failed: {e}");
            }
        }
        Some(ModeChange::AttemptsExhausted) | Some(ModeChange::LinkLost) => {
            ctx.store.write().unwrap().clear();
        }
        _ => {}
    }

    let status = network.status();
    let connected = machine.mode() == DeviceMode::Monitoring && status.associated;
    ctx.store
        .write()
        .unwrap()
        .set_link(connected, status.signal_dbm);
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_secs()
        .init();
}
