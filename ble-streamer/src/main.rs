/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info, warn};

use ble_streamer::config::StreamerConfig;
use ble_streamer::runtime::simulate;

// ── CLI argument definition ───────────────────────────────────────────────────

/// BLE notification streamer, driven against a simulated link.
///
/// Example:
///   ble-streamer -c demos/streamer.yaml -d 15000
#[derive(Debug, Parser)]
#[command(
    name = "ble-streamer",
    about = "Fair multi-connection BLE notification streamer – simulated run",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML streamer configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Run length in milliseconds (overrides the configuration file).
    #[arg(short = 'd', long = "duration-ms")]
    duration_ms: Option<u64>,

    /// Number of default peers to simulate (replaces the configured peers).
    #[arg(short = 'p', long = "peers")]
    peers: Option<usize>,

    /// Delay between a readiness request and its callback, in milliseconds.
    #[arg(long = "readiness-delay-ms")]
    readiness_delay_ms: Option<u64>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(
        config = ?cli.config,
        duration_ms = ?cli.duration_ms,
        peers = ?cli.peers,
        readiness_delay_ms = ?cli.readiness_delay_ms,
        "BLE streamer starting up..."
    );

    // ── Load configuration ────────────────────────────────────────────────────
    let mut config = match &cli.config {
        Some(path) => match StreamerConfig::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load configuration: {:#}", e);
                process::exit(1);
            }
        },
        None => {
            warn!("No configuration file provided, using default settings");
            StreamerConfig::default()
        }
    };

    if let Some(duration_ms) = cli.duration_ms {
        config.simulation.duration_ms = duration_ms;
    }
    if let Some(peers) = cli.peers {
        config.simulation = config.simulation.with_default_peers(peers);
    }
    if let Some(delay) = cli.readiness_delay_ms {
        config.simulation.readiness_delay_ms = delay;
    }

    // ── Run ───────────────────────────────────────────────────────────────────
    let summary = match simulate(&config).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Simulation failed: {:#}", e);
            process::exit(1);
        }
    };

    info!(
        cycles = summary.stats.cycles,
        bytes_sent = summary.stats.bytes_sent,
        send_failures = summary.stats.send_failures,
        rejected_connections = summary.stats.rejected_connections,
        "Run complete"
    );
    for (label, bytes) in summary.bytes_by_label() {
        let windows = summary.reports_for(label).count();
        info!("  [{label}]  {bytes} bytes reported over {windows} window(s)");
    }
}
