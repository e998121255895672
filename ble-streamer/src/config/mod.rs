//! Streamer configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! streamer:
//!   max_connections: 3
//!   max_payload_len: 200
//!   default_mtu: 23
//!   report_interval_ms: 3000
//!   connection_interval_units: 12
//!   supervision_timeout_units: 72
//! simulation:
//!   readiness_delay_ms: 10
//!   duration_ms: 10000
//!   peers:
//!     - mtu: 23
//!     - mtu: 247
//!       subscribe_after_ms: 200
//!       disconnect_after_ms: 8000
//!       command: 1
//!       read_back: true
//!       fail_every: 0
//! ```
//!
//! Every key is optional; absent keys fall back to the firmware defaults.

use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::slot::{ATT_DEFAULT_MTU, ATT_OVERHEAD, MAX_LABELS};
use crate::throughput::DEFAULT_REPORT_INTERVAL_MS;

// ── Streamer settings ─────────────────────────────────────────────────────────

/// Parameters of the scheduler itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamerSettings {
    /// Pool capacity; also the number of labels handed out.
    pub max_connections: usize,
    /// Payload buffer size per slot; upper bound for `payload_unit`.
    pub max_payload_len: usize,
    /// MTU assumed until the peer negotiates one.
    pub default_mtu: u16,
    /// Throughput reporting cadence.
    pub report_interval_ms: u32,
    /// Connection interval requested on connect (1.25 ms units).
    pub connection_interval_units: u16,
    /// Supervision timeout requested on connect (10 ms units).
    pub supervision_timeout_units: u16,
}

impl Default for StreamerSettings {
    fn default() -> Self {
        Self {
            max_connections: 3,
            max_payload_len: 200,
            default_mtu: ATT_DEFAULT_MTU,
            report_interval_ms: DEFAULT_REPORT_INTERVAL_MS,
            connection_interval_units: 12,
            supervision_timeout_units: 0x0048,
        }
    }
}

impl StreamerSettings {
    /// Reject values the scheduler cannot honour.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_LABELS).contains(&self.max_connections),
            "max_connections must be between 1 and {MAX_LABELS}, got {}",
            self.max_connections
        );
        ensure!(self.max_payload_len >= 1, "max_payload_len must be at least 1");
        ensure!(
            self.default_mtu > ATT_OVERHEAD,
            "default_mtu must exceed the ATT overhead of {ATT_OVERHEAD} bytes, got {}",
            self.default_mtu
        );
        ensure!(self.report_interval_ms > 0, "report_interval_ms must be non-zero");
        Ok(())
    }
}

// ── Simulation settings ───────────────────────────────────────────────────────

/// Scripted behaviour of one simulated peer.  Times are relative to the
/// start of the run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeerScript {
    pub connect_after_ms: u64,
    /// MTU to negotiate right after connecting; `None` keeps the default.
    pub mtu: Option<u16>,
    /// `None` means the peer never subscribes.
    pub subscribe_after_ms: Option<u64>,
    pub disconnect_after_ms: Option<u64>,
    /// Relay command byte written once subscribed.
    pub command: Option<u8>,
    /// Read the command characteristic back after subscribing.
    pub read_back: bool,
    /// Every n-th send to this peer fails (`0` = never).
    pub fail_every: u32,
}

impl Default for PeerScript {
    fn default() -> Self {
        Self {
            connect_after_ms: 0,
            mtu: None,
            subscribe_after_ms: Some(0),
            disconnect_after_ms: None,
            command: None,
            read_back: false,
            fail_every: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSettings {
    /// Delay between a readiness request and its callback.
    pub readiness_delay_ms: u64,
    /// How long the run lasts.
    pub duration_ms: u64,
    pub peers: Vec<PeerScript>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            readiness_delay_ms: 10,
            duration_ms: 10_000,
            peers: vec![PeerScript::default(), PeerScript::default()],
        }
    }
}

impl SimulationSettings {
    /// Replace the peer list with `count` default peers.
    pub fn with_default_peers(mut self, count: usize) -> Self {
        self.peers = vec![PeerScript::default(); count];
        self
    }
}

// ── StreamerConfig ────────────────────────────────────────────────────────────

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamerConfig {
    pub streamer: StreamerSettings,
    pub simulation: SimulationSettings,
}

impl StreamerConfig {
    /// Parse and validate `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid YAML, has
    /// unknown keys, or fails [`StreamerSettings::validate`].
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading streamer configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid configuration file: {}", path.display()))?;

        debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to `()`, not to an empty map.
        let config: StreamerConfig = if content.trim().is_empty() {
            StreamerConfig::default()
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML")?
        };
        config.streamer.validate()?;
        Ok(config)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
