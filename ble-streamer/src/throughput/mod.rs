/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-connection throughput measurement.
//!
//! A [`ThroughputWindow`] accumulates bytes sent since its start timestamp.
//! Once the elapsed time reaches the reporting interval it yields a
//! [`ThroughputReport`] and restarts.  Reports are therefore emitted at or
//! after each interval boundary, never before.
//!
//! Timestamps are `u32` milliseconds from a wrapping clock; elapsed time is
//! computed with `wrapping_sub` so a clock rollover does not produce a huge
//! bogus interval.

use std::fmt;

use crate::slot::ConnectionId;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Default reporting cadence in milliseconds.
pub const DEFAULT_REPORT_INTERVAL_MS: u32 = 3_000;

// ── ThroughputReport ──────────────────────────────────────────────────────────

/// Rate measured over one completed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputReport {
    /// Label of the slot that produced the traffic.
    pub label: char,
    pub connection: ConnectionId,
    /// Bytes accumulated during the window.
    pub bytes: u64,
    /// Actual window length (≥ the reporting interval).
    pub elapsed_ms: u32,
    /// `bytes * 1000 / elapsed_ms`.
    pub bytes_per_second: u64,
}

impl fmt::Display for ThroughputReport {
    /// Renders as `A: 6000 bytes sent -> 2.000 kB/s`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} bytes sent -> {}.{:03} kB/s",
            self.label,
            self.bytes,
            self.bytes_per_second / 1_000,
            self.bytes_per_second % 1_000
        )
    }
}

// ── ThroughputWindow ──────────────────────────────────────────────────────────

/// Sliding-window byte counter with a fixed reporting cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThroughputWindow {
    bytes_sent: u64,
    start_ms: u32,
}

/// Window totals handed back when an interval boundary is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSample {
    pub bytes: u64,
    pub elapsed_ms: u32,
    pub bytes_per_second: u64,
}

impl ThroughputWindow {
    /// Start an empty window at `now_ms`.
    pub fn starting_at(now_ms: u32) -> Self {
        Self {
            bytes_sent: 0,
            start_ms: now_ms,
        }
    }

    /// Discard the accumulated bytes and restart the window at `now_ms`.
    pub fn reset(&mut self, now_ms: u32) {
        *self = Self::starting_at(now_ms);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn start_ms(&self) -> u32 {
        self.start_ms
    }

    /// Add `bytes` and, if `interval_ms` has elapsed since the window start,
    /// close the window and return its sample.
    ///
    /// A zero-byte record still checks the boundary, so a failing link keeps
    /// reporting (at a lower rate) instead of going silent.
    pub fn record(&mut self, bytes: usize, now_ms: u32, interval_ms: u32) -> Option<WindowSample> {
        self.bytes_sent = self.bytes_sent.saturating_add(bytes as u64);

        let elapsed_ms = now_ms.wrapping_sub(self.start_ms);
        if elapsed_ms < interval_ms || elapsed_ms == 0 {
            return None;
        }

        let sample = WindowSample {
            bytes: self.bytes_sent,
            elapsed_ms,
            bytes_per_second: self.bytes_sent.saturating_mul(1_000) / u64::from(elapsed_ms),
        };
        self.reset(now_ms);
        Some(sample)
    }
}

impl WindowSample {
    /// Attach the slot identity to produce a report.
    pub fn into_report(self, label: char, connection: ConnectionId) -> ThroughputReport {
        ThroughputReport {
            label,
            connection,
            bytes: self.bytes,
            elapsed_ms: self.elapsed_ms,
            bytes_per_second: self.bytes_per_second,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
