/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Seams between the streamer core and the wireless link.
//!
//! The scheduler never talks to a radio directly.  It consumes a
//! [`Transport`] (send + readiness requests) and a [`Clock`], both owned by
//! the [`NotificationScheduler`](crate::scheduler::NotificationScheduler)
//! instance, so there is no process-wide callback table.

use thiserror::Error;

use crate::slot::ConnectionId;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why the link refused a notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The connection went away between the readiness signal and the send.
    #[error("connection is no longer open")]
    Disconnected,

    /// The controller had no buffer for another packet.
    #[error("link buffers are full")]
    BufferFull,
}

// ── Connection parameters ─────────────────────────────────────────────────────

/// Connection-parameter update requested right after a peer connects.
///
/// Interval values are in 1.25 ms units, the supervision timeout in 10 ms
/// units, as on the air.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub min_interval: u16,
    pub max_interval: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

impl ConnectionParameters {
    /// Fixed interval of `interval_units` with no slave latency.
    pub fn fixed(interval_units: u16, supervision_timeout: u16) -> Self {
        Self {
            min_interval: interval_units,
            max_interval: interval_units,
            latency: 0,
            supervision_timeout,
        }
    }

    /// Interval length in microseconds.
    pub fn interval_us(&self) -> u32 {
        u32::from(self.min_interval) * 1_250
    }
}

// ── Traits ────────────────────────────────────────────────────────────────────

/// Outbound half of the wireless link.
pub trait Transport {
    /// Send one notification.  Best effort; the caller never retries.
    fn send(&mut self, connection: ConnectionId, payload: &[u8]) -> Result<(), SendError>;

    /// Arm exactly one future readiness callback for `connection`.
    ///
    /// Every request must be answered once, even if the connection closes
    /// first.  The scheduler guarantees at most one outstanding request per
    /// connection handle.
    fn request_ready_to_send(&mut self, connection: ConnectionId);

    /// Answer a peer's read of the command characteristic.
    fn read_response(&mut self, _connection: ConnectionId, _value: &[u8]) {}

    /// Ask the peer for new connection parameters.  Links that cannot
    /// renegotiate ignore it.
    fn request_connection_update(
        &mut self,
        _connection: ConnectionId,
        _params: ConnectionParameters,
    ) {
    }
}

/// Monotonic millisecond clock.  The value wraps at `u32::MAX`.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

// ── ManualClock ───────────────────────────────────────────────────────────────

/// Clock that only moves when told to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualClock {
    now_ms: u32,
}

impl ManualClock {
    pub fn new(now_ms: u32) -> Self {
        Self { now_ms }
    }

    pub fn set(&mut self, now_ms: u32) {
        self.now_ms = now_ms;
    }

    /// Move forward by `delta_ms`, wrapping like the hardware counter.
    pub fn advance(&mut self, delta_ms: u32) {
        self.now_ms = self.now_ms.wrapping_add(delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_wraps() {
        let mut clock = ManualClock::new(u32::MAX);
        clock.advance(2);
        assert_eq!(clock.now_ms(), 1);
        clock.set(500);
        assert_eq!(clock.now_ms(), 500);
    }

    #[test]
    fn fifteen_ms_interval() {
        let params = ConnectionParameters::fixed(12, 72);
        assert_eq!(params.interval_us(), 15_000);
        assert_eq!(params.latency, 0);
    }
}
