/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Single-writer event loop around the scheduler.
//!
//! Every transport callback is turned into a [`LinkEvent`] and pushed onto
//! one unbounded `mpsc` channel.  The [`EventLoop`] is the only owner of the
//! [`NotificationScheduler`] and drains that channel one event at a time,
//! which serialises all pool mutations without a lock:
//!
//! ```text
//!  link callbacks ──┐
//!  peer scripts   ──┼──► mpsc<LinkEvent> ──► EventLoop ──► NotificationScheduler
//!  readiness timers ┘                           │
//!                                               ├──► reports channel
//!                                               └──► Actuator
//! ```

pub mod link;
pub mod sim;

pub use link::SimulatedLink;
pub use sim::{simulate, SimulationSummary};

use std::ops::ControlFlow;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::command::{Actuator, LinkStatus};
use crate::scheduler::{NotificationScheduler, StreamError};
use crate::slot::ConnectionId;
use crate::throughput::ThroughputReport;
use crate::transport::{Clock, Transport};

// ── Events ────────────────────────────────────────────────────────────────────

/// Everything the link can tell the streamer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected(ConnectionId),
    Disconnected(ConnectionId),
    MtuNegotiated { connection: ConnectionId, mtu: u16 },
    Subscribed(ConnectionId),
    Unsubscribed(ConnectionId),
    /// Raw write of the streaming characteristic's CCCD.
    CccdWrite { connection: ConnectionId, value: u16 },
    /// Write of the relay command characteristic.
    CommandWrite { connection: ConnectionId, data: Vec<u8> },
    /// Read of the relay command characteristic.
    CommandRead(ConnectionId),
    ReadyToSend(ConnectionId),
    /// Stop the loop and hand the scheduler back.
    Shutdown,
}

// ── Clock ─────────────────────────────────────────────────────────────────────

/// Milliseconds since construction, on tokio's clock (pausable in tests).
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    start: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the intended u32 wrap.
        self.start.elapsed().as_millis() as u32
    }
}

// ── Statistics ────────────────────────────────────────────────────────────────

/// Counters kept by the event loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub events: u64,
    /// Cycles that served a slot.
    pub cycles: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
    /// Connections dropped because the pool was full.
    pub rejected_connections: u64,
    /// Events for connections that were not (or no longer) tracked.
    pub stale_events: u64,
    pub duplicate_connections: u64,
    pub reports: u64,
}

impl LoopStats {
    fn record_error(&mut self, err: &StreamError) {
        match err {
            StreamError::PoolExhausted { .. } => self.rejected_connections += 1,
            StreamError::UnknownConnection(_) => self.stale_events += 1,
            StreamError::DuplicateConnection(_) => self.duplicate_connections += 1,
            StreamError::SendFailure { .. } => self.send_failures += 1,
        }
    }
}

// ── EventLoop ─────────────────────────────────────────────────────────────────

pub struct EventLoop<T, C, A> {
    scheduler: NotificationScheduler<T, C>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
    reports: Option<mpsc::UnboundedSender<ThroughputReport>>,
    actuator: A,
    stats: LoopStats,
}

/// What [`EventLoop::run`] hands back.
pub struct LoopExit<T, C, A> {
    pub scheduler: NotificationScheduler<T, C>,
    pub actuator: A,
    pub stats: LoopStats,
}

impl<T: Transport, C: Clock, A: Actuator> EventLoop<T, C, A> {
    pub fn new(
        scheduler: NotificationScheduler<T, C>,
        events: mpsc::UnboundedReceiver<LinkEvent>,
        actuator: A,
    ) -> Self {
        Self {
            scheduler,
            events,
            reports: None,
            actuator,
            stats: LoopStats::default(),
        }
    }

    /// Forward every throughput report to `reports`.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<ThroughputReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Drain events until [`LinkEvent::Shutdown`] or until every sender is
    /// gone.
    pub async fn run(mut self) -> LoopExit<T, C, A> {
        info!("event loop started");
        while let Some(event) = self.events.recv().await {
            if self.dispatch(event).is_break() {
                break;
            }
        }
        info!(stats = ?self.stats, "event loop stopped");
        LoopExit {
            scheduler: self.scheduler,
            actuator: self.actuator,
            stats: self.stats,
        }
    }

    /// Apply one event to the scheduler.  Never fails; errors are counted
    /// and the loop continues.
    pub fn dispatch(&mut self, event: LinkEvent) -> ControlFlow<()> {
        self.stats.events += 1;
        let result = match event {
            LinkEvent::Connected(id) => self
                .scheduler
                .on_connected(id)
                .map(|()| self.actuator.show_status(LinkStatus::Connected)),
            LinkEvent::Disconnected(id) => self
                .scheduler
                .on_disconnected(id)
                .map(|()| self.actuator.show_status(LinkStatus::Disconnected)),
            LinkEvent::MtuNegotiated { connection, mtu } => {
                self.scheduler.on_mtu_negotiated(connection, mtu)
            }
            LinkEvent::Subscribed(id) => self.scheduler.on_subscribed(id),
            LinkEvent::Unsubscribed(id) => self.scheduler.on_unsubscribed(id),
            LinkEvent::CccdWrite { connection, value } => {
                self.scheduler.on_cccd_write(connection, value)
            }
            LinkEvent::CommandWrite { connection, data } => self
                .scheduler
                .on_command_write(connection, &data)
                .map(|command| {
                    if let Some(command) = command {
                        self.actuator.apply(command);
                    }
                }),
            LinkEvent::CommandRead(id) => self
                .scheduler
                .on_command_read(id)
                .map(|value| self.scheduler.transport_mut().read_response(id, &value)),
            LinkEvent::ReadyToSend(id) => self.on_ready(id),
            LinkEvent::Shutdown => {
                debug!("shutdown requested");
                return ControlFlow::Break(());
            }
        };

        if let Err(err) = result {
            self.stats.record_error(&err);
        }
        ControlFlow::Continue(())
    }

    fn on_ready(&mut self, id: ConnectionId) -> Result<(), StreamError> {
        let Some(outcome) = self.scheduler.on_ready_to_send(id)? else {
            return Ok(());
        };

        self.stats.cycles += 1;
        self.stats.bytes_sent += outcome.bytes_sent as u64;
        if let Some(err) = &outcome.failure {
            self.stats.record_error(err);
        }
        if let Some(report) = outcome.report {
            self.stats.reports += 1;
            if let Some(tx) = &self.reports {
                // A dropped receiver only means nobody is listening any more.
                let _ = tx.send(report);
            }
        }
        Ok(())
    }

    pub fn scheduler(&self) -> &NotificationScheduler<T, C> {
        &self.scheduler
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
