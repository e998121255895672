/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Readiness-driven round-robin notification scheduler.
//!
//! [`NotificationScheduler`] owns the [`SlotPool`], the round-robin cursor,
//! the [`Transport`] and the [`Clock`].  Transport callbacks are fed into it
//! one at a time (see [`lifecycle`] for connection events and
//! [`NotificationScheduler::on_ready_to_send`] for readiness); each call runs
//! to completion before the next one, so no locking is involved.
//!
//! # Cycle
//! On every readiness signal the scheduler scans at most one full turn of
//! the pool, starting at the cursor, for a slot that is bound *and*
//! subscribed.  That slot advances its test pattern, sends `payload_unit`
//! bytes, feeds its throughput window and re-arms its readiness request.
//! The cursor then moves to the slot after it.  Because the scan always
//! resumes where the previous cycle stopped, `k` eligible slots are each
//! served exactly once in any `k` consecutive cycles.
//!
//! # Readiness registrations
//! A slot has at most one outstanding "ready to send" request
//! (`send_request_pending`).  A readiness signal consumes the signalling
//! slot's request; after the cycle both the served slot and the signalling
//! slot are re-armed if they are still eligible and idle.  Every streaming
//! slot therefore keeps exactly one request in flight, and a slot that is
//! never signalled cannot stall the others.
//!
//! Requests are also tracked per connection handle, because the link still
//! answers a request after the connection that made it has closed.  When a
//! controller hands the same handle to the next peer, the rebound slot
//! adopts the request that is still in flight instead of arming a second
//! one; the late callback is then consumed as that slot's signal.
//!
//! # Example
//! ```rust,ignore
//! let mut sched = NotificationScheduler::new(settings, link, clock);
//! sched.on_connected(ConnectionId(0x40))?;
//! sched.on_subscribed(ConnectionId(0x40))?;
//! // ... later, from the transport's readiness callback:
//! if let Some(outcome) = sched.on_ready_to_send(ConnectionId(0x40))? {
//!     if let Some(report) = outcome.report { println!("{report}"); }
//! }
//! ```

pub mod error;
pub mod lifecycle;

pub use error::StreamError;

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::command::RelayCommand;
use crate::config::StreamerSettings;
use crate::pool::SlotPool;
use crate::slot::{ConnectionId, ConnectionSlot};
use crate::throughput::ThroughputReport;
use crate::transport::{Clock, Transport};

// ── CycleOutcome ──────────────────────────────────────────────────────────────

/// What one scheduler cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Pool index of the served slot.
    pub slot: usize,
    pub label: char,
    pub connection: ConnectionId,
    /// Pattern byte the payload was filled with.
    pub pattern: u8,
    /// Bytes accepted by the transport (`0` on failure).
    pub bytes_sent: usize,
    /// Set when the transport refused the payload.
    pub failure: Option<StreamError>,
    /// Set when this send closed a throughput window.
    pub report: Option<ThroughputReport>,
}

// ── NotificationScheduler ─────────────────────────────────────────────────────

pub struct NotificationScheduler<T, C> {
    settings: StreamerSettings,
    pool: SlotPool,
    /// Index where the next scan starts; always `< capacity` (or `0`).
    cursor: usize,
    /// Handles with a readiness request the transport has not answered yet.
    /// Outlives the slot binding that armed it.
    in_flight: BTreeSet<ConnectionId>,
    /// Last relay command written by any peer; read back on request.
    command: RelayCommand,
    transport: T,
    clock: C,
}

impl<T: Transport, C: Clock> NotificationScheduler<T, C> {
    /// Build a scheduler with `settings.max_connections` free slots.
    pub fn new(settings: StreamerSettings, transport: T, clock: C) -> Self {
        let pool = SlotPool::new(settings.max_connections, settings.max_payload_len);
        info!(
            capacity = pool.capacity(),
            max_payload_len = settings.max_payload_len,
            report_interval_ms = settings.report_interval_ms,
            "notification scheduler ready"
        );
        Self {
            settings,
            pool,
            cursor: 0,
            in_flight: BTreeSet::new(),
            command: RelayCommand::default(),
            transport,
            clock,
        }
    }

    // ── Readiness ─────────────────────────────────────────────────────────────

    /// Handle the transport's "ready to send" signal for `id`.
    ///
    /// Returns `Ok(None)` when no slot is eligible (the cursor stays put).
    ///
    /// # Errors
    /// [`StreamError::UnknownConnection`] when `id` was released after the
    /// request was armed.  Nothing is sent in that case.
    pub fn on_ready_to_send(
        &mut self,
        id: ConnectionId,
    ) -> Result<Option<CycleOutcome>, StreamError> {
        self.in_flight.remove(&id);
        let signalled = match self.pool.lookup(id) {
            Ok(index) => index,
            Err(err) => {
                debug!(connection = %id, "stale readiness signal ignored");
                return Err(err);
            }
        };
        if let Some(slot) = self.pool.get_mut(signalled) {
            slot.send_request_pending = false;
        }

        let outcome = self.run_cycle();
        self.arm(signalled);
        Ok(outcome)
    }

    /// Serve the next eligible slot in round-robin order.
    ///
    /// Exposed for transports that signal readiness for the link as a whole
    /// rather than per connection.
    pub fn run_cycle(&mut self) -> Option<CycleOutcome> {
        let index = self.next_eligible()?;
        let now_ms = self.clock.now_ms();
        let interval_ms = self.settings.report_interval_ms;

        let slot = self.pool.get_mut(index)?;
        let connection = slot.connection_id?;
        let label = slot.label;

        let payload = slot.next_payload();
        let (bytes_sent, failure) = match self.transport.send(connection, payload) {
            Ok(()) => (payload.len(), None),
            Err(source) => {
                let err = StreamError::SendFailure { connection, source };
                warn!(label = %label, error = %err, "notification dropped");
                (0, Some(err))
            }
        };
        let pattern = slot.sequence_counter;

        let report = slot
            .window
            .record(bytes_sent, now_ms, interval_ms)
            .map(|sample| sample.into_report(label, connection));
        if let Some(report) = &report {
            info!(
                label = %report.label,
                bytes = report.bytes,
                elapsed_ms = report.elapsed_ms,
                bytes_per_second = report.bytes_per_second,
                "{report}"
            );
        }

        debug!(label = %label, connection = %connection, bytes = bytes_sent, "cycle");

        self.cursor = (index + 1) % self.pool.capacity();
        self.arm(index);

        Some(CycleOutcome {
            slot: index,
            label,
            connection,
            pattern,
            bytes_sent,
            failure,
            report,
        })
    }

    /// First eligible slot at or after the cursor, scanning one full turn.
    fn next_eligible(&self) -> Option<usize> {
        let capacity = self.pool.capacity();
        (0..capacity)
            .map(|offset| (self.cursor + offset) % capacity)
            .find(|&index| self.pool.slots()[index].is_eligible())
    }

    /// Register a readiness request for slot `index` unless it is ineligible
    /// or already has one outstanding.  Returns `true` if the slot is now
    /// armed.
    pub(crate) fn arm(&mut self, index: usize) -> bool {
        let Some(slot) = self.pool.get_mut(index) else {
            return false;
        };
        if !slot.is_eligible() || slot.send_request_pending {
            return false;
        }
        let Some(connection) = slot.connection_id else {
            return false;
        };
        slot.send_request_pending = true;
        if self.in_flight.insert(connection) {
            self.transport.request_ready_to_send(connection);
        } else {
            debug!(
                label = %slot.label,
                connection = %connection,
                "adopting readiness request of previous binding"
            );
        }
        true
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    /// Slot bound to `id`, if any.
    pub fn slot(&self, id: ConnectionId) -> Option<&ConnectionSlot> {
        self.pool.slot(id).ok()
    }

    /// Index where the next round-robin scan begins.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
