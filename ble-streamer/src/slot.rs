/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-connection state records for the notification streamer.
//!
//! One [`ConnectionSlot`] exists per pool entry for the whole lifetime of the
//! scheduler.  A slot is *claimed* when a peer connects and *released* (reset
//! to its free defaults) when the peer disconnects; the record itself is
//! never dropped, so the slot's label stays stable across reconnects.
//!
//! ```text
//!            connected            subscribed
//!   Free ───────────────► Connecting ───────────► Streaming
//!    ▲                        ▲    ◄─────────────     │
//!    │                        │     unsubscribed      │
//!    └────────────────────────┴───────────────────────┘
//!                    disconnected (from any state)
//! ```

use std::fmt;

use crate::throughput::ThroughputWindow;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Bytes of ATT header carried by every notification (opcode + handle).
pub const ATT_OVERHEAD: u16 = 3;

/// Default ATT MTU before any exchange has taken place.
pub const ATT_DEFAULT_MTU: u16 = 23;

/// First value of the printable test-pattern cycle.
pub const PATTERN_FIRST: u8 = b'A';

/// Last value of the printable test-pattern cycle; the next value wraps to
/// [`PATTERN_FIRST`].
pub const PATTERN_LAST: u8 = b'Z';

/// Largest pool that still gets single-letter labels `'A'..='Z'`.
pub const MAX_LABELS: usize = 26;

// ── Connection id ─────────────────────────────────────────────────────────────

/// Transport-level connection handle.
///
/// A free slot carries `Option::<ConnectionId>::None` rather than an
/// "invalid handle" value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u16);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

// ── Slot state ────────────────────────────────────────────────────────────────

/// Lifecycle state of a slot, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No connection bound.
    Free,
    /// Connection bound, peer has not (or no longer) subscribed.
    Connecting,
    /// Peer subscribed to the streaming characteristic; eligible to send.
    Streaming,
}

// ── Test pattern ──────────────────────────────────────────────────────────────

/// Advance a pattern byte to the next value in `'A'..='Z'`, wrapping to `'A'`.
///
/// Values outside the printable cycle restart it at [`PATTERN_FIRST`].
pub fn next_pattern_byte(current: u8) -> u8 {
    if !(PATTERN_FIRST..PATTERN_LAST).contains(&current) {
        PATTERN_FIRST
    } else {
        current + 1
    }
}

/// Label of the slot at `index`: `0 → 'A'`, `1 → 'B'`, …
///
/// Pools are capped at [`MAX_LABELS`] entries by configuration validation;
/// out-of-range indices map to `'?'`.
pub fn label_for_index(index: usize) -> char {
    if index < MAX_LABELS {
        (b'A' + index as u8) as char
    } else {
        '?'
    }
}

/// Payload size for a negotiated `mtu`, clamped to `max_payload_len`.
///
/// An MTU at or below the ATT overhead yields an empty payload rather than
/// underflowing.
pub fn payload_unit_for_mtu(mtu: u16, max_payload_len: usize) -> usize {
    usize::from(mtu.saturating_sub(ATT_OVERHEAD)).min(max_payload_len)
}

// ── ConnectionSlot ────────────────────────────────────────────────────────────

/// State record for one active or potential connection.
#[derive(Debug, Clone)]
pub struct ConnectionSlot {
    /// Stable identifier; fixed by the slot's pool index.
    pub label: char,

    /// Bound connection; `None` while the slot is free.
    pub connection_id: Option<ConnectionId>,

    /// `true` only after the peer subscribed to the streaming characteristic.
    pub notifications_enabled: bool,

    /// Bytes per notification; never exceeds the payload buffer length.
    pub payload_unit: usize,

    /// Last pattern byte that was sent (or the starting value).
    pub sequence_counter: u8,

    /// Rolling throughput accumulator.
    pub window: ThroughputWindow,

    /// The transport holds one outstanding readiness request for this slot.
    pub send_request_pending: bool,

    /// Fixed-capacity payload buffer, reused for every send.
    buffer: Vec<u8>,
}

impl ConnectionSlot {
    /// Create a free slot with a payload buffer of `max_payload_len` bytes.
    pub fn new(index: usize, max_payload_len: usize) -> Self {
        Self {
            label: label_for_index(index),
            connection_id: None,
            notifications_enabled: false,
            payload_unit: 0,
            sequence_counter: PATTERN_FIRST,
            window: ThroughputWindow::default(),
            send_request_pending: false,
            buffer: vec![0; max_payload_len],
        }
    }

    pub fn state(&self) -> SlotState {
        match (self.connection_id, self.notifications_enabled) {
            (None, _) => SlotState::Free,
            (Some(_), false) => SlotState::Connecting,
            (Some(_), true) => SlotState::Streaming,
        }
    }

    pub fn is_free(&self) -> bool {
        self.connection_id.is_none()
    }

    /// Bound and subscribed: the scheduler may pick this slot.
    pub fn is_eligible(&self) -> bool {
        self.state() == SlotState::Streaming
    }

    /// Capacity of the payload buffer in bytes.
    pub fn max_payload_len(&self) -> usize {
        self.buffer.len()
    }

    /// Bind the slot to `id` with a payload size of `payload_unit`.
    pub(crate) fn bind(&mut self, id: ConnectionId, payload_unit: usize) {
        self.connection_id = Some(id);
        self.notifications_enabled = false;
        self.payload_unit = payload_unit.min(self.buffer.len());
        self.sequence_counter = PATTERN_FIRST;
        self.window = ThroughputWindow::default();
        self.send_request_pending = false;
    }

    /// Reset to the free defaults.  The label and buffer capacity survive.
    pub(crate) fn reset(&mut self) {
        self.connection_id = None;
        self.notifications_enabled = false;
        self.payload_unit = 0;
        self.sequence_counter = PATTERN_FIRST;
        self.window = ThroughputWindow::default();
        self.send_request_pending = false;
    }

    /// Advance the pattern and fill the buffer with the new byte.
    ///
    /// Returns the `payload_unit`-long slice to hand to the transport.
    pub fn next_payload(&mut self) -> &[u8] {
        self.sequence_counter = next_pattern_byte(self.sequence_counter);
        let len = self.payload_unit.min(self.buffer.len());
        let payload = &mut self.buffer[..len];
        payload.fill(self.sequence_counter);
        payload
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
