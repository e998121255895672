/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Connection lifecycle handlers.
//!
//! Maps the link's connection events onto slot state transitions:
//!
//! | Event | Transition | Side effect |
//! |---|---|---|
//! | connected | Free → Connecting | slot allocated, connection-parameter update requested |
//! | MTU negotiated | (no change) | `payload_unit = min(mtu - 3, max_payload_len)` |
//! | subscribed | Connecting → Streaming | throughput window reset, first readiness request |
//! | unsubscribed | Streaming → Connecting | slot stops being scheduled |
//! | disconnected | any → Free | slot released |
//!
//! Events for connections that are not tracked return
//! [`StreamError::UnknownConnection`] and change nothing; the link may
//! deliver events that were in flight when a slot was released.

use tracing::{debug, info, warn};

use super::{NotificationScheduler, StreamError};
use crate::command::RelayCommand;
use crate::slot::{payload_unit_for_mtu, ConnectionId, ConnectionSlot, ATT_OVERHEAD};
use crate::transport::{Clock, ConnectionParameters, Transport};

/// CCCD value that enables notifications.
pub const CCCD_NOTIFICATIONS: u16 = 0x0001;

impl<T: Transport, C: Clock> NotificationScheduler<T, C> {
    /// A peer connected: claim the first free slot.
    ///
    /// # Errors
    /// * [`StreamError::PoolExhausted`] – no free slot; the connection stays
    ///   untracked and no data will ever be sent to it.
    /// * [`StreamError::DuplicateConnection`] – `id` already owns a slot.
    pub fn on_connected(&mut self, id: ConnectionId) -> Result<(), StreamError> {
        let payload_unit =
            payload_unit_for_mtu(self.settings.default_mtu, self.settings.max_payload_len);

        let index = match self.pool.allocate(id, payload_unit) {
            Ok(index) => index,
            Err(err) => {
                warn!(connection = %id, error = %err, "connection ignored");
                return Err(err);
            }
        };

        let label = self.pool.slots()[index].label;
        info!(connection = %id, label = %label, payload_unit, "connected");

        let params = ConnectionParameters::fixed(
            self.settings.connection_interval_units,
            self.settings.supervision_timeout_units,
        );
        self.transport.request_connection_update(id, params);
        Ok(())
    }

    /// The ATT MTU for `id` was negotiated; resize its payload.
    ///
    /// Oversized MTUs are clamped to the payload buffer, never rejected.
    pub fn on_mtu_negotiated(&mut self, id: ConnectionId, mtu: u16) -> Result<(), StreamError> {
        let max_payload_len = self.settings.max_payload_len;
        let slot = self.tracked_mut(id)?;

        let wanted = usize::from(mtu.saturating_sub(ATT_OVERHEAD));
        slot.payload_unit = payload_unit_for_mtu(mtu, max_payload_len);
        if wanted > slot.payload_unit {
            debug!(
                label = %slot.label,
                mtu,
                clamped_to = slot.payload_unit,
                "payload clamped to buffer size"
            );
        }
        info!(label = %slot.label, mtu, payload_unit = slot.payload_unit, "MTU negotiated");
        Ok(())
    }

    /// The peer enabled notifications on the streaming characteristic.
    pub fn on_subscribed(&mut self, id: ConnectionId) -> Result<(), StreamError> {
        let now_ms = self.clock.now_ms();
        let index = self.tracked_index(id)?;

        if let Some(slot) = self.pool.get_mut(index) {
            slot.notifications_enabled = true;
            slot.window.reset(now_ms);
            info!(label = %slot.label, connection = %id, "streaming enabled");
        }
        self.arm(index);
        Ok(())
    }

    /// The peer disabled notifications.  The slot stays bound.
    ///
    /// An outstanding readiness request is left to run out; when it fires the
    /// slot is simply not re-armed.
    pub fn on_unsubscribed(&mut self, id: ConnectionId) -> Result<(), StreamError> {
        let slot = self.tracked_mut(id)?;
        slot.notifications_enabled = false;
        info!(label = %slot.label, connection = %id, "streaming disabled");
        Ok(())
    }

    /// The link dropped `id`: free its slot.
    ///
    /// Duplicate disconnects report [`StreamError::UnknownConnection`] and
    /// leave the pool as the first one did.
    pub fn on_disconnected(&mut self, id: ConnectionId) -> Result<(), StreamError> {
        let Some(index) = self.pool.release(id) else {
            debug!(connection = %id, "disconnect for untracked connection ignored");
            return Err(StreamError::UnknownConnection(id));
        };
        info!(connection = %id, label = %self.pool.slots()[index].label, "disconnected");
        Ok(())
    }

    /// The peer wrote the Client Characteristic Configuration descriptor of
    /// the streaming characteristic.
    pub fn on_cccd_write(&mut self, id: ConnectionId, value: u16) -> Result<(), StreamError> {
        if value == CCCD_NOTIFICATIONS {
            self.on_subscribed(id)
        } else {
            self.on_unsubscribed(id)
        }
    }

    /// The peer wrote the command characteristic.
    ///
    /// Returns the decoded relay command, or `None` for an empty write.  The
    /// command is kept for [`on_command_read`](Self::on_command_read).
    pub fn on_command_write(
        &mut self,
        id: ConnectionId,
        data: &[u8],
    ) -> Result<Option<RelayCommand>, StreamError> {
        let label = self.tracked_mut(id)?.label;
        let command = RelayCommand::decode(data);
        match &command {
            Some(cmd) => {
                info!(label = %label, command = ?cmd, "relay command");
                self.command = *cmd;
            }
            None => debug!(label = %label, "empty command write ignored"),
        }
        Ok(command)
    }

    /// The peer read the command characteristic: the last command written by
    /// any peer, both relays off before the first write.
    pub fn on_command_read(&self, id: ConnectionId) -> Result<[u8; 1], StreamError> {
        self.tracked_index(id)?;
        Ok([self.command.to_byte()])
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn tracked_index(&self, id: ConnectionId) -> Result<usize, StreamError> {
        self.pool.lookup(id).map_err(|err| {
            debug!(connection = %id, "event for untracked connection ignored");
            err
        })
    }

    fn tracked_mut(&mut self, id: ConnectionId) -> Result<&mut ConnectionSlot, StreamError> {
        let index = self.tracked_index(id)?;
        self.pool
            .get_mut(index)
            .ok_or(StreamError::UnknownConnection(id))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamerSettings;
    use crate::slot::SlotState;
    use crate::transport::{ManualClock, SendError};

    #[derive(Debug, Default)]
    struct NullTransport {
        readiness_requests: usize,
        updates: Vec<(ConnectionId, ConnectionParameters)>,
    }

    impl Transport for NullTransport {
        fn send(&mut self, _: ConnectionId, _: &[u8]) -> Result<(), SendError> {
            Ok(())
        }

        fn request_ready_to_send(&mut self, _: ConnectionId) {
            self.readiness_requests += 1;
        }

        fn request_connection_update(&mut self, id: ConnectionId, params: ConnectionParameters) {
            self.updates.push((id, params));
        }
    }

    fn scheduler() -> NotificationScheduler<NullTransport, ManualClock> {
        NotificationScheduler::new(
            StreamerSettings::default(),
            NullTransport::default(),
            ManualClock::new(100),
        )
    }

    const A: ConnectionId = ConnectionId(0x40);
    const B: ConnectionId = ConnectionId(0x41);

    #[test]
    fn connect_sets_default_payload_and_requests_15ms_interval() {
        let mut sched = scheduler();
        sched.on_connected(A).unwrap();

        let slot = sched.slot(A).unwrap();
        assert_eq!(slot.label, 'A');
        assert_eq!(slot.payload_unit, 20);
        assert_eq!(slot.state(), SlotState::Connecting);
        assert!(!slot.notifications_enabled);

        let (conn, params) = sched.transport().updates[0];
        assert_eq!(conn, A);
        assert_eq!(params.min_interval, 12);
        assert_eq!(params.max_interval, 12);
        assert_eq!(params.supervision_timeout, 72);
    }

    #[test]
    fn mtu_larger_than_buffer_is_clamped() {
        let mut sched = scheduler();
        sched.on_connected(A).unwrap();

        sched.on_mtu_negotiated(A, 100).unwrap();
        assert_eq!(sched.slot(A).unwrap().payload_unit, 97);

        sched.on_mtu_negotiated(A, 517).unwrap();
        assert_eq!(sched.slot(A).unwrap().payload_unit, 200);
        assert!(sched.slot(A).unwrap().payload_unit <= sched.slot(A).unwrap().max_payload_len());
    }

    #[test]
    fn subscribe_resets_window_and_arms() {
        let mut sched = scheduler();
        sched.on_connected(A).unwrap();
        sched.clock_mut().set(5_000);
        sched.on_subscribed(A).unwrap();

        let slot = sched.slot(A).unwrap();
        assert_eq!(slot.state(), SlotState::Streaming);
        assert_eq!(slot.window.start_ms(), 5_000);
        assert_eq!(slot.window.bytes_sent(), 0);
        assert!(slot.send_request_pending);
        assert_eq!(sched.transport().readiness_requests, 1);
    }

    #[test]
    fn unsubscribe_returns_to_connecting() {
        let mut sched = scheduler();
        sched.on_connected(A).unwrap();
        sched.on_subscribed(A).unwrap();
        sched.on_unsubscribed(A).unwrap();
        assert_eq!(sched.slot(A).unwrap().state(), SlotState::Connecting);
    }

    #[test]
    fn cccd_write_toggles_streaming() {
        let mut sched = scheduler();
        sched.on_connected(A).unwrap();

        sched.on_cccd_write(A, CCCD_NOTIFICATIONS).unwrap();
        assert!(sched.slot(A).unwrap().is_eligible());

        sched.on_cccd_write(A, 0x0000).unwrap();
        assert!(!sched.slot(A).unwrap().is_eligible());
    }

    #[test]
    fn disconnect_frees_slot_and_duplicate_is_noop() {
        let mut sched = scheduler();
        sched.on_connected(A).unwrap();
        sched.on_subscribed(A).unwrap();
        sched.on_connected(B).unwrap();

        sched.on_disconnected(A).unwrap();
        let after_first = sched.pool().slots()[0].clone();
        assert_eq!(after_first.state(), SlotState::Free);
        assert!(!after_first.send_request_pending);

        assert_eq!(
            sched.on_disconnected(A).unwrap_err(),
            StreamError::UnknownConnection(A)
        );
        let after_second = &sched.pool().slots()[0];
        assert_eq!(after_second.state(), after_first.state());
        assert_eq!(after_second.connection_id, after_first.connection_id);
        assert_eq!(sched.slot(B).unwrap().label, 'B');
    }

    #[test]
    fn events_for_unknown_connection_change_nothing() {
        let mut sched = scheduler();
        sched.on_connected(A).unwrap();
        let stranger = ConnectionId(0x99);

        assert!(sched.on_mtu_negotiated(stranger, 247).is_err());
        assert!(sched.on_subscribed(stranger).is_err());
        assert!(sched.on_unsubscribed(stranger).is_err());
        assert!(sched.on_command_write(stranger, &[1]).is_err());
        assert_eq!(sched.transport().readiness_requests, 0);
        assert_eq!(sched.pool().occupied(), 1);
    }

    #[test]
    fn reconnect_keeps_label_of_slot() {
        let mut sched = scheduler();
        sched.on_connected(A).unwrap();
        sched.on_connected(B).unwrap();
        sched.on_disconnected(A).unwrap();

        let c = ConnectionId(0x42);
        sched.on_connected(c).unwrap();
        assert_eq!(sched.slot(c).unwrap().label, 'A');
    }

    #[test]
    fn command_write_decodes_first_byte() {
        let mut sched = scheduler();
        sched.on_connected(A).unwrap();

        let cmd = sched.on_command_write(A, &[0x02]).unwrap().unwrap();
        assert!(!cmd.relay1);
        assert!(cmd.relay2);
        assert_eq!(sched.on_command_write(A, &[]).unwrap(), None);
    }

    #[test]
    fn command_read_returns_last_write_from_any_peer() {
        let mut sched = scheduler();
        sched.on_connected(A).unwrap();
        sched.on_connected(B).unwrap();
        assert_eq!(sched.on_command_read(A).unwrap(), [0x00]);

        sched.on_command_write(B, &[0x03]).unwrap();
        assert_eq!(sched.on_command_read(A).unwrap(), [0x01]);

        // an empty write keeps the previous command
        sched.on_command_write(A, &[]).unwrap();
        assert_eq!(sched.on_command_read(B).unwrap(), [0x01]);

        assert_eq!(
            sched.on_command_read(ConnectionId(0x99)).unwrap_err(),
            StreamError::UnknownConnection(ConnectionId(0x99))
        );
    }
}
