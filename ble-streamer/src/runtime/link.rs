/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! In-process stand-in for the radio link.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use super::LinkEvent;
use crate::slot::ConnectionId;
use crate::transport::{ConnectionParameters, SendError, Transport};

/// [`Transport`] that loops readiness requests back into the event channel.
///
/// Each `request_ready_to_send` spawns a tokio task that waits
/// `readiness_delay` and then posts [`LinkEvent::ReadyToSend`], which models
/// a controller that frees one buffer per connection event.  Must be used
/// from within a tokio runtime.
#[derive(Debug)]
pub struct SimulatedLink {
    events: mpsc::UnboundedSender<LinkEvent>,
    readiness_delay: Duration,
    fail_every: BTreeMap<ConnectionId, u32>,
    attempts: BTreeMap<ConnectionId, u32>,
    delivered: BTreeMap<ConnectionId, u64>,
    updates: Vec<(ConnectionId, ConnectionParameters)>,
    reads: BTreeMap<ConnectionId, Vec<u8>>,
}

impl SimulatedLink {
    pub fn new(events: mpsc::UnboundedSender<LinkEvent>, readiness_delay: Duration) -> Self {
        Self {
            events,
            readiness_delay,
            fail_every: BTreeMap::new(),
            attempts: BTreeMap::new(),
            delivered: BTreeMap::new(),
            updates: Vec::new(),
            reads: BTreeMap::new(),
        }
    }

    /// Make every `n`-th send to `connection` fail.  `0` disables failures.
    pub fn set_fail_every(&mut self, connection: ConnectionId, n: u32) {
        if n == 0 {
            self.fail_every.remove(&connection);
        } else {
            self.fail_every.insert(connection, n);
        }
    }

    /// Bytes accepted per connection.
    pub fn delivered(&self) -> &BTreeMap<ConnectionId, u64> {
        &self.delivered
    }

    /// Connection-parameter updates requested so far.
    pub fn connection_updates(&self) -> &[(ConnectionId, ConnectionParameters)] {
        &self.updates
    }

    /// Last command-characteristic value returned to each peer.
    pub fn read_responses(&self) -> &BTreeMap<ConnectionId, Vec<u8>> {
        &self.reads
    }
}

impl Transport for SimulatedLink {
    fn send(&mut self, connection: ConnectionId, payload: &[u8]) -> Result<(), SendError> {
        let attempt = self.attempts.entry(connection).or_default();
        *attempt = attempt.wrapping_add(1);

        if let Some(&n) = self.fail_every.get(&connection) {
            if *attempt % n == 0 {
                return Err(SendError::BufferFull);
            }
        }

        *self.delivered.entry(connection).or_default() += payload.len() as u64;
        Ok(())
    }

    fn request_ready_to_send(&mut self, connection: ConnectionId) {
        let events = self.events.clone();
        let delay = self.readiness_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The loop may already be gone at shutdown.
            let _ = events.send(LinkEvent::ReadyToSend(connection));
        });
    }

    fn request_connection_update(&mut self, connection: ConnectionId, params: ConnectionParameters) {
        debug!(
            connection = %connection,
            interval_us = params.interval_us(),
            supervision_timeout = params.supervision_timeout,
            "connection parameter update requested"
        );
        self.updates.push((connection, params));
    }

    fn read_response(&mut self, connection: ConnectionId, value: &[u8]) {
        debug!(connection = %connection, ?value, "command read answered");
        self.reads.insert(connection, value.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn readiness_is_delivered_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut link = SimulatedLink::new(tx, Duration::from_millis(15));

        let start = tokio::time::Instant::now();
        link.request_ready_to_send(ConnectionId(7));
        let event = rx.recv().await.unwrap();

        assert_eq!(event, LinkEvent::ReadyToSend(ConnectionId(7)));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn every_nth_send_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut link = SimulatedLink::new(tx, Duration::ZERO);
        let id = ConnectionId(1);
        link.set_fail_every(id, 3);

        let results: Vec<bool> = (0..6).map(|_| link.send(id, &[0; 10]).is_ok()).collect();
        assert_eq!(results, vec![true, true, false, true, true, false]);
        assert_eq!(link.delivered()[&id], 40);

        link.set_fail_every(id, 0);
        assert!(link.send(id, &[0; 10]).is_ok());
    }

    #[test]
    fn connection_updates_are_recorded() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut link = SimulatedLink::new(tx, Duration::ZERO);
        link.request_connection_update(ConnectionId(1), ConnectionParameters::fixed(12, 72));
        assert_eq!(link.connection_updates().len(), 1);
    }

    #[test]
    fn latest_read_response_is_kept() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut link = SimulatedLink::new(tx, Duration::ZERO);
        link.read_response(ConnectionId(1), &[0x00]);
        link.read_response(ConnectionId(1), &[0x02]);
        assert_eq!(link.read_responses()[&ConnectionId(1)], vec![0x02]);
    }
}
