/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Fixed-capacity registry of [`ConnectionSlot`]s.
//!
//! The pool is sized once at construction and never grows.  Slot `i` always
//! carries label `'A' + i`; allocation hands out the lowest free index, so
//! the first peer to connect to an idle pool is always `A`.
//!
//! Invariants upheld here:
//! * a connection id is bound to at most one slot;
//! * a free slot has notifications disabled and no pending readiness request.

use tracing::debug;

use crate::scheduler::StreamError;
use crate::slot::{ConnectionId, ConnectionSlot};

#[derive(Debug, Clone)]
pub struct SlotPool {
    slots: Vec<ConnectionSlot>,
}

impl SlotPool {
    /// Create `capacity` free slots, each with a `max_payload_len` buffer.
    pub fn new(capacity: usize, max_payload_len: usize) -> Self {
        Self {
            slots: (0..capacity)
                .map(|index| ConnectionSlot::new(index, max_payload_len))
                .collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently bound to a connection.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free()).count()
    }

    /// Bind `id` to the first free slot and return its index.
    ///
    /// `payload_unit` is the initial payload size (clamped to the buffer).
    ///
    /// # Errors
    /// * [`StreamError::DuplicateConnection`] if `id` already owns a slot.
    /// * [`StreamError::PoolExhausted`] if every slot is taken.  No slot is
    ///   modified in either case.
    pub fn allocate(&mut self, id: ConnectionId, payload_unit: usize) -> Result<usize, StreamError> {
        if self.lookup(id).is_ok() {
            return Err(StreamError::DuplicateConnection(id));
        }

        let index = self
            .slots
            .iter()
            .position(ConnectionSlot::is_free)
            .ok_or(StreamError::PoolExhausted {
                connection: id,
                capacity: self.slots.len(),
            })?;

        self.slots[index].bind(id, payload_unit);
        debug!(connection = %id, label = %self.slots[index].label, "slot allocated");
        Ok(index)
    }

    /// Index of the slot bound to `id`.
    pub fn lookup(&self, id: ConnectionId) -> Result<usize, StreamError> {
        self.slots
            .iter()
            .position(|s| s.connection_id == Some(id))
            .ok_or(StreamError::UnknownConnection(id))
    }

    /// Reset the slot bound to `id` to its free defaults.
    ///
    /// Idempotent: releasing an id that is not bound is a no-op and returns
    /// `None`.  Otherwise returns the index of the freed slot.
    pub fn release(&mut self, id: ConnectionId) -> Option<usize> {
        let index = self.lookup(id).ok()?;
        self.slots[index].reset();
        debug!(connection = %id, label = %self.slots[index].label, "slot released");
        Some(index)
    }

    pub fn get(&self, index: usize) -> Option<&ConnectionSlot> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ConnectionSlot> {
        self.slots.get_mut(index)
    }

    /// Slot bound to `id`.
    pub fn slot(&self, id: ConnectionId) -> Result<&ConnectionSlot, StreamError> {
        self.lookup(id).map(|i| &self.slots[i])
    }

    pub fn slots(&self) -> &[ConnectionSlot] {
        &self.slots
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionSlot> {
        self.slots.iter()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::SlotState;

    fn id(raw: u16) -> ConnectionId {
        ConnectionId(raw)
    }

    #[test]
    fn allocate_uses_first_free_slot() {
        let mut pool = SlotPool::new(3, 200);
        assert_eq!(pool.allocate(id(10), 20).unwrap(), 0);
        assert_eq!(pool.allocate(id(11), 20).unwrap(), 1);

        pool.release(id(10));
        // index 0 is free again and is preferred over index 2
        assert_eq!(pool.allocate(id(12), 20).unwrap(), 0);
        assert_eq!(pool.get(0).unwrap().label, 'A');
    }

    #[test]
    fn allocate_beyond_capacity_is_exhausted() {
        let mut pool = SlotPool::new(3, 200);
        for raw in 1..=3 {
            pool.allocate(id(raw), 20).unwrap();
        }
        let before: Vec<_> = pool.iter().map(|s| s.connection_id).collect();

        let err = pool.allocate(id(4), 20).unwrap_err();
        assert_eq!(
            err,
            StreamError::PoolExhausted {
                connection: id(4),
                capacity: 3
            }
        );

        let after: Vec<_> = pool.iter().map(|s| s.connection_id).collect();
        assert_eq!(before, after, "existing slots must be untouched");
        assert!(pool.lookup(id(4)).is_err());
    }

    #[test]
    fn duplicate_connection_is_rejected() {
        let mut pool = SlotPool::new(3, 200);
        pool.allocate(id(1), 20).unwrap();
        assert_eq!(
            pool.allocate(id(1), 20).unwrap_err(),
            StreamError::DuplicateConnection(id(1))
        );
        assert_eq!(pool.occupied(), 1);
    }

    #[test]
    fn lookup_unknown_is_not_found() {
        let pool = SlotPool::new(2, 200);
        assert_eq!(
            pool.lookup(id(9)).unwrap_err(),
            StreamError::UnknownConnection(id(9))
        );
    }

    #[test]
    fn release_is_idempotent() {
        let mut pool = SlotPool::new(2, 200);
        let index = pool.allocate(id(5), 20).unwrap();
        {
            let slot = pool.get_mut(index).unwrap();
            slot.notifications_enabled = true;
            slot.send_request_pending = true;
        }

        assert_eq!(pool.release(id(5)), Some(0));
        let once = pool.get(0).unwrap().clone();
        assert_eq!(pool.release(id(5)), None);
        let twice = pool.get(0).unwrap();

        assert_eq!(once.state(), SlotState::Free);
        assert_eq!(twice.state(), SlotState::Free);
        assert!(!twice.notifications_enabled);
        assert!(!twice.send_request_pending);
        assert_eq!(once.label, twice.label);
        assert_eq!(once.payload_unit, twice.payload_unit);
    }
}
