/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the notification streamer.
//!
//! None of these are fatal.  Every handler on
//! [`NotificationScheduler`](super::NotificationScheduler) returns them so the
//! caller can log or count the outcome, then carries on with the next event:
//!
//! | Variant | Typical cause | Effect |
//! |---|---|---|
//! | `PoolExhausted` | more peers than slots | connection left untracked |
//! | `UnknownConnection` | event raced a disconnect | no-op |
//! | `DuplicateConnection` | repeated "connected" event | no-op |
//! | `SendFailure` | link refused the notification | zero bytes counted, slot advances |

use thiserror::Error;

use crate::slot::ConnectionId;
use crate::transport::SendError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// A peer connected while every slot was taken.
    #[error("connection {connection} not tracked: all {capacity} slots are in use")]
    PoolExhausted {
        connection: ConnectionId,
        capacity: usize,
    },

    /// The event names a connection that no slot is bound to.
    #[error("connection {0} is not tracked")]
    UnknownConnection(ConnectionId),

    /// A "connected" event arrived for a connection that already owns a slot.
    #[error("connection {0} is already bound to a slot")]
    DuplicateConnection(ConnectionId),

    /// The transport did not accept the notification.
    #[error("send to connection {connection} failed: {source}")]
    SendFailure {
        connection: ConnectionId,
        #[source]
        source: SendError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_connection() {
        let err = StreamError::PoolExhausted {
            connection: ConnectionId(0x43),
            capacity: 3,
        };
        assert_eq!(
            err.to_string(),
            "connection 0x0043 not tracked: all 3 slots are in use"
        );

        let err = StreamError::SendFailure {
            connection: ConnectionId(1),
            source: SendError::BufferFull,
        };
        assert_eq!(
            err.to_string(),
            "send to connection 0x0001 failed: link buffers are full"
        );
    }
}
