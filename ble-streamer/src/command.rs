/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Peer command writes and the actuation sink they drive.
//!
//! A peer controls two relays by writing one byte to the command
//! characteristic:
//!
//! | Bits | Relay 1 | Relay 2 |
//! |---|---|---|
//! | bit 0 set | on | off |
//! | bit 0 clear, bit 1 set | off | on |
//! | neither | off | off |
//!
//! The relays are interlocked: bit 0 wins, so both are never on together.
//! What "on" means physically (GPIO, display lines) is up to the
//! [`Actuator`] implementation.

use tracing::info;

/// Decoded relay states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayCommand {
    pub relay1: bool,
    pub relay2: bool,
}

impl RelayCommand {
    /// Decode a command write.  Only the first byte is significant; an empty
    /// write yields `None`.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let byte = *data.first()?;
        Some(Self::from_byte(byte))
    }

    pub fn from_byte(byte: u8) -> Self {
        if byte & 0x01 != 0 {
            Self {
                relay1: true,
                relay2: false,
            }
        } else if byte & 0x02 != 0 {
            Self {
                relay1: false,
                relay2: true,
            }
        } else {
            Self::default()
        }
    }

    /// Encode back to the wire byte.
    pub fn to_byte(self) -> u8 {
        u8::from(self.relay1) | (u8::from(self.relay2) << 1)
    }

    /// Two 16-column status lines, as shown on the device display.
    pub fn status_lines(self) -> [&'static str; 2] {
        [
            if self.relay1 {
                "-- Relay 1 ON   "
            } else {
                "-- Relay 1 OFF  "
            },
            if self.relay2 {
                "-- Relay 2 ON   "
            } else {
                "-- Relay 2 OFF  "
            },
        ]
    }
}

/// Link-level status shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

impl LinkStatus {
    pub fn status_line(self) -> &'static str {
        match self {
            LinkStatus::Connected => "-- Connected    ",
            LinkStatus::Disconnected => "-- Disconnected ",
        }
    }
}

/// Sink for physical side effects of received data.
pub trait Actuator {
    fn apply(&mut self, command: RelayCommand);

    fn show_status(&mut self, status: LinkStatus);
}

/// Actuator that only logs.  Used when no hardware is attached.
#[derive(Debug, Default)]
pub struct LogActuator {
    last: Option<RelayCommand>,
}

impl LogActuator {
    pub fn last_command(&self) -> Option<RelayCommand> {
        self.last
    }
}

impl Actuator for LogActuator {
    fn apply(&mut self, command: RelayCommand) {
        let [line1, line2] = command.status_lines();
        info!(relay1 = command.relay1, relay2 = command.relay2, "{}| {}", line1.trim_end(), line2.trim_end());
        self.last = Some(command);
    }

    fn show_status(&mut self, status: LinkStatus) {
        info!("{}", status.status_line().trim_end());
    }
}
