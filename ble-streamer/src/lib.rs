/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! BLE streamer – fair, flow-controlled notification scheduling for a
//! fixed number of concurrent peers.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── slot          – per-connection state record, labels, test pattern
//! ├── pool/         – fixed-capacity slot registry
//! ├── throughput/   – per-slot rate windows and reports
//! ├── transport     – Transport / Clock seams towards the radio
//! ├── scheduler/    – round-robin readiness scheduler + lifecycle handlers
//! ├── command       – relay command writes and the actuator sink
//! ├── config/       – YAML configuration
//! └── runtime/      – tokio event loop, simulated link, scripted runs
//! ```

pub mod command;
pub mod config;
pub mod pool;
pub mod runtime;
pub mod scheduler;
pub mod slot;
pub mod throughput;
pub mod transport;

pub use scheduler::{CycleOutcome, NotificationScheduler, StreamError};
pub use slot::ConnectionId;
