/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scripted end-to-end run: simulated peers, simulated link, real scheduler.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use super::{EventLoop, LinkEvent, LoopStats, SimulatedLink, TokioClock};
use crate::command::LogActuator;
use crate::config::{PeerScript, StreamerConfig};
use crate::scheduler::lifecycle::CCCD_NOTIFICATIONS;
use crate::scheduler::NotificationScheduler;
use crate::slot::ConnectionId;
use crate::throughput::ThroughputReport;

/// First handle the simulated controller hands out.
const FIRST_HANDLE: u16 = 0x0040;

/// Connection handle of the `index`-th scripted peer.
pub fn peer_connection_id(index: usize) -> ConnectionId {
    ConnectionId(FIRST_HANDLE.wrapping_add(index as u16))
}

/// Result of [`simulate`].
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    /// Reports in emission order.
    pub reports: Vec<ThroughputReport>,
    pub stats: LoopStats,
    /// Bytes the link accepted, per connection.
    pub delivered: BTreeMap<ConnectionId, u64>,
    /// Slots still bound when the run ended.
    pub tracked_at_end: usize,
    /// Last command-characteristic value each peer read back.
    pub command_reads: BTreeMap<ConnectionId, Vec<u8>>,
}

impl SimulationSummary {
    /// Total reported bytes per slot label.
    pub fn bytes_by_label(&self) -> BTreeMap<char, u64> {
        let mut totals = BTreeMap::new();
        for report in &self.reports {
            *totals.entry(report.label).or_insert(0) += report.bytes;
        }
        totals
    }

    pub fn reports_for(&self, label: char) -> impl Iterator<Item = &ThroughputReport> {
        self.reports.iter().filter(move |r| r.label == label)
    }
}

/// Run the configured peers against a scheduler for
/// `config.simulation.duration_ms` of tokio time.
///
/// # Errors
/// Fails if the streamer settings are invalid or the event loop task
/// panicked.
pub async fn simulate(config: &StreamerConfig) -> Result<SimulationSummary> {
    config.streamer.validate()?;
    let sim = &config.simulation;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (reports_tx, mut reports_rx) = mpsc::unbounded_channel();

    let mut link = SimulatedLink::new(
        events_tx.clone(),
        Duration::from_millis(sim.readiness_delay_ms),
    );
    for (index, peer) in sim.peers.iter().enumerate() {
        link.set_fail_every(peer_connection_id(index), peer.fail_every);
    }

    let scheduler = NotificationScheduler::new(config.streamer.clone(), link, TokioClock::new());
    let event_loop =
        EventLoop::new(scheduler, events_rx, LogActuator::default()).with_reports(reports_tx);
    let loop_handle = tokio::spawn(event_loop.run());

    info!(
        peers = sim.peers.len(),
        duration_ms = sim.duration_ms,
        readiness_delay_ms = sim.readiness_delay_ms,
        "simulation started"
    );

    let start = Instant::now();
    let scripts: Vec<_> = sim
        .peers
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, peer)| {
            tokio::spawn(run_peer(
                peer_connection_id(index),
                peer,
                start,
                events_tx.clone(),
            ))
        })
        .collect();

    sleep_until(start + Duration::from_millis(sim.duration_ms)).await;
    for script in &scripts {
        script.abort();
    }
    // The loop owns a sender through the link, so it only stops on Shutdown.
    let _ = events_tx.send(LinkEvent::Shutdown);

    let exit = loop_handle.await.context("event loop task failed")?;

    let mut reports = Vec::new();
    while let Ok(report) = reports_rx.try_recv() {
        reports.push(report);
    }

    let summary = SimulationSummary {
        reports,
        stats: exit.stats,
        delivered: exit.scheduler.transport().delivered().clone(),
        tracked_at_end: exit.scheduler.pool().occupied(),
        command_reads: exit.scheduler.transport().read_responses().clone(),
    };
    info!(
        reports = summary.reports.len(),
        bytes_sent = summary.stats.bytes_sent,
        tracked_at_end = summary.tracked_at_end,
        "simulation finished"
    );
    Ok(summary)
}

/// Play one peer's script onto the event channel.
async fn run_peer(
    id: ConnectionId,
    script: PeerScript,
    start: Instant,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    let at = |ms: u64| start + Duration::from_millis(ms);

    sleep_until(at(script.connect_after_ms)).await;
    debug!(connection = %id, "peer connecting");
    if events.send(LinkEvent::Connected(id)).is_err() {
        return;
    }
    if let Some(mtu) = script.mtu {
        let _ = events.send(LinkEvent::MtuNegotiated { connection: id, mtu });
    }

    if let Some(subscribe_ms) = script.subscribe_after_ms {
        sleep_until(at(subscribe_ms.max(script.connect_after_ms))).await;
        let _ = events.send(LinkEvent::CccdWrite {
            connection: id,
            value: CCCD_NOTIFICATIONS,
        });
        if let Some(command) = script.command {
            let _ = events.send(LinkEvent::CommandWrite {
                connection: id,
                data: vec![command],
            });
        }
        if script.read_back {
            let _ = events.send(LinkEvent::CommandRead(id));
        }
    }

    if let Some(disconnect_ms) = script.disconnect_after_ms {
        sleep_until(at(disconnect_ms)).await;
        debug!(connection = %id, "peer disconnecting");
        let _ = events.send(LinkEvent::Disconnected(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationSettings;

    fn config(peers: Vec<PeerScript>, duration_ms: u64) -> StreamerConfig {
        StreamerConfig {
            simulation: SimulationSettings {
                readiness_delay_ms: 10,
                duration_ms,
                peers,
            },
            ..StreamerConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_peers_share_the_link_evenly() {
        let cfg = config(vec![PeerScript::default(); 2], 10_000);
        let summary = simulate(&cfg).await.unwrap();

        assert_eq!(summary.tracked_at_end, 2);
        for label in ['A', 'B'] {
            let reports: Vec<_> = summary.reports_for(label).collect();
            assert!(reports.len() >= 2, "label {label}: {} reports", reports.len());
            for r in reports {
                assert!(r.elapsed_ms >= 3_000);
                // 20 bytes every 10 ms per peer
                assert!(
                    (1_800..=2_200).contains(&r.bytes_per_second),
                    "label {label}: {} B/s",
                    r.bytes_per_second
                );
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fourth_peer_is_rejected() {
        let cfg = config(vec![PeerScript::default(); 4], 4_000);
        let summary = simulate(&cfg).await.unwrap();

        assert_eq!(summary.stats.rejected_connections, 1);
        assert_eq!(summary.tracked_at_end, 3);
        // the rejected peer never received a byte
        assert_eq!(summary.delivered.len(), 3);
        assert!(summary.reports.iter().all(|r| r.label != 'D'));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_leaves_stale_readiness_harmless() {
        let leaving = PeerScript {
            disconnect_after_ms: Some(1_000),
            ..PeerScript::default()
        };
        let cfg = config(vec![leaving, PeerScript::default()], 5_000);
        let summary = simulate(&cfg).await.unwrap();

        assert_eq!(summary.tracked_at_end, 1);
        assert!(summary.stats.stale_events >= 1);
        // the peer that left never reached a report boundary
        assert_eq!(summary.bytes_by_label().len(), 1);
        assert!(!summary.reports.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_peer_keeps_streaming() {
        let flaky = PeerScript {
            fail_every: 2,
            ..PeerScript::default()
        };
        let cfg = config(vec![flaky, PeerScript::default()], 4_000);
        let summary = simulate(&cfg).await.unwrap();

        assert!(summary.stats.send_failures > 0);
        let flaky_bytes = summary.delivered[&peer_connection_id(0)];
        let steady_bytes = summary.delivered[&peer_connection_id(1)];
        assert!(flaky_bytes > 0);
        assert!(flaky_bytes < steady_bytes);
    }

    #[tokio::test(start_paused = true)]
    async fn peer_without_subscription_gets_no_data() {
        let silent = PeerScript {
            subscribe_after_ms: None,
            ..PeerScript::default()
        };
        let cfg = config(vec![silent, PeerScript::default()], 4_000);
        let summary = simulate(&cfg).await.unwrap();

        assert!(!summary.delivered.contains_key(&peer_connection_id(0)));
        assert_eq!(summary.bytes_by_label().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn larger_mtu_raises_throughput() {
        let big = PeerScript {
            mtu: Some(103),
            ..PeerScript::default()
        };
        let cfg = config(vec![PeerScript::default(), big], 4_000);
        let summary = simulate(&cfg).await.unwrap();

        let small = summary.delivered[&peer_connection_id(0)];
        let large = summary.delivered[&peer_connection_id(1)];
        assert!(large > small * 4, "{large} vs {small}");
    }

    #[tokio::test(start_paused = true)]
    async fn peers_read_back_the_latest_command() {
        let writer = PeerScript {
            command: Some(0x02),
            read_back: true,
            ..PeerScript::default()
        };
        let late_reader = PeerScript {
            subscribe_after_ms: Some(500),
            read_back: true,
            ..PeerScript::default()
        };
        let cfg = config(vec![writer, late_reader], 1_000);
        let summary = simulate(&cfg).await.unwrap();

        assert_eq!(summary.command_reads[&peer_connection_id(0)], vec![0x02]);
        // the command is shared, not per connection
        assert_eq!(summary.command_reads[&peer_connection_id(1)], vec![0x02]);
    }

    #[tokio::test]
    async fn invalid_settings_are_rejected() {
        let mut cfg = StreamerConfig::default();
        cfg.streamer.max_connections = 0;
        assert!(simulate(&cfg).await.is_err());
    }
}
