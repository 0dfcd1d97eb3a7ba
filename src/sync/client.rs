//! Session state for synchronizing with the signal controller
//!
//! `SyncClient` never blocks the caller on the network. Requests run in
//! spawned tasks and post their results back as [`SyncEvent`]s, which the
//! runtime hands to [`SyncClient::handle_event`] on the simulation thread.
//! Results from a superseded stream or session are dropped there.

use log::{debug, info, warn};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::controller::ControllerClient;
use super::error::SyncError;
use super::protocol::{DemandReport, SensorReport};
use super::stream::{StreamTask, StreamUpdate};
use crate::simulation::{DirectionCounts, PhaseSnapshot, TrafficWorld, DEFAULT_INTERSECTION};

/// Controller connection settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub base_url: String,
    pub intersection: String,
    /// Open the streaming channel in addition to polling
    pub streaming: bool,
    pub poll_interval_ms: u64,
    pub report_interval_ms: u64,
    /// Fixed delay before reconnecting a closed stream
    pub reconnect_delay_ms: u64,
    /// Delay before opening a stream to a new controller address
    pub switch_delay_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            intersection: DEFAULT_INTERSECTION.to_string(),
            streaming: true,
            poll_interval_ms: 1000,
            report_interval_ms: 1000,
            reconnect_delay_ms: 2000,
            switch_delay_ms: 500,
            request_timeout_ms: 3000,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

/// Results posted back by background sync tasks
#[derive(Debug)]
pub enum SyncEvent {
    /// From the stream task started for `generation`
    Stream { generation: u64, update: StreamUpdate },
    /// A poll issued during session `epoch`
    Poll {
        epoch: u64,
        result: Result<PhaseSnapshot, SyncError>,
    },
    Health(Result<String, SyncError>),
}

/// Client side of the controller session
pub struct SyncClient {
    config: SyncConfig,
    controller: ControllerClient,
    state: ConnectionState,
    /// Bumped whenever a new stream task replaces the old one
    generation: u64,
    /// Bumped whenever the intersection or controller changes
    epoch: u64,
    stream: Option<StreamTask>,
    last_snapshot: Option<PhaseSnapshot>,
    poll_failures: u32,
    events_tx: UnboundedSender<SyncEvent>,
    events_rx: UnboundedReceiver<SyncEvent>,
}

impl SyncClient {
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        let controller = ControllerClient::new(
            &config.base_url,
            Duration::from_millis(config.request_timeout_ms),
        )?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            controller,
            state: ConnectionState::Disconnected,
            generation: 0,
            epoch: 0,
            stream: None,
            last_snapshot: None,
            poll_failures: 0,
            events_tx,
            events_rx,
        })
    }

    pub fn intersection(&self) -> &str {
        &self.config.intersection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Connection state plus what the controller last told us
    pub fn status_line(&self) -> String {
        match &self.last_snapshot {
            Some(snapshot) => format!(
                "stream {} | controller: vertical={} horizontal={} next_change={:.0}s stage={}",
                self.state,
                snapshot.lights.vertical,
                snapshot.lights.horizontal,
                snapshot.time_to_next_change,
                snapshot.stage.as_deref().unwrap_or("-")
            ),
            None => format!("stream {} | controller: no update yet", self.state),
        }
    }

    /// Open the stream (if enabled) and fetch the current state
    pub fn start(&mut self) {
        if self.config.streaming {
            self.open_stream(Duration::ZERO);
        }
        self.request_poll();
    }

    /// Replace the stream task with a fresh one after `delay`
    pub fn open_stream(&mut self, delay: Duration) {
        self.close_stream();
        self.generation += 1;
        match self.controller.stream_url(&self.config.intersection) {
            Ok(url) => {
                debug!("Opening stream #{} to {}", self.generation, url);
                self.stream = Some(StreamTask::spawn(
                    url,
                    self.generation,
                    delay,
                    Duration::from_millis(self.config.reconnect_delay_ms),
                    self.events_tx.clone(),
                ));
            }
            Err(e) => warn!("Cannot open stream: {}", e),
        }
    }

    /// Cancel the current stream task, if any
    pub fn close_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.cancel();
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Switch the viewed intersection
    ///
    /// Local vehicles and statistics are cleared and the new intersection's
    /// state is fetched immediately. The stream is keyed by intersection, so it
    /// is reopened as well.
    pub fn switch_intersection(&mut self, intersection: &str, world: &mut TrafficWorld) {
        info!(
            "Switching intersection {} -> {}",
            self.config.intersection, intersection
        );
        self.config.intersection = intersection.to_string();
        self.epoch += 1;
        self.last_snapshot = None;
        world.switch_intersection(intersection);
        if self.config.streaming {
            self.open_stream(Duration::ZERO);
        }
        self.request_poll();
    }

    /// Point the client at a different controller
    ///
    /// The old stream is closed right away and a new one opened after the
    /// configured switch delay.
    pub fn switch_controller(&mut self, base_url: &str) -> Result<(), SyncError> {
        let controller = ControllerClient::new(
            base_url,
            Duration::from_millis(self.config.request_timeout_ms),
        )?;
        info!("Switching controller to {}", controller.base_url());
        self.controller = controller;
        self.config.base_url = base_url.to_string();
        self.epoch += 1;
        self.close_stream();
        if self.config.streaming {
            self.open_stream(Duration::from_millis(self.config.switch_delay_ms));
        }
        self.request_poll();
        Ok(())
    }

    /// Issue a background state fetch for the current session
    pub fn request_poll(&self) {
        let controller = self.controller.clone();
        let intersection = self.config.intersection.clone();
        let epoch = self.epoch;
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = controller.fetch_state(&intersection).await;
            let _ = events.send(SyncEvent::Poll { epoch, result });
        });
    }

    /// Fire-and-forget sensor report
    pub fn send_sensor_report(&self, report: SensorReport) {
        let controller = self.controller.clone();
        let intersection = self.config.intersection.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.send_sensor(&intersection, &report).await {
                debug!("Sensor report dropped: {}", e);
            }
        });
    }

    /// Fire-and-forget demand report for freshly requested traffic
    pub fn send_demand(&self, counts: DirectionCounts) {
        let report = DemandReport::from_counts(counts);
        let controller = self.controller.clone();
        let intersection = self.config.intersection.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.send_demand(&intersection, &report).await {
                warn!("Demand report dropped: {}", e);
            }
        });
    }

    /// Ask the controller to reset the current intersection
    pub fn reset_remote(&self) {
        let controller = self.controller.clone();
        let intersection = self.config.intersection.clone();
        tokio::spawn(async move {
            match controller.reset(&intersection).await {
                Ok(()) => info!("Controller reset {}", intersection),
                Err(e) => warn!("Controller reset failed: {}", e),
            }
        });
    }

    pub fn check_health(&self) {
        let controller = self.controller.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = controller.health().await;
            let _ = events.send(SyncEvent::Health(result));
        });
    }

    /// Wait for the next background result
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        self.events_rx.recv().await
    }

    /// Apply a background result; returns true if the phase state changed
    pub fn handle_event(&mut self, event: SyncEvent, world: &mut TrafficWorld) -> bool {
        match event {
            SyncEvent::Stream { generation, update } => {
                if generation != self.generation || self.stream.is_none() {
                    debug!(
                        "Dropped update from stale stream #{} (current #{})",
                        generation, self.generation
                    );
                    return false;
                }
                self.handle_stream_update(update, world)
            }
            SyncEvent::Poll { epoch, result } => {
                if epoch != self.epoch {
                    debug!("Dropped poll from stale session {}", epoch);
                    return false;
                }
                match result {
                    Ok(snapshot) => {
                        if self.poll_failures > 0 {
                            info!("Controller reachable again after {} failed polls", self.poll_failures);
                        }
                        self.poll_failures = 0;
                        self.apply_snapshot(snapshot, world);
                        true
                    }
                    Err(e) => {
                        self.poll_failures += 1;
                        if self.poll_failures == 1 {
                            warn!("Lost contact with controller: {}", e);
                        } else {
                            debug!("Poll failed ({}): {}", self.poll_failures, e);
                        }
                        false
                    }
                }
            }
            SyncEvent::Health(result) => {
                match result {
                    Ok(body) => info!("Controller health: {}", body.trim()),
                    Err(e) => warn!("Controller health check failed: {}", e),
                }
                false
            }
        }
    }

    fn handle_stream_update(&mut self, update: StreamUpdate, world: &mut TrafficWorld) -> bool {
        match update {
            StreamUpdate::Connecting => {
                self.state = ConnectionState::Connecting;
                false
            }
            StreamUpdate::Connected => {
                self.state = ConnectionState::Connected;
                false
            }
            StreamUpdate::Disconnected(reason) => {
                if self.state == ConnectionState::Connected {
                    warn!("Stream disconnected: {}", reason);
                } else {
                    debug!("Stream connect failed: {}", reason);
                }
                self.state = ConnectionState::Disconnected;
                false
            }
            StreamUpdate::Snapshot(snapshot) => {
                self.apply_snapshot(snapshot, world);
                true
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: PhaseSnapshot, world: &mut TrafficWorld) {
        world.apply_snapshot(&snapshot);
        self.last_snapshot = Some(snapshot);
    }

    /// Stop background streaming
    pub fn shutdown(&mut self) {
        self.close_stream();
    }
}
