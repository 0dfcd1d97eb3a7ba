//! Streaming connection task
//!
//! Runs `Disconnected -> Connecting -> Connected -> Disconnected` in a loop with
//! a fixed reconnect delay until its cancellation token fires. Every update is
//! tagged with the generation the task was started for.

use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::Url;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::client::SyncEvent;
use super::protocol::{decode_stream_message, StreamMessage};
use crate::simulation::PhaseSnapshot;

/// Updates reported by a stream task
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Connecting,
    Connected,
    Disconnected(String),
    Snapshot(PhaseSnapshot),
}

/// Handle to a running stream task
#[derive(Debug)]
pub struct StreamTask {
    pub generation: u64,
    cancel: CancellationToken,
}

impl StreamTask {
    /// Spawn a task that connects after `initial_delay`
    pub fn spawn(
        url: Url,
        generation: u64,
        initial_delay: Duration,
        reconnect_delay: Duration,
        events: UnboundedSender<SyncEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(initial_delay) => {}
            }
            run_stream(url, generation, reconnect_delay, events, token).await;
        });
        Self { generation, cancel }
    }

    /// Stop the task; nothing more is delivered from it afterwards
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for StreamTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn send(events: &UnboundedSender<SyncEvent>, generation: u64, update: StreamUpdate) -> bool {
    events
        .send(SyncEvent::Stream { generation, update })
        .is_ok()
}

async fn run_stream(
    url: Url,
    generation: u64,
    reconnect_delay: Duration,
    events: UnboundedSender<SyncEvent>,
    cancel: CancellationToken,
) {
    loop {
        if !send(&events, generation, StreamUpdate::Connecting) {
            return;
        }

        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = connect_async(url.as_str()) => result,
        };

        let reason = match connected {
            Ok((mut socket, _)) => {
                info!("Stream #{} connected to {}", generation, url);
                if !send(&events, generation, StreamUpdate::Connected) {
                    return;
                }
                loop {
                    let frame = tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = socket.close(None).await;
                            return;
                        }
                        frame = socket.next() => frame,
                    };
                    match frame {
                        Some(Ok(Message::Text(text))) => match decode_stream_message(&text) {
                            StreamMessage::State(snapshot) => {
                                if !send(&events, generation, StreamUpdate::Snapshot(snapshot)) {
                                    return;
                                }
                            }
                            StreamMessage::Ignored(why) => {
                                debug!("Stream #{} ignored message: {}", generation, why);
                            }
                        },
                        Some(Ok(Message::Close(_))) | None => break "closed by controller".to_string(),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => break e.to_string(),
                    }
                }
            }
            Err(e) => e.to_string(),
        };

        if !send(&events, generation, StreamUpdate::Disconnected(reason)) {
            return;
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}
