//! Synchronization with the remote signal controller
//!
//! Phase snapshots arrive over a streaming channel and, redundantly, by polling.
//! Sensor and demand reports go out as fire-and-forget HTTP requests.

mod client;
mod controller;
mod error;
mod protocol;
mod stream;

pub use client::{ConnectionState, SyncClient, SyncConfig, SyncEvent};
pub use controller::{
    ControllerClient, HEALTH_PATH, RESET_PATH, SENSOR_PATH, STATE_PATH, STREAM_PATH, TRAFFIC_PATH,
};
pub use error::SyncError;
pub use protocol::{
    decode_state_response, decode_stream_message, DemandReport, SensorReport, StreamMessage,
};
pub use stream::{StreamTask, StreamUpdate};
