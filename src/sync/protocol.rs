//! Wire shapes exchanged with the signal controller

use serde::{Deserialize, Serialize};

use crate::simulation::{DirectionCounts, PhaseGroup, PhaseSnapshot};

pub use crate::simulation::SensorReport;

/// Outbound traffic demand: per-direction counts plus an optional phase hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandReport {
    #[serde(flatten)]
    pub counts: DirectionCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_phase: Option<PhaseGroup>,
}

impl DemandReport {
    pub fn from_counts(counts: DirectionCounts) -> Self {
        Self {
            counts,
            preferred_phase: counts.preferred_phase(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// A decoded message from the streaming channel
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    State(PhaseSnapshot),
    /// Anything that is not a well-formed state envelope, with the reason
    Ignored(String),
}

/// Decode one text frame from the streaming channel
pub fn decode_stream_message(text: &str) -> StreamMessage {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => return StreamMessage::Ignored(format!("not an envelope: {e}")),
    };
    if envelope.kind != "state" {
        return StreamMessage::Ignored(format!("unhandled message type '{}'", envelope.kind));
    }
    match serde_json::from_value::<PhaseSnapshot>(envelope.data) {
        Ok(snapshot) => StreamMessage::State(snapshot),
        Err(e) => StreamMessage::Ignored(format!("malformed state: {e}")),
    }
}

/// Decode the body of a polling response
pub fn decode_state_response(body: &str) -> Result<PhaseSnapshot, serde_json::Error> {
    serde_json::from_str(body)
}
