//! Signal phase tracking
//!
//! The local copy of the controller's light state. Nothing in the simulation
//! changes a signal on its own; only snapshots received from the controller do.

use serde::Deserialize;
use std::fmt;

use super::intersection::IntersectionGeometry;
use super::types::{Axis, Position};

/// Color shown by a signal head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalColor {
    Green,
    Yellow,
    Red,
}

impl SignalColor {
    /// Red and yellow both ask approaching vehicles to stop if they can
    pub fn requires_stop(self) -> bool {
        matches!(self, SignalColor::Red | SignalColor::Yellow)
    }

    /// Map glyph for a signal head
    pub fn symbol(self) -> char {
        match self {
            SignalColor::Green => 'G',
            SignalColor::Yellow => 'Y',
            SignalColor::Red => 'R',
        }
    }
}

impl fmt::Display for SignalColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignalColor::Green => "green",
            SignalColor::Yellow => "yellow",
            SignalColor::Red => "red",
        })
    }
}

/// Colors per orientation as sent by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Lights {
    pub vertical: SignalColor,
    pub horizontal: SignalColor,
}

/// A phase snapshot as published by the controller
///
/// Extra fields in the payload are ignored. Missing lights or an unknown color
/// make the whole snapshot fail to parse, which callers treat as a no-op.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhaseSnapshot {
    pub lights: Lights,
    pub time_to_next_change: f32,
    #[serde(default)]
    pub stage: Option<String>,
}

/// A signal head for one orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub axis: Axis,
    pub color: SignalColor,
    pub position: Position,
}

/// Last-known phase state
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    pub vertical: Signal,
    pub horizontal: Signal,
    /// Seconds until the next change as of `updated_at`
    pub time_to_next_change: f32,
    pub stage: Option<String>,
    /// Simulation time the last snapshot was applied, if any
    pub updated_at: Option<f32>,
}

impl PhaseTracker {
    /// Starts with vertical green and horizontal red, the controller's own
    /// initial assignment
    pub fn new(geometry: &IntersectionGeometry) -> Self {
        Self {
            vertical: Signal {
                axis: Axis::Vertical,
                color: SignalColor::Green,
                position: geometry.signal_position(Axis::Vertical),
            },
            horizontal: Signal {
                axis: Axis::Horizontal,
                color: SignalColor::Red,
                position: geometry.signal_position(Axis::Horizontal),
            },
            time_to_next_change: 0.0,
            stage: None,
            updated_at: None,
        }
    }

    pub fn color(&self, axis: Axis) -> SignalColor {
        match axis {
            Axis::Vertical => self.vertical.color,
            Axis::Horizontal => self.horizontal.color,
        }
    }

    /// Apply a snapshot received at simulation time `now`
    pub fn apply(&mut self, snapshot: &PhaseSnapshot, now: f32) {
        self.vertical.color = snapshot.lights.vertical;
        self.horizontal.color = snapshot.lights.horizontal;
        self.time_to_next_change = snapshot.time_to_next_change.max(0.0);
        self.stage = snapshot.stage.clone();
        self.updated_at = Some(now);
    }

    /// Estimated seconds until the next change, counting down locally
    pub fn remaining(&self, now: f32) -> f32 {
        match self.updated_at {
            Some(at) => (self.time_to_next_change - (now - at)).max(0.0),
            None => self.time_to_next_change,
        }
    }

    pub fn summary(&self, now: f32) -> String {
        format!(
            "vertical={} horizontal={} next_change={:.0}s{}",
            self.vertical.color,
            self.horizontal.color,
            self.remaining(now),
            self.stage
                .as_deref()
                .map(|s| format!(" stage={s}"))
                .unwrap_or_default()
        )
    }
}
