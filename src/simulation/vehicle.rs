//! Vehicle kinematics for the intersection simulation
//!
//! Each vehicle moves along a single straight lane. Motion is reduced to a
//! scalar "progress" along the direction of travel so the same rules apply to
//! every approach.

use serde::Deserialize;

use super::intersection::IntersectionGeometry;
use super::signal::SignalColor;
use super::types::{Direction, Position, STOP_LINE_TOLERANCE, WAITING_SPEED_THRESHOLD};

/// Tunable kinematic parameters shared by newly spawned vehicles
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    pub length: f32,
    /// Units per second
    pub max_speed: f32,
    /// Units per second squared
    pub acceleration: f32,
    /// Units per second squared
    pub braking: f32,
    /// Minimum bumper-to-bumper gap to the vehicle ahead
    pub min_gap: f32,
    /// Extra distance added to the braking distance when approaching a stop line
    pub stop_buffer: f32,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            length: 20.0,
            max_speed: 120.0,
            acceleration: 60.0,
            braking: 180.0,
            min_gap: 10.0,
            stop_buffer: 6.0,
        }
    }
}

/// What the engine should do with a vehicle after it moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleUpdateResult {
    Continue,
    /// Passed beyond the visible bounds
    Exited,
}

/// The vehicle ahead in the same lane, as of the previous tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leader {
    pub progress: f32,
}

/// A vehicle in the simulation
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub position: Position,
    pub direction: Direction,
    pub speed: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    pub braking: f32,
    pub min_gap: f32,
    pub stop_buffer: f32,
    pub length: f32,
    pub stopped: bool,
    /// Simulation time the vehicle was spawned
    pub created_at: f32,
    /// Simulation time the vehicle left the visible bounds
    pub exited_at: Option<f32>,
}

impl Vehicle {
    pub fn new(
        direction: Direction,
        position: Position,
        params: &VehicleParams,
        max_speed: f32,
        created_at: f32,
    ) -> Self {
        Self {
            position,
            direction,
            speed: 0.0,
            max_speed,
            acceleration: params.acceleration,
            braking: params.braking,
            min_gap: params.min_gap,
            stop_buffer: params.stop_buffer,
            length: params.length,
            stopped: false,
            created_at,
            exited_at: None,
        }
    }

    /// Progress of the vehicle center along its direction of travel
    pub fn progress(&self) -> f32 {
        self.direction.progress(&self.position)
    }

    /// Distance from the front bumper to the stop line; negative once past it
    pub fn distance_to_stop_line(&self, geometry: &IntersectionGeometry) -> f32 {
        geometry.stop_line_progress(self.direction) - (self.progress() + self.length / 2.0)
    }

    /// Distance needed to stop from the current speed, plus the stop buffer
    pub fn braking_distance(&self) -> f32 {
        self.speed * self.speed / (2.0 * self.braking) + self.stop_buffer
    }

    /// Bumper-to-bumper gap to a leader
    pub fn gap_to(&self, leader: &Leader) -> f32 {
        leader.progress - self.progress() - self.length
    }

    pub fn is_waiting(&self) -> bool {
        self.stopped || self.speed < WAITING_SPEED_THRESHOLD
    }

    /// Advance one tick
    ///
    /// `signal` is the color governing this vehicle's axis and `leader` is the
    /// nearest vehicle ahead in the same lane from the previous tick's snapshot.
    pub fn update(
        &mut self,
        delta_secs: f32,
        signal: SignalColor,
        leader: Option<Leader>,
        geometry: &IntersectionGeometry,
    ) -> VehicleUpdateResult {
        if delta_secs <= 0.0 {
            return self.bounds_check(geometry);
        }

        let to_stop_line = self.distance_to_stop_line(geometry);
        let short_of_line = to_stop_line >= -STOP_LINE_TOLERANCE;
        let stop_for_light =
            signal.requires_stop() && short_of_line && to_stop_line <= self.braking_distance();

        if self.stopped {
            // Held until the light clears, wherever the vehicle came to rest
            if signal.requires_stop() && short_of_line {
                self.speed = 0.0;
                return VehicleUpdateResult::Continue;
            }
            self.stopped = false;
        }

        let gap = leader.map(|l| self.gap_to(&l));
        let too_close = gap.is_some_and(|g| g < self.min_gap);

        if stop_for_light || too_close {
            self.speed = (self.speed - self.braking * delta_secs).max(0.0);
        } else {
            self.speed = (self.speed + self.acceleration * delta_secs).min(self.max_speed);
        }

        let mut displacement = self.speed * delta_secs;

        if stop_for_light && displacement >= to_stop_line {
            // Hold at the line rather than cross it
            displacement = to_stop_line.max(0.0);
            self.speed = 0.0;
        }

        if let Some(gap) = gap {
            let allowed = gap.max(0.0);
            if displacement > allowed {
                displacement = allowed;
                self.speed = self.speed.min(allowed / delta_secs);
            }
        }

        if stop_for_light && self.speed == 0.0 {
            self.stopped = true;
        }

        let (hx, hy) = self.direction.heading();
        self.position.x += hx * displacement;
        self.position.y += hy * displacement;

        self.bounds_check(geometry)
    }

    fn bounds_check(&self, geometry: &IntersectionGeometry) -> VehicleUpdateResult {
        if self.progress() > geometry.exit_progress(self.direction) {
            VehicleUpdateResult::Exited
        } else {
            VehicleUpdateResult::Continue
        }
    }
}
