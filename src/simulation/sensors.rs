//! Loop-detector style estimates derived from vehicle positions
//!
//! Nothing here keeps state between calls; every estimate is recomputed from
//! the vehicles passed in.

use serde::{Deserialize, Serialize};

use super::intersection::IntersectionGeometry;
use super::types::{DirectionCounts, STOP_LINE_TOLERANCE};
use super::vehicle::Vehicle;

/// Distance behind the stop line in which waiting vehicles count as queued
pub const DEFAULT_QUEUE_WINDOW: f32 = 60.0;

/// Sensor payload sent to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorReport {
    pub arrivals: DirectionCounts,
    pub departures: DirectionCounts,
    pub occupancy: u32,
}

/// Waiting vehicles near each stop line
pub fn estimate_queues(
    vehicles: &[Vehicle],
    geometry: &IntersectionGeometry,
    window: f32,
) -> DirectionCounts {
    let mut queues = DirectionCounts::default();
    for vehicle in vehicles.iter().filter(|v| v.is_waiting()) {
        let distance = vehicle.distance_to_stop_line(geometry);
        if distance >= -STOP_LINE_TOLERANCE && distance <= window {
            queues[vehicle.direction] += 1;
        }
    }
    queues
}

/// Vehicles inside the intersection box, whatever their direction or state
pub fn estimate_occupancy(vehicles: &[Vehicle], geometry: &IntersectionGeometry) -> u32 {
    vehicles
        .iter()
        .filter(|v| geometry.contains(&v.position))
        .count() as u32
}
