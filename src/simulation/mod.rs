//! Standalone intersection simulation
//!
//! Vehicle kinematics, the local copy of the signal phase, and the estimates
//! reported back to the controller. Nothing here performs I/O; the sync layer
//! feeds snapshots in and reads reports out.

mod intersection;
mod scenario;
mod sensors;
mod signal;
mod stats;
mod types;
mod vehicle;
mod world;

pub use intersection::IntersectionGeometry;
pub use scenario::{Scenario, UnknownScenario, RANDOM_MAX_PER_DIRECTION};
pub use sensors::{estimate_occupancy, estimate_queues, SensorReport, DEFAULT_QUEUE_WINDOW};
pub use signal::{Lights, PhaseSnapshot, PhaseTracker, Signal, SignalColor};
pub use stats::{DepartureCounter, SimulationStats};
pub use types::{
    Axis, Direction, DirectionCounts, PhaseGroup, Position, SpawnError, SpawnRequest,
    STOP_LINE_TOLERANCE, WAITING_SPEED_THRESHOLD,
};
pub use vehicle::{Leader, Vehicle, VehicleParams, VehicleUpdateResult};
pub use world::{SimulationConfig, TrafficWorld, DEFAULT_INTERSECTION};
