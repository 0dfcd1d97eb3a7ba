//! Main simulation world that ties everything together
//!
//! `TrafficWorld` is the single owner of the vehicle set, the phase tracker and
//! the statistics. The runtime passes it by reference into the tick and timer
//! handlers; nothing else holds simulation state.

use log::{debug, info};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use super::intersection::IntersectionGeometry;
use super::scenario::Scenario;
use super::sensors::{self, SensorReport, DEFAULT_QUEUE_WINDOW};
use super::signal::{PhaseSnapshot, PhaseTracker};
use super::stats::{DepartureCounter, SimulationStats};
use super::types::{Direction, DirectionCounts, Position, SpawnRequest};
use super::vehicle::{Leader, Vehicle, VehicleParams, VehicleUpdateResult};

/// Intersection identifier used when none is given
pub const DEFAULT_INTERSECTION: &str = "main";

/// Static settings for a simulation world
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub geometry: IntersectionGeometry,
    pub vehicle: VehicleParams,
    /// Distance between consecutive spawns in the same lane
    pub spawn_spacing: f32,
    /// How far behind the stop line a waiting vehicle still counts as queued
    pub queue_window: f32,
    /// Fractional spread applied to each vehicle's max speed (0 disables)
    pub speed_variation: f32,
    /// Seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            geometry: IntersectionGeometry::default(),
            vehicle: VehicleParams::default(),
            spawn_spacing: 40.0,
            queue_window: DEFAULT_QUEUE_WINDOW,
            speed_variation: 0.0,
            seed: None,
        }
    }
}

/// Nearest-ahead lookup built from one tick's positions
type LaneIndex = HashMap<Direction, BTreeMap<OrderedFloat<f32>, usize>>;

/// The main simulation world
pub struct TrafficWorld {
    pub config: SimulationConfig,

    /// Active vehicles, in no particular order
    pub vehicles: Vec<Vehicle>,

    pub phase: PhaseTracker,

    pub stats: SimulationStats,

    departures: DepartureCounter,

    /// Intersection this world is currently showing
    pub intersection_id: String,

    /// Simulation time in seconds
    pub time: f32,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,
}

impl Default for TrafficWorld {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl TrafficWorld {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = config.seed.map(StdRng::seed_from_u64);
        Self {
            phase: PhaseTracker::new(&config.geometry),
            config,
            vehicles: Vec::new(),
            stats: SimulationStats::default(),
            departures: DepartureCounter::default(),
            intersection_id: DEFAULT_INTERSECTION.to_string(),
            time: 0.0,
            rng,
        }
    }

    /// Create a world with a seeded RNG
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new(SimulationConfig {
            seed: Some(seed),
            ..SimulationConfig::default()
        })
    }

    pub fn geometry(&self) -> &IntersectionGeometry {
        &self.config.geometry
    }

    /// Get a random value in the given range, using seeded RNG if available
    fn random_range(&mut self, range: std::ops::RangeInclusive<f32>) -> f32 {
        match &mut self.rng {
            Some(rng) => rng.random_range(range),
            None => rand::rng().random_range(range),
        }
    }

    /// Counts for a preset, drawing from the world's RNG for `Random`
    pub fn scenario_counts(&mut self, scenario: Scenario) -> DirectionCounts {
        match &mut self.rng {
            Some(rng) => scenario.counts(rng),
            None => scenario.counts(&mut rand::rng()),
        }
    }

    fn spawn_max_speed(&mut self) -> f32 {
        let base = self.config.vehicle.max_speed;
        let spread = self.config.speed_variation.clamp(0.0, 0.9);
        if spread > 0.0 {
            base * (1.0 + self.random_range(-spread..=spread))
        } else {
            base
        }
    }

    /// Spawn the requested number of vehicles on each approach
    ///
    /// New vehicles queue up behind the entry edge at a fixed spacing, and behind
    /// whatever is already in the lane, so nothing spawns overlapping.
    pub fn spawn_vehicles(&mut self, request: &SpawnRequest) -> usize {
        let counts = *request.counts();
        let geometry = self.config.geometry;
        let spacing = self.config.spawn_spacing.max(self.config.vehicle.length);
        let params = self.config.vehicle;
        let mut spawned = 0;

        for (direction, count) in counts.iter() {
            if count == 0 {
                continue;
            }
            let rearmost = self
                .vehicles
                .iter()
                .filter(|v| v.direction == direction)
                .map(|v| v.progress())
                .fold(f32::INFINITY, f32::min);
            let first = (geometry.entry_progress(direction) - params.length).min(rearmost - spacing);

            for i in 0..count {
                let progress = first - i as f32 * spacing;
                let max_speed = self.spawn_max_speed();
                let vehicle = Vehicle::new(
                    direction,
                    geometry.lane_position(direction, progress),
                    &params,
                    max_speed,
                    self.time,
                );
                self.vehicles.push(vehicle);
                spawned += 1;
            }
        }

        self.stats.total_spawned += spawned as u32;
        info!(
            "Spawned {} vehicles ({}) at {}",
            spawned, counts, self.intersection_id
        );
        spawned
    }

    /// Index every lane by progress so each vehicle can find its leader
    fn lane_index(&self) -> LaneIndex {
        let mut lanes: LaneIndex = HashMap::new();
        for (idx, vehicle) in self.vehicles.iter().enumerate() {
            lanes
                .entry(vehicle.direction)
                .or_default()
                .insert(OrderedFloat(vehicle.progress()), idx);
        }
        lanes
    }

    fn find_leader(lanes: &LaneIndex, vehicle: &Vehicle) -> Option<Leader> {
        lanes.get(&vehicle.direction).and_then(|lane| {
            lane.range((
                Bound::Excluded(OrderedFloat(vehicle.progress())),
                Bound::Unbounded,
            ))
            .next()
            .map(|(progress, _)| Leader {
                progress: progress.into_inner(),
            })
        })
    }

    /// Advance the simulation by one step
    ///
    /// Leaders are looked up from positions captured before any vehicle moves,
    /// so the result does not depend on update order.
    pub fn tick(&mut self, delta_secs: f32) {
        self.time += delta_secs;

        let lanes = self.lane_index();
        let leaders: Vec<Option<Leader>> = self
            .vehicles
            .iter()
            .map(|v| Self::find_leader(&lanes, v))
            .collect();

        let geometry = self.config.geometry;
        let now = self.time;
        for (vehicle, leader) in self.vehicles.iter_mut().zip(leaders) {
            let signal = self.phase.color(vehicle.direction.axis());
            let result = vehicle.update(delta_secs, signal, leader, &geometry);

            if result == VehicleUpdateResult::Exited && vehicle.exited_at.is_none() {
                vehicle.exited_at = Some(now);
                self.stats.record_exit(vehicle.created_at, now);
                self.departures.record(vehicle.direction);
                debug!(
                    "Vehicle from {} exited after {:.2}s",
                    vehicle.direction,
                    now - vehicle.created_at
                );
            }
        }

        self.vehicles.retain(|v| v.exited_at.is_none());
    }

    /// Apply a phase snapshot received from the controller
    pub fn apply_snapshot(&mut self, snapshot: &PhaseSnapshot) {
        self.phase.apply(snapshot, self.time);
    }

    /// Clear all vehicles and, optionally, the statistics
    pub fn reset(&mut self, clear_stats: bool) {
        let removed = self.vehicles.len();
        self.vehicles.clear();
        self.departures.drain();
        if clear_stats {
            self.stats = SimulationStats::default();
        }
        info!(
            "Reset {}: removed {} vehicles{}",
            self.intersection_id,
            removed,
            if clear_stats { ", cleared stats" } else { "" }
        );
    }

    /// Show a different intersection; local traffic does not carry over
    pub fn switch_intersection(&mut self, intersection_id: &str) {
        self.intersection_id = intersection_id.to_string();
        self.reset(true);
    }

    pub fn estimate_queues(&self) -> DirectionCounts {
        sensors::estimate_queues(
            &self.vehicles,
            &self.config.geometry,
            self.config.queue_window,
        )
    }

    pub fn estimate_occupancy(&self) -> u32 {
        sensors::estimate_occupancy(&self.vehicles, &self.config.geometry)
    }

    /// Build a sensor report, consuming the departures counted since the last one
    pub fn sensor_report(&mut self) -> SensorReport {
        SensorReport {
            arrivals: self.estimate_queues(),
            departures: self.departures.drain(),
            occupancy: self.estimate_occupancy(),
        }
    }

    pub fn waiting_count(&self) -> usize {
        self.vehicles.iter().filter(|v| v.is_waiting()).count()
    }

    /// One-line status for periodic logging
    pub fn status_line(&self) -> String {
        format!(
            "[{}] t={:.1}s vehicles={} waiting={} {} | {}",
            self.intersection_id,
            self.time,
            self.vehicles.len(),
            self.waiting_count(),
            self.stats.summary(),
            self.phase.summary(self.time)
        )
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        println!("=== Intersection Summary ({}) ===", self.intersection_id);
        println!("Time: {:.2}s", self.time);
        println!("Signals: {}", self.phase.summary(self.time));
        println!(
            "Vehicles: {} active, {} waiting",
            self.vehicles.len(),
            self.waiting_count()
        );
        println!("Queues: {}", self.estimate_queues());
        println!("Occupancy: {}", self.estimate_occupancy());
        println!("Total spawned: {}", self.stats.total_spawned);
        println!("Total passed: {}", self.stats.total_passed);
        println!("Average wait: {:.2}s", self.stats.average_wait());
    }

    /// Draw a visual map of the intersection in the terminal
    pub fn draw_map(&self) {
        println!("{}", self.render_map());
    }

    /// The terminal map as text
    pub fn render_map(&self) -> String {
        const CELL: f32 = 20.0;
        let geometry = &self.config.geometry;
        let size = (geometry.extent / CELL).ceil() as usize;
        if size == 0 {
            return String::new();
        }
        let mut grid = vec![vec![' '; size]; size];

        let to_grid = |x: f32, y: f32| -> Option<(usize, usize)> {
            if x < 0.0 || y < 0.0 {
                return None;
            }
            let col = (x / CELL) as usize;
            let row = (y / CELL) as usize;
            (row < size && col < size).then_some((row, col))
        };

        // Lanes
        for direction in Direction::ALL {
            let entry = geometry.entry_progress(direction);
            let mut progress = entry;
            while progress < entry + geometry.extent {
                let pos = geometry.lane_position(direction, progress);
                if let Some((row, col)) = to_grid(pos.x, pos.y) {
                    grid[row][col] = '.';
                }
                progress += CELL / 2.0;
            }
        }

        // Intersection box
        for (row, line) in grid.iter_mut().enumerate() {
            for (col, cell) in line.iter_mut().enumerate() {
                let center = Position::new(
                    (col as f32 + 0.5) * CELL,
                    (row as f32 + 0.5) * CELL,
                );
                if geometry.contains(&center) {
                    *cell = '#';
                }
            }
        }

        // Signal heads
        for signal in [&self.phase.vertical, &self.phase.horizontal] {
            if let Some((row, col)) = to_grid(signal.position.x, signal.position.y) {
                grid[row][col] = signal.color.symbol();
            }
        }

        // Vehicles
        for vehicle in &self.vehicles {
            if let Some((row, col)) = to_grid(vehicle.position.x, vehicle.position.y) {
                grid[row][col] = if vehicle.stopped {
                    'o'
                } else {
                    match vehicle.direction {
                        Direction::North => 'v',
                        Direction::South => '^',
                        Direction::East => '<',
                        Direction::West => '>',
                    }
                };
            }
        }

        let mut out = String::from("\n=== Intersection Map ===\n");
        out.push_str(
            "Legend: #=Intersection, .=Lane, v ^ < >=Vehicle heading, o=Stopped at line, G Y R=Signal\n",
        );
        out.push_str(&format!(
            "Vertical: {}  Horizontal: {}\n\n",
            self.phase.vertical.color, self.phase.horizontal.color
        ));
        for row in &grid {
            out.extend(row.iter());
            out.push('\n');
        }
        out
    }
}
