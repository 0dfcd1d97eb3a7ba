//! Throughput and wait-time statistics

use super::types::{Direction, DirectionCounts};

/// Counters accumulated as vehicles leave the simulation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationStats {
    /// Vehicles that made it through the intersection and off the map
    pub total_passed: u32,
    /// Sum of (exit time - spawn time) over exited vehicles, in seconds
    pub cumulative_wait: f32,
    pub exited: u32,
    /// Vehicles spawned since the last reset
    pub total_spawned: u32,
}

impl SimulationStats {
    /// Record a vehicle leaving the visible bounds
    pub fn record_exit(&mut self, created_at: f32, exited_at: f32) {
        self.total_passed += 1;
        self.exited += 1;
        self.cumulative_wait += (exited_at - created_at).max(0.0);
    }

    pub fn average_wait(&self) -> f32 {
        if self.exited == 0 {
            0.0
        } else {
            self.cumulative_wait / self.exited as f32
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "spawned={} passed={} avg_wait={:.2}s",
            self.total_spawned,
            self.total_passed,
            self.average_wait()
        )
    }
}

/// Per-direction exits not yet included in a sensor report
#[derive(Debug, Clone, Default)]
pub struct DepartureCounter {
    pending: DirectionCounts,
}

impl DepartureCounter {
    pub fn record(&mut self, direction: Direction) {
        self.pending[direction] += 1;
    }

    pub fn pending(&self) -> &DirectionCounts {
        &self.pending
    }

    /// Take the accumulated counts, leaving zeros behind
    pub fn drain(&mut self) -> DirectionCounts {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_wait_is_zero_before_any_exit() {
        let stats = SimulationStats::default();
        assert_eq!(stats.average_wait(), 0.0);
        assert_eq!(format!("{:.2}", stats.average_wait()), "0.00");
    }

    #[test]
    fn test_record_exit_accumulates() {
        let mut stats = SimulationStats::default();
        stats.record_exit(1.0, 5.0);
        stats.record_exit(2.0, 4.0);
        assert_eq!(stats.total_passed, 2);
        assert_eq!(stats.exited, 2);
        assert!((stats.average_wait() - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_departures_drain() {
        let mut departures = DepartureCounter::default();
        departures.record(Direction::East);
        departures.record(Direction::East);
        departures.record(Direction::North);
        let drained = departures.drain();
        assert_eq!(drained, DirectionCounts::new(1, 0, 2, 0));
        assert_eq!(departures.pending().total(), 0);
    }
}
