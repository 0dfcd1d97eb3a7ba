//! Intersection geometry
//!
//! A single four-way intersection centered in a square world. Each approach has
//! one lane on the right-hand side of the center line and a stop line at the
//! edge of the intersection box.

use serde::Deserialize;

use super::types::{Axis, Direction, Position};

/// Layout of the visible world and the intersection at its center
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct IntersectionGeometry {
    /// Width and height of the visible world
    pub extent: f32,
    /// Side length of the intersection box
    pub box_size: f32,
    /// Lateral distance of each lane from the center line
    pub lane_offset: f32,
    /// How far past the exit edge a vehicle travels before it is retired
    pub exit_margin: f32,
}

impl Default for IntersectionGeometry {
    fn default() -> Self {
        Self {
            extent: 600.0,
            box_size: 120.0,
            lane_offset: 15.0,
            exit_margin: 50.0,
        }
    }
}

impl IntersectionGeometry {
    pub fn center(&self) -> Position {
        Position::new(self.extent / 2.0, self.extent / 2.0)
    }

    pub fn half_box(&self) -> f32 {
        self.box_size / 2.0
    }

    /// Progress value at which an approach's stop line sits
    pub fn stop_line_progress(&self, direction: Direction) -> f32 {
        direction.sign() * (self.extent / 2.0) - self.half_box()
    }

    /// Progress value of the edge a direction enters from
    pub fn entry_progress(&self, direction: Direction) -> f32 {
        if direction.sign() > 0.0 {
            0.0
        } else {
            -self.extent
        }
    }

    /// Progress value beyond which a vehicle is off the visible bounds
    pub fn exit_progress(&self, direction: Direction) -> f32 {
        self.entry_progress(direction) + self.extent + self.exit_margin
    }

    /// World position of a point on an approach lane
    pub fn lane_position(&self, direction: Direction, progress: f32) -> Position {
        let along = direction.sign() * progress;
        let center = self.extent / 2.0;
        match direction {
            Direction::North => Position::new(center - self.lane_offset, along),
            Direction::South => Position::new(center + self.lane_offset, along),
            Direction::East => Position::new(along, center - self.lane_offset),
            Direction::West => Position::new(along, center + self.lane_offset),
        }
    }

    /// Whether a point lies inside the intersection box
    pub fn contains(&self, position: &Position) -> bool {
        let center = self.center();
        let half = self.half_box();
        (position.x - center.x).abs() <= half && (position.y - center.y).abs() <= half
    }

    /// Where the signal head for an orientation is drawn
    pub fn signal_position(&self, axis: Axis) -> Position {
        let center = self.center();
        let half = self.half_box();
        match axis {
            Axis::Vertical => Position::new(center.x - half, center.y - half),
            Axis::Horizontal => Position::new(center.x + half, center.y + half),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_lines_sit_on_box_edges() {
        let geo = IntersectionGeometry::default();
        for direction in Direction::ALL {
            let stop = geo.lane_position(direction, geo.stop_line_progress(direction));
            let center = geo.center();
            let dist = match direction.axis() {
                Axis::Vertical => (stop.y - center.y).abs(),
                Axis::Horizontal => (stop.x - center.x).abs(),
            };
            assert!((dist - geo.half_box()).abs() < 1e-3, "{direction}");
            // Stop line lies ahead of the entry edge
            assert!(geo.stop_line_progress(direction) > geo.entry_progress(direction));
        }
    }

    #[test]
    fn test_lane_positions_round_trip_progress() {
        let geo = IntersectionGeometry::default();
        for direction in Direction::ALL {
            let pos = geo.lane_position(direction, geo.entry_progress(direction) + 42.0);
            assert!(
                (direction.progress(&pos) - geo.entry_progress(direction) - 42.0).abs() < 1e-3
            );
        }
    }

    #[test]
    fn test_contains_center_only() {
        let geo = IntersectionGeometry::default();
        assert!(geo.contains(&geo.center()));
        assert!(!geo.contains(&Position::new(0.0, 0.0)));
    }
}
