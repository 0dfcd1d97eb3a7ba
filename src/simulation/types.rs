//! Core types for the intersection simulation
//!
//! Plain data types shared by the vehicle model, the engine and the sync layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// A 2D position in world units (screen space, y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Approach a vehicle arrives from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Enters at the top edge and travels down
    North,
    /// Enters at the bottom edge and travels up
    South,
    /// Enters at the right edge and travels left
    East,
    /// Enters at the left edge and travels right
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Which signal orientation governs this approach
    pub fn axis(self) -> Axis {
        match self {
            Direction::North | Direction::South => Axis::Vertical,
            Direction::East | Direction::West => Axis::Horizontal,
        }
    }

    /// +1 if travel increases the axis coordinate, -1 otherwise
    pub fn sign(self) -> f32 {
        match self {
            Direction::North | Direction::West => 1.0,
            Direction::South | Direction::East => -1.0,
        }
    }

    /// Unit heading vector of travel
    pub fn heading(self) -> (f32, f32) {
        match self {
            Direction::North => (0.0, 1.0),
            Direction::South => (0.0, -1.0),
            Direction::East => (-1.0, 0.0),
            Direction::West => (1.0, 0.0),
        }
    }

    /// Signed progress along the direction of travel; larger is further ahead
    pub fn progress(self, position: &Position) -> f32 {
        match self.axis() {
            Axis::Vertical => self.sign() * position.y,
            Axis::Horizontal => self.sign() * position.x,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Signal orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Vertical,
    Horizontal,
}

/// Phase group the controller can be asked to prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseGroup {
    #[serde(rename = "NS")]
    NorthSouth,
    #[serde(rename = "EW")]
    EastWest,
}

impl PhaseGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseGroup::NorthSouth => "NS",
            PhaseGroup::EastWest => "EW",
        }
    }
}

impl fmt::Display for PhaseGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A count per approach direction
///
/// Used for spawn requests, queue estimates, and the arrival/departure fields of
/// the sensor report. Serializes as `{north, south, east, west}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectionCounts {
    #[serde(default)]
    pub north: u32,
    #[serde(default)]
    pub south: u32,
    #[serde(default)]
    pub east: u32,
    #[serde(default)]
    pub west: u32,
}

impl DirectionCounts {
    pub fn new(north: u32, south: u32, east: u32, west: u32) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    pub fn total(&self) -> u32 {
        self.north + self.south + self.east + self.west
    }

    pub fn north_south(&self) -> u32 {
        self.north + self.south
    }

    pub fn east_west(&self) -> u32 {
        self.east + self.west
    }

    /// The axis with strictly more demand, if any
    pub fn preferred_phase(&self) -> Option<PhaseGroup> {
        let ns = self.north_south();
        let ew = self.east_west();
        if ew > ns {
            Some(PhaseGroup::EastWest)
        } else if ns > ew {
            Some(PhaseGroup::NorthSouth)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, u32)> + '_ {
        Direction::ALL.into_iter().map(move |d| (d, self[d]))
    }
}

impl Index<Direction> for DirectionCounts {
    type Output = u32;

    fn index(&self, direction: Direction) -> &u32 {
        match direction {
            Direction::North => &self.north,
            Direction::South => &self.south,
            Direction::East => &self.east,
            Direction::West => &self.west,
        }
    }
}

impl IndexMut<Direction> for DirectionCounts {
    fn index_mut(&mut self, direction: Direction) -> &mut u32 {
        match direction {
            Direction::North => &mut self.north,
            Direction::South => &mut self.south,
            Direction::East => &mut self.east,
            Direction::West => &mut self.west,
        }
    }
}

impl fmt::Display for DirectionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N={} S={} E={} W={}",
            self.north, self.south, self.east, self.west
        )
    }
}

/// Reasons a spawn request is refused before it reaches the engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    #[error("count for {direction} is not a number: '{value}'")]
    NotANumber { direction: Direction, value: String },

    #[error("count for {direction} is negative: {value}")]
    Negative { direction: Direction, value: i64 },

    #[error("expected 4 counts (north south east west), got {0}")]
    WrongArity(usize),
}

/// A validated request to spawn vehicles per direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpawnRequest(pub DirectionCounts);

impl SpawnRequest {
    /// Validate raw operator fields in north, south, east, west order.
    ///
    /// Every field is checked before anything is returned, so an invalid request
    /// never produces a partial spawn.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Result<Self, SpawnError> {
        if fields.len() != 4 {
            return Err(SpawnError::WrongArity(fields.len()));
        }
        let mut counts = DirectionCounts::default();
        for (direction, raw) in Direction::ALL.into_iter().zip(fields) {
            let raw = raw.as_ref().trim();
            let value: i64 = raw.parse().map_err(|_| SpawnError::NotANumber {
                direction,
                value: raw.to_string(),
            })?;
            if value < 0 {
                return Err(SpawnError::Negative { direction, value });
            }
            counts[direction] = u32::try_from(value).map_err(|_| SpawnError::NotANumber {
                direction,
                value: raw.to_string(),
            })?;
        }
        Ok(Self(counts))
    }

    pub fn counts(&self) -> &DirectionCounts {
        &self.0
    }
}

impl FromStr for SpawnRequest {
    type Err = SpawnError;

    /// Parses `"5 4 8 6"` or `"5,4,8,6"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();
        Self::from_fields(&fields)
    }
}

impl From<DirectionCounts> for SpawnRequest {
    fn from(counts: DirectionCounts) -> Self {
        Self(counts)
    }
}

/// Speed below which a moving vehicle counts as waiting (units/s)
pub const WAITING_SPEED_THRESHOLD: f32 = 5.0;

/// Slack allowed when deciding whether a vehicle front has passed its stop line
pub const STOP_LINE_TOLERANCE: f32 = 0.5;
