//! Core world entities: positions, moves, agents, parcels.

use serde::{Deserialize, Serialize};

/// Simulator-assigned agent identifier.
pub type AgentId = String;

/// Simulator-assigned parcel identifier.
pub type ParcelId = String;

/// An integer tile coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Point) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn step(self, direction: Direction) -> Point {
        let (dx, dy) = direction.delta();
        Point::new(self.x + dx, self.y + dy)
    }

    /// The `"x,y"` key used by occupancy and partitioning maps on the wire.
    pub fn key(self) -> String {
        format!("{},{}", self.x, self.y)
    }

    /// Parse a `"x,y"` key back into a point.
    pub fn from_key(key: &str) -> Option<Point> {
        let (x, y) = key.split_once(',')?;
        Some(Point::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A primitive move. `Up` increases `y`, `Right` increases `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// The move that takes `from` to an adjacent `to`, if they are adjacent.
    pub fn between(from: Point, to: Point) -> Option<Direction> {
        match (to.x - from.x, to.y - from.y) {
            (0, 1) => Some(Direction::Up),
            (0, -1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            (1, 0) => Some(Direction::Right),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

/// A sensed agent (self, teammate, or competitor).
///
/// Positions are fractional while a move is in progress: `x % 1 != 0` (or
/// `y % 1 != 0`) means the agent is mid-step, and the fractional part encodes
/// the direction of travel (`> 0.5` toward `+1`, `< 0.5` toward `-1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub score: f64,
    /// Observed on the wire but carries no known semantics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty: Option<f64>,
}

impl Agent {
    /// The tile the agent occupies (or is about to occupy), by rounding.
    pub fn tile(&self) -> Point {
        Point::new(self.x.round() as i32, self.y.round() as i32)
    }

    /// True iff a move is in progress.
    pub fn is_moving(&self) -> bool {
        self.x.fract() != 0.0 || self.y.fract() != 0.0
    }

    /// Direction of travel decoded from the fractional part polarity, as a
    /// `(dx, dy)` unit-ish vector. `(0, 0)` when stationary.
    pub fn movement_direction(&self) -> (i32, i32) {
        (axis_direction(self.x), axis_direction(self.y))
    }
}

fn axis_direction(v: f64) -> i32 {
    let fract = v - v.floor();
    if fract == 0.0 {
        0
    } else if fract > 0.5 {
        1
    } else {
        -1
    }
}

/// A sensed parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub id: ParcelId,
    pub x: i32,
    pub y: i32,
    pub reward: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carried_by: Option<AgentId>,
}

impl Parcel {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}
