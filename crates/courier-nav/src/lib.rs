//! Grid model and pathfinding for the courier agents.

#![forbid(unsafe_code)]

pub mod grid;
pub mod pathfinder;

pub use grid::{GridMap, TileType};
pub use pathfinder::{find_path, longest_path, path_cost, Path};
