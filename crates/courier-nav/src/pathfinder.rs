//! A* over the grid with a dynamic occupancy set.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use courier_proto::{Direction, Point};

use crate::grid::GridMap;

/// How many Manhattan-ranked strategic pairs [`longest_path`] evaluates.
const PROBE_CANDIDATES: usize = 10;

/// A sequence of primitive moves and its cost (one per step).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub moves: Vec<Direction>,
    pub cost: u32,
}

impl Path {
    pub fn empty() -> Self {
        Self {
            moves: Vec::new(),
            cost: 0,
        }
    }
}

#[derive(Debug)]
struct OpenNode {
    f: u32,
    g: u32,
    point: Point,
    tie: u64,
}

impl OpenNode {
    fn key(&self) -> (u32, u32, Point, u64) {
        (self.f, self.g, self.point, self.tie)
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap behave like a min-heap; the
        // insertion counter breaks ties deterministically.
        other.key().cmp(&self.key())
    }
}

// Fixed expansion order for determinism.
const NEIGHBOUR_ORDER: [Direction; 4] = [
    Direction::Up,
    Direction::Right,
    Direction::Down,
    Direction::Left,
];

/// Shortest path from `start` to `goal`, avoiding non-walkable tiles and the
/// dynamic `blocked` set. `None` when no path exists or a precondition fails
/// (start or goal non-walkable or blocked). `start == goal` yields the empty
/// path.
pub fn find_path(
    grid: &GridMap,
    blocked: &HashSet<Point>,
    start: Point,
    goal: Point,
) -> Option<Path> {
    let passable = |p: Point| grid.is_walkable(p) && !blocked.contains(&p);
    if !passable(start) || !passable(goal) {
        return None;
    }
    if start == goal {
        return Some(Path::empty());
    }

    let len = (grid.width() * grid.height()) as usize;
    let idx = |p: Point| (p.y * grid.width() + p.x) as usize;

    let mut open = BinaryHeap::<OpenNode>::new();
    let mut tie: u64 = 0;
    let mut g_score = vec![u32::MAX; len];
    let mut came_from: Vec<Option<Point>> = vec![None; len];

    g_score[idx(start)] = 0;
    open.push(OpenNode {
        f: start.manhattan(goal),
        g: 0,
        point: start,
        tie,
    });
    tie += 1;

    while let Some(node) = open.pop() {
        if node.point == goal {
            return Some(reconstruct(&came_from, idx, start, goal));
        }
        if node.g != g_score[idx(node.point)] {
            // Stale heap entry.
            continue;
        }

        for direction in NEIGHBOUR_ORDER {
            let next = node.point.step(direction);
            if !passable(next) {
                continue;
            }

            let tentative_g = node.g.saturating_add(1);
            let next_idx = idx(next);
            if tentative_g >= g_score[next_idx] {
                continue;
            }

            came_from[next_idx] = Some(node.point);
            g_score[next_idx] = tentative_g;
            open.push(OpenNode {
                f: tentative_g.saturating_add(next.manhattan(goal)),
                g: tentative_g,
                point: next,
                tie,
            });
            tie += 1;
        }
    }

    None
}

fn reconstruct(
    came_from: &[Option<Point>],
    idx: impl Fn(Point) -> usize,
    start: Point,
    goal: Point,
) -> Path {
    let mut points = vec![goal];
    let mut current = goal;
    while current != start {
        let Some(prev) = came_from[idx(current)] else {
            break;
        };
        current = prev;
        points.push(current);
    }
    points.reverse();

    let moves: Vec<Direction> = points
        .windows(2)
        .filter_map(|w| Direction::between(w[0], w[1]))
        .collect();
    let cost = moves.len() as u32;
    Path { moves, cost }
}

/// Path cost only; avoids keeping the move list alive.
pub fn path_cost(
    grid: &GridMap,
    blocked: &HashSet<Point>,
    start: Point,
    goal: Point,
) -> Option<u32> {
    find_path(grid, blocked, start, goal).map(|p| p.cost)
}

/// The maximal shortest-path cost between any two strategic points
/// (generators and delivery zones), used to size occupancy forgetting.
///
/// Evaluating A* on every pair is wasteful on big maps; pairs are pre-ranked
/// by Manhattan distance and only the top [`PROBE_CANDIDATES`] are probed.
pub fn longest_path(grid: &GridMap) -> u32 {
    let mut strategic = grid.generators();
    strategic.extend(grid.delivery_zones());
    strategic.sort();
    strategic.dedup();

    let mut pairs: Vec<(u32, Point, Point)> = Vec::new();
    for (i, &a) in strategic.iter().enumerate() {
        for &b in &strategic[i + 1..] {
            pairs.push((a.manhattan(b), a, b));
        }
    }
    pairs.sort_by(|l, r| r.0.cmp(&l.0).then_with(|| (l.1, l.2).cmp(&(r.1, r.2))));

    let empty = HashSet::new();
    pairs
        .iter()
        .take(PROBE_CANDIDATES)
        .filter_map(|&(_, a, b)| path_cost(grid, &empty, a, b))
        .max()
        .unwrap_or(0)
}
