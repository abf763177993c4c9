//! Pure scoring over a belief snapshot.
//!
//! Every utility is reward per second of travel. Scores never touch the
//! belief set directly; callers hand in the grid, the occupancy set, and
//! the timing parameters so the functions stay deterministic and testable.

use std::collections::{HashMap, HashSet};

use courier_nav::{path_cost, GridMap};
use courier_proto::{Agent, AgentId, Parcel, Point};

use crate::desire::TourStop;

/// Shared inputs for the scoring functions.
pub struct UtilityContext<'a> {
    pub grid: &'a GridMap,
    pub blocked: &'a HashSet<Point>,
    pub delivery_zones: &'a [Point],
    /// Milliseconds per primitive move.
    pub movement_ms: u64,
    /// Milliseconds per one-unit reward decay; `None` disables decay.
    pub decay_ms: Option<u64>,
}

impl UtilityContext<'_> {
    fn travel_ms(&self, cost: u32) -> u64 {
        u64::from(cost) * self.movement_ms
    }

    fn decays_during(&self, ms: u64) -> i64 {
        match self.decay_ms {
            Some(interval) if interval > 0 => ms.div_ceil(interval) as i64,
            _ => 0,
        }
    }
}

fn seconds(ms: u64) -> f64 {
    ms as f64 / 1_000.0
}

/// The cheapest reachable delivery zone from `from`, with its A* cost.
pub fn closest_delivery(ctx: &UtilityContext<'_>, from: Point) -> Option<(Point, u32)> {
    ctx.delivery_zones
        .iter()
        .filter_map(|&zone| path_cost(ctx.grid, ctx.blocked, from, zone).map(|cost| (zone, cost)))
        .min_by_key(|&(_, cost)| cost)
}

/// Score for picking up `parcel` from `from` and delivering it, accounting
/// for reward decay on both the carried load and the target, and for the
/// risk of a competitor reaching the parcel first.
///
/// `NEG_INFINITY` when pickup or delivery is unreachable.
pub fn parcel_utility(
    ctx: &UtilityContext<'_>,
    from: Point,
    parcel: &Parcel,
    carried_reward: i32,
    carried_count: usize,
    others: &[Agent],
) -> f64 {
    let target = parcel.position();
    let Some(pick_cost) = path_cost(ctx.grid, ctx.blocked, from, target) else {
        return f64::NEG_INFINITY;
    };
    let Some((_, delivery_cost)) = closest_delivery(ctx, target) else {
        return f64::NEG_INFINITY;
    };

    let t_pick = ctx.travel_ms(pick_cost);
    let t_del = ctx.travel_ms(delivery_cost);
    let decays_until_pickup = ctx.decays_during(t_pick);
    let decays_until_delivery = ctx.decays_during(t_del);

    let n = carried_count as i64;
    let carried_final = (i64::from(carried_reward)
        - decays_until_pickup * n
        - decays_until_delivery * (n + 1))
        .max(0);

    let threat = parcel_threat(ctx, target, parcel.reward, others);
    let target_final = (f64::from(parcel.reward)
        - decays_until_pickup as f64
        - threat
        - (decays_until_delivery * (n + 1)) as f64)
        .max(0.0);

    let total_ms = t_pick + t_del;
    if total_ms == 0 {
        return 0.0;
    }
    (carried_final as f64 + target_final) / seconds(total_ms)
}

/// Score for carrying the current load to the nearest delivery zone.
/// `NEG_INFINITY` when no delivery zone is reachable.
pub fn delivery_utility(
    ctx: &UtilityContext<'_>,
    from: Point,
    carried_reward: i32,
    carried_count: usize,
) -> f64 {
    let Some((_, cost)) = closest_delivery(ctx, from) else {
        return f64::NEG_INFINITY;
    };
    let t = ctx.travel_ms(cost);
    let n = carried_count as i64;
    let final_reward = (i64::from(carried_reward) - ctx.decays_during(t) * n).max(0);
    if t == 0 {
        // Already standing on the zone.
        return if final_reward > 0 { f64::INFINITY } else { 0.0 };
    }
    final_reward as f64 / seconds(t)
}

/// Adversarial pressure on a parcel from competing agents.
///
/// Each competitor at A* distance `d >= 1` contributes `reward / d^2`,
/// weighted 30% as baseline proximity and up to 70% more when its decoded
/// motion points toward the parcel.
pub fn parcel_threat(
    ctx: &UtilityContext<'_>,
    parcel_position: Point,
    reward: i32,
    others: &[Agent],
) -> f64 {
    let mut threat = 0.0;
    for agent in others {
        // Floor rather than round: a competitor mid-step toward the parcel
        // must still count as approaching, not as already on it.
        let tile = Point::new(agent.x.floor() as i32, agent.y.floor() as i32);
        let Some(d) = path_cost(ctx.grid, ctx.blocked, tile, parcel_position) else {
            continue;
        };
        if d < 1 {
            continue;
        }
        let proximity = f64::from(reward) / f64::from(d * d);
        threat += proximity * 0.3;

        if agent.is_moving() {
            let (vx, vy) = agent.movement_direction();
            let wx = f64::from(parcel_position.x) - agent.x;
            let wy = f64::from(parcel_position.y) - agent.y;
            let k = f64::from(vx) * wx + f64::from(vy) * wy;
            let norm = (wx * wx + wy * wy).sqrt();
            if k > 0.0 && norm > 0.0 {
                threat += proximity * 0.7 * k / norm;
            }
        }
    }
    threat
}

/// Score an ordered pickup/delivery stop sequence by the same discounted
/// model: total delivered reward per millisecond. `NEG_INFINITY` when any
/// leg is unreachable.
pub fn tour_utility(
    ctx: &UtilityContext<'_>,
    from: Point,
    stops: &[TourStop],
    carried_reward: i32,
    carried_count: usize,
) -> f64 {
    let mut at = from;
    let mut t_ms: u64 = 0;
    let mut elapsed_decays: i64 = 0;
    let mut load = f64::from(carried_reward);
    let mut count = carried_count as i64;
    let mut delivered = 0.0;

    for stop in stops {
        let Some(cost) = path_cost(ctx.grid, ctx.blocked, at, stop.position()) else {
            return f64::NEG_INFINITY;
        };
        let leg_ms = ctx.travel_ms(cost);
        let leg_decays = ctx.decays_during(leg_ms);
        t_ms += leg_ms;
        elapsed_decays += leg_decays;
        load = (load - (leg_decays * count) as f64).max(0.0);
        at = stop.position();

        match stop {
            TourStop::Pickup { reward, .. } => {
                load += (f64::from(*reward) - elapsed_decays as f64).max(0.0);
                count += 1;
            }
            TourStop::Delivery { .. } => {
                delivered += load;
                load = 0.0;
                count = 0;
            }
        }
    }

    if t_ms == 0 {
        return 0.0;
    }
    delivered / seconds(t_ms)
}

/// Two-phase assignment of parcel generators to agents.
///
/// Phase one is a Voronoi sweep by A* distance (ties go to the earlier
/// agent in lexicographic id order). Phase two rebalances to capacity
/// `|G| / N` (the first `|G| mod N` agents taking one extra) by repeatedly
/// moving the generator with the smallest `new_dist - current_dist` regret
/// from an overloaded agent to an underloaded one.
pub fn partition(grid: &GridMap, agents: &[(AgentId, Point)]) -> HashMap<Point, AgentId> {
    let generators = grid.generators();
    let mut assignments: HashMap<Point, AgentId> = HashMap::new();
    if agents.is_empty() || generators.is_empty() {
        return assignments;
    }

    let mut agents: Vec<(AgentId, Point)> = agents.to_vec();
    agents.sort_by(|a, b| a.0.cmp(&b.0));
    agents.dedup_by(|a, b| a.0 == b.0);

    const UNREACHABLE: i64 = u32::MAX as i64;
    let empty = HashSet::new();
    let dist = |agent_pos: Point, generator: Point| -> i64 {
        path_cost(grid, &empty, agent_pos, generator)
            .map(i64::from)
            .unwrap_or(UNREACHABLE)
    };

    // Phase 1: Voronoi by A* distance.
    let mut owner_of: Vec<usize> = Vec::with_capacity(generators.len());
    for &generator in &generators {
        let mut best = 0usize;
        let mut best_dist = dist(agents[0].1, generator);
        for (i, (_, pos)) in agents.iter().enumerate().skip(1) {
            let d = dist(*pos, generator);
            if d < best_dist {
                best = i;
                best_dist = d;
            }
        }
        owner_of.push(best);
    }

    // Phase 2: capacity rebalancing.
    let base = generators.len() / agents.len();
    let extra = generators.len() % agents.len();
    let capacity: Vec<usize> = (0..agents.len())
        .map(|i| base + usize::from(i < extra))
        .collect();

    loop {
        let mut counts = vec![0usize; agents.len()];
        for &owner in &owner_of {
            counts[owner] += 1;
        }
        let overloaded: Vec<usize> = (0..agents.len())
            .filter(|&i| counts[i] > capacity[i])
            .collect();
        let underloaded: Vec<usize> = (0..agents.len())
            .filter(|&i| counts[i] < capacity[i])
            .collect();
        if overloaded.is_empty() || underloaded.is_empty() {
            break;
        }

        // Cheapest single reassignment across every (generator, taker) pair.
        let mut best: Option<(i64, usize, usize)> = None;
        for (gi, &generator) in generators.iter().enumerate() {
            let owner = owner_of[gi];
            if !overloaded.contains(&owner) {
                continue;
            }
            let current = dist(agents[owner].1, generator);
            for &taker in &underloaded {
                let new = dist(agents[taker].1, generator);
                if new >= UNREACHABLE {
                    continue;
                }
                let regret = new - current;
                if best.map_or(true, |(r, ..)| regret < r) {
                    best = Some((regret, gi, taker));
                }
            }
        }

        match best {
            Some((_, gi, taker)) => owner_of[gi] = taker,
            None => break,
        }
    }

    for (gi, &generator) in generators.iter().enumerate() {
        assignments.insert(generator, agents[owner_of[gi]].0.clone());
    }
    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_nav::TileType;

    fn open_grid(width: u32, height: u32) -> GridMap {
        GridMap::new(
            width,
            height,
            vec![TileType::Walkable; (width * height) as usize],
        )
    }

    fn agent(id: &str, x: f64, y: f64) -> Agent {
        Agent {
            id: id.into(),
            name: id.into(),
            x,
            y,
            score: 0.0,
            penalty: None,
        }
    }

    fn parcel(id: &str, x: i32, y: i32, reward: i32) -> Parcel {
        Parcel {
            id: id.into(),
            x,
            y,
            reward,
            carried_by: None,
        }
    }

    fn ctx<'a>(
        grid: &'a GridMap,
        blocked: &'a HashSet<Point>,
        zones: &'a [Point],
    ) -> UtilityContext<'a> {
        UtilityContext {
            grid,
            blocked,
            delivery_zones: zones,
            movement_ms: 100,
            decay_ms: Some(1_000),
        }
    }

    #[test]
    fn unreachable_parcel_scores_negative_infinity() {
        // Wall between start and parcel.
        let mut tiles = vec![TileType::Walkable; 9];
        for y in 0..3 {
            tiles[(y * 3 + 1) as usize] = TileType::NonWalkable;
        }
        let grid = GridMap::new(3, 3, tiles);
        let blocked = HashSet::new();
        let zones = [Point::new(0, 2)];
        let ctx = ctx(&grid, &blocked, &zones);

        let score = parcel_utility(&ctx, Point::new(0, 0), &parcel("p", 2, 0, 10), 0, 0, &[]);
        assert_eq!(score, f64::NEG_INFINITY);
    }

    #[test]
    fn unreachable_delivery_scores_negative_infinity() {
        let grid = open_grid(3, 1);
        let blocked = HashSet::new();
        let zones: [Point; 0] = [];
        let ctx = ctx(&grid, &blocked, &zones);

        assert_eq!(
            delivery_utility(&ctx, Point::new(0, 0), 10, 1),
            f64::NEG_INFINITY
        );
        assert_eq!(
            parcel_utility(&ctx, Point::new(0, 0), &parcel("p", 2, 0, 10), 0, 0, &[]),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn closer_parcels_score_higher() {
        let grid = open_grid(7, 1);
        let blocked = HashSet::new();
        let zones = [Point::new(0, 0)];
        let ctx = ctx(&grid, &blocked, &zones);
        let from = Point::new(0, 0);

        let near = parcel_utility(&ctx, from, &parcel("a", 1, 0, 10), 0, 0, &[]);
        let far = parcel_utility(&ctx, from, &parcel("b", 4, 0, 10), 0, 0, &[]);
        assert!(near > far);
        assert!(near > 0.0);
    }

    #[test]
    fn delivery_utility_discounts_carried_decay() {
        let grid = open_grid(11, 1);
        let blocked = HashSet::new();
        let zones = [Point::new(10, 0)];
        let mut ctx = ctx(&grid, &blocked, &zones);
        ctx.movement_ms = 1_000;

        // Ten moves at 1s each with 1s decay: two carried parcels lose 10
        // units apiece, delivered over ten seconds.
        let score = delivery_utility(&ctx, Point::new(0, 0), 30, 2);
        let expected = (30.0 - 20.0) / 10.0;
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn standing_on_delivery_with_load_is_infinite() {
        let grid = open_grid(3, 1);
        let blocked = HashSet::new();
        let zones = [Point::new(0, 0)];
        let ctx = ctx(&grid, &blocked, &zones);
        assert_eq!(delivery_utility(&ctx, Point::new(0, 0), 5, 1), f64::INFINITY);
        assert_eq!(delivery_utility(&ctx, Point::new(0, 0), 0, 0), 0.0);
    }

    #[test]
    fn approaching_competitor_raises_threat() {
        let grid = open_grid(5, 5);
        let blocked = HashSet::new();
        let zones = [Point::new(4, 4)];
        let ctx = ctx(&grid, &blocked, &zones);
        let target = Point::new(2, 2);

        let idle = agent("r", 1.0, 2.0);
        let baseline = parcel_threat(&ctx, target, 5, &[idle]);
        // d = 1, proximity = 5: baseline share is 1.5.
        assert!((baseline - 1.5).abs() < 1e-9);

        // Same competitor mid-step toward the parcel.
        let charging = agent("r", 1.6, 2.0);
        let threat = parcel_threat(&ctx, target, 5, &[charging]);
        assert!(threat > baseline);
    }

    #[test]
    fn threat_can_zero_out_a_parcel() {
        // Scenario S3: 3x3 open grid, low-value parcel, competitor closing
        // in. The target term must collapse to zero, leaving a score that
        // cannot beat a safe option.
        let grid = open_grid(3, 3);
        let blocked = HashSet::new();
        let zones = [Point::new(0, 0)];
        let ctx = ctx(&grid, &blocked, &zones);
        let target = parcel("p", 2, 2, 5);

        let rival = agent("r", 1.6, 2.0);
        let threat = parcel_threat(&ctx, target.position(), 5, &[rival.clone()]);
        assert!(threat > 5.0 - 1.0);

        let safe_floor = parcel_utility(&ctx, Point::new(0, 2), &target, 0, 0, &[]);
        let threatened = parcel_utility(&ctx, Point::new(0, 2), &target, 0, 0, &[rival]);
        assert!(threatened < safe_floor);
    }

    #[test]
    fn partition_splits_generators_by_distance() {
        // Scenario S4: generators at opposite corners, one agent near each.
        let mut tiles = vec![TileType::Walkable; 100];
        tiles[0] = TileType::ParcelGenerator;
        tiles[99] = TileType::ParcelGenerator;
        let grid = GridMap::new(10, 10, tiles);

        let assignments = partition(
            &grid,
            &[
                ("A".to_string(), Point::new(0, 1)),
                ("B".to_string(), Point::new(9, 8)),
            ],
        );
        assert_eq!(assignments.get(&Point::new(0, 0)), Some(&"A".to_string()));
        assert_eq!(assignments.get(&Point::new(9, 9)), Some(&"B".to_string()));
    }

    #[test]
    fn partition_rebalances_ties_deterministically() {
        // Both agents on the same tile: Voronoi gives everything to the
        // lexicographically first agent, rebalancing hands one generator to
        // the other.
        let mut tiles = vec![TileType::Walkable; 100];
        tiles[0] = TileType::ParcelGenerator;
        tiles[99] = TileType::ParcelGenerator;
        let grid = GridMap::new(10, 10, tiles);

        let agents = [
            ("A".to_string(), Point::new(0, 0)),
            ("B".to_string(), Point::new(0, 0)),
        ];
        let assignments = partition(&grid, &agents);
        let owners: HashSet<&AgentId> = assignments.values().collect();
        assert_eq!(assignments.len(), 2);
        assert_eq!(owners.len(), 2);

        // Determinism: same input, same output.
        assert_eq!(partition(&grid, &agents), assignments);
    }

    #[test]
    fn partition_covers_every_generator() {
        let mut tiles = vec![TileType::Walkable; 25];
        for idx in [0usize, 4, 12, 20, 24] {
            tiles[idx] = TileType::ParcelGenerator;
        }
        let grid = GridMap::new(5, 5, tiles);
        let assignments = partition(
            &grid,
            &[
                ("A".to_string(), Point::new(1, 1)),
                ("B".to_string(), Point::new(3, 3)),
            ],
        );
        assert_eq!(assignments.len(), grid.generators().len());
        for generator in grid.generators() {
            let owner = assignments.get(&generator).expect("generator assigned");
            assert!(owner == "A" || owner == "B");
        }
        // Capacity: 5 generators over 2 agents splits 3/2 (first id takes
        // the extra).
        let a_count = assignments.values().filter(|o| **o == "A").count();
        let b_count = assignments.values().filter(|o| **o == "B").count();
        assert_eq!(a_count, 3);
        assert_eq!(b_count, 2);
    }

    #[test]
    fn tour_scores_pickup_then_delivery() {
        let grid = open_grid(5, 1);
        let blocked = HashSet::new();
        let zones = [Point::new(4, 0)];
        let ctx = ctx(&grid, &blocked, &zones);

        let stops = [
            TourStop::Pickup {
                parcel_id: "p1".into(),
                position: Point::new(2, 0),
                reward: 10,
            },
            TourStop::Delivery {
                position: Point::new(4, 0),
            },
        ];
        let score = tour_utility(&ctx, Point::new(0, 0), &stops, 0, 0);
        // Each 200ms leg costs one (ceiled) decay: the parcel arrives at 8
        // after 0.4 seconds of travel.
        let expected = 8.0 / 0.4;
        assert!((score - expected).abs() < 1e-12);

        let unreachable = [TourStop::Delivery {
            position: Point::new(-1, 0),
        }];
        assert_eq!(
            tour_utility(&ctx, Point::new(0, 0), &unreachable, 0, 0),
            f64::NEG_INFINITY
        );
    }
}
