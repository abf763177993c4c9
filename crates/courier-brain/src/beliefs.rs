//! The fused world model.
//!
//! Beliefs reconcile fresh sensor data with stale memory: parcels that left
//! the observation radius are kept as `outdated` with a frozen reward that
//! decays lazily on read, tiles hosting other agents are remembered for a
//! bounded window, and the carried inventory mirrors what the actuator
//! reported.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use courier_nav::{longest_path, GridMap, TileType};
use courier_proto::{Agent, AgentId, GameConfig, MapTile, Parcel, ParcelId, Point};
use tracing::debug;

/// Millisecond clock injected for testability.
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time source.
#[derive(Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A hand-driven clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn set(&self, ms: u64) {
        self.0.store(ms, Ordering::Relaxed);
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::Relaxed);
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A parcel with staleness bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedParcel {
    pub parcel: Parcel,
    /// True when the parcel left the observation radius without evidence of
    /// removal.
    pub outdated: bool,
    pub last_seen: u64,
    pub last_seen_reward: i32,
}

impl ExtendedParcel {
    fn fresh(parcel: Parcel, now: u64) -> Self {
        let reward = parcel.reward;
        Self {
            parcel,
            outdated: false,
            last_seen: now,
            last_seen_reward: reward,
        }
    }

    /// Reward after lazy decay: one unit lost per elapsed decay interval
    /// since the last sighting, floored at zero.
    pub fn decayed_reward(&self, now: u64, decay_ms: Option<u64>) -> i32 {
        match decay_ms {
            Some(interval) if interval > 0 => {
                let elapsed = now.saturating_sub(self.last_seen);
                let decays = (elapsed / interval) as i64;
                (self.last_seen_reward as i64 - decays).max(0) as i32
            }
            _ => self.last_seen_reward,
        }
    }
}

/// Another agent and when it was last sensed.
#[derive(Debug, Clone, PartialEq)]
pub struct SeenAgent {
    pub agent: Agent,
    pub last_seen: u64,
}

/// The agent's complete world model. Mutated only by the driver (sensor
/// callbacks and plan hooks); readers observe a consistent snapshot between
/// suspension points.
pub struct BeliefSet {
    clock: Arc<dyn TimeSource>,
    config: GameConfig,

    me: Option<Agent>,
    teammate: Option<Agent>,
    teammate_id: Option<AgentId>,

    grid: Option<GridMap>,
    delivery_zones: Vec<Point>,
    generators: Vec<Point>,
    longest_path: u32,

    parcels: HashMap<ParcelId, ExtendedParcel>,
    active_parcel_positions: HashSet<Point>,

    other_agents: HashMap<AgentId, SeenAgent>,
    occupied: HashMap<Point, u64>,

    carrying: Vec<ParcelId>,

    partitioning: Option<HashMap<Point, AgentId>>,
}

impl BeliefSet {
    pub fn new(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            clock,
            config: GameConfig::default(),
            me: None,
            teammate: None,
            teammate_id: None,
            grid: None,
            delivery_zones: Vec::new(),
            generators: Vec::new(),
            longest_path: 0,
            parcels: HashMap::new(),
            active_parcel_positions: HashSet::new(),
            other_agents: HashMap::new(),
            occupied: HashMap::new(),
            carrying: Vec::new(),
            partitioning: None,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    // --- self and teammate -------------------------------------------------

    pub fn update_from_you(&mut self, agent: Agent) {
        self.me = Some(agent);
    }

    pub fn me(&self) -> Option<&Agent> {
        self.me.as_ref()
    }

    pub fn my_id(&self) -> Option<&AgentId> {
        self.me.as_ref().map(|a| &a.id)
    }

    pub fn my_tile(&self) -> Option<Point> {
        self.me.as_ref().map(Agent::tile)
    }

    pub fn set_teammate(&mut self, agent: Agent) {
        self.set_teammate_id(agent.id.clone());
        self.teammate = Some(agent);
    }

    /// Record who the teammate is before its full record is known.
    pub fn set_teammate_id(&mut self, id: AgentId) {
        // The teammate is not a competitor; drop any record of it.
        self.other_agents.remove(&id);
        self.teammate_id = Some(id);
    }

    pub fn teammate(&self) -> Option<&Agent> {
        self.teammate.as_ref()
    }

    pub fn teammate_id(&self) -> Option<&AgentId> {
        self.teammate_id.as_ref()
    }

    // --- map ---------------------------------------------------------------

    pub fn update_from_map(&mut self, width: u32, height: u32, tiles: &[MapTile]) {
        let grid = GridMap::from_wire(width, height, tiles);
        self.delivery_zones = grid.delivery_zones();
        self.generators = grid.generators();
        self.longest_path = longest_path(&grid);
        debug!(
            width,
            height,
            deliveries = self.delivery_zones.len(),
            generators = self.generators.len(),
            longest_path = self.longest_path,
            "map loaded"
        );
        self.grid = Some(grid);
    }

    pub fn grid(&self) -> Option<&GridMap> {
        self.grid.as_ref()
    }

    pub fn delivery_zones(&self) -> &[Point] {
        &self.delivery_zones
    }

    pub fn generators(&self) -> &[Point] {
        &self.generators
    }

    pub fn longest_path(&self) -> u32 {
        self.longest_path
    }

    pub fn standing_on(&self, wanted: TileType) -> bool {
        match (self.my_tile(), self.grid.as_ref()) {
            (Some(tile), Some(grid)) => grid.tile(tile) == wanted,
            _ => false,
        }
    }

    // --- config ------------------------------------------------------------

    pub fn update_from_config(&mut self, config: GameConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    // --- parcels -----------------------------------------------------------

    /// Reconcile the parcel set against a fresh sensing.
    ///
    /// Sensed parcels are stored live. A previously known parcel missing
    /// from the sensing is removed when its position is demonstrably visible
    /// (some parcel is reported there), and marked `outdated` with a frozen
    /// reward otherwise.
    pub fn update_from_parcels(&mut self, sensed: Vec<Parcel>) {
        let now = self.now_ms();
        let sensed_ids: HashSet<ParcelId> = sensed.iter().map(|p| p.id.clone()).collect();
        let sensed_positions: HashSet<Point> = sensed.iter().map(Parcel::position).collect();

        for parcel in sensed {
            if let (Some(me), Some(carrier)) = (self.me.as_ref(), parcel.carried_by.as_ref()) {
                if *carrier == me.id && !self.carrying.contains(&parcel.id) {
                    self.carrying.push(parcel.id.clone());
                }
            }
            self.parcels
                .insert(parcel.id.clone(), ExtendedParcel::fresh(parcel, now));
        }

        let mut removed = Vec::new();
        for (id, known) in self.parcels.iter_mut() {
            if sensed_ids.contains(id) || self.carrying.contains(id) {
                continue;
            }
            if sensed_positions.contains(&known.parcel.position()) {
                // The tile is visible and the parcel is not on it any more:
                // picked up or expired.
                removed.push(id.clone());
            } else if !known.outdated {
                known.outdated = true;
            }
        }
        for id in &removed {
            self.parcels.remove(id);
        }
        if !removed.is_empty() {
            debug!(count = removed.len(), "forgot parcels removed from view");
        }

        self.evict_expired();
    }

    fn evict_expired(&mut self) {
        let now = self.now_ms();
        let decay = self.config.decay_interval_ms();
        self.parcels
            .retain(|_, p| p.decayed_reward(now, decay) > 0);
        self.carrying.retain({
            let parcels = &self.parcels;
            move |id| parcels.contains_key(id)
        });

        self.active_parcel_positions = self
            .parcels
            .values()
            .filter(|p| p.parcel.carried_by.is_none())
            .map(|p| p.parcel.position())
            .collect();
    }

    /// Every believed parcel, with decay applied; zero-reward parcels are
    /// evicted first.
    pub fn parcels(&mut self) -> Vec<ExtendedParcel> {
        self.evict_expired();
        let now = self.now_ms();
        let decay = self.config.decay_interval_ms();
        let mut out: Vec<ExtendedParcel> = self
            .parcels
            .values()
            .map(|p| {
                let mut p = p.clone();
                p.parcel.reward = p.decayed_reward(now, decay);
                p
            })
            .collect();
        out.sort_by(|a, b| a.parcel.id.cmp(&b.parcel.id));
        out
    }

    pub fn parcel(&mut self, id: &ParcelId) -> Option<ExtendedParcel> {
        self.evict_expired();
        let now = self.now_ms();
        let decay = self.config.decay_interval_ms();
        self.parcels.get(id).map(|p| {
            let mut p = p.clone();
            p.parcel.reward = p.decayed_reward(now, decay);
            p
        })
    }

    /// O(1) "is there a parcel on this tile?" check.
    pub fn has_parcel_at(&self, p: Point) -> bool {
        self.active_parcel_positions.contains(&p)
    }

    pub fn parcel_at(&mut self, at: Point) -> Option<ExtendedParcel> {
        self.evict_expired();
        let now = self.now_ms();
        let decay = self.config.decay_interval_ms();
        self.parcels
            .values()
            .filter(|p| p.parcel.carried_by.is_none() && p.parcel.position() == at)
            .max_by_key(|p| (p.decayed_reward(now, decay), std::cmp::Reverse(p.parcel.id.clone())))
            .map(|p| {
                let mut p = p.clone();
                p.parcel.reward = p.decayed_reward(now, decay);
                p
            })
    }

    // --- inventory ---------------------------------------------------------

    /// Plan hook: the actuator confirmed this parcel is now carried.
    pub fn add_carrying_parcel(&mut self, mut parcel: Parcel) {
        parcel.carried_by = self.my_id().cloned();
        if !self.carrying.contains(&parcel.id) {
            self.carrying.push(parcel.id.clone());
        }
        let now = self.now_ms();
        match self.parcels.get_mut(&parcel.id) {
            Some(known) => {
                known.parcel.carried_by = parcel.carried_by.clone();
                known.outdated = false;
                known.last_seen = now;
                known.last_seen_reward = parcel.reward;
            }
            None => {
                self.parcels
                    .insert(parcel.id.clone(), ExtendedParcel::fresh(parcel, now));
            }
        }
        self.evict_expired();
    }

    /// Plan hook: everything carried was dropped (delivered).
    pub fn clear_carrying_parcels(&mut self) {
        for id in self.carrying.drain(..) {
            self.parcels.remove(&id);
        }
        self.evict_expired();
    }

    pub fn carrying(&self) -> &[ParcelId] {
        &self.carrying
    }

    pub fn carried_count(&self) -> usize {
        self.carrying.len()
    }

    /// Sum of decayed rewards currently carried.
    pub fn carried_reward(&self) -> i32 {
        let now = self.now_ms();
        let decay = self.config.decay_interval_ms();
        self.carrying
            .iter()
            .filter_map(|id| self.parcels.get(id))
            .map(|p| p.decayed_reward(now, decay))
            .sum()
    }

    // --- other agents and occupancy ----------------------------------------

    /// Record sensed agents and the tiles they occupy; forget occupancy
    /// entries older than `longest_path x movement_duration` and agents not
    /// seen within the simulator's agent timeout.
    pub fn update_from_agents(&mut self, sensed: Vec<Agent>) {
        let now = self.now_ms();
        let my_id = self.my_id().cloned();

        for agent in sensed {
            if Some(&agent.id) == my_id.as_ref() {
                continue;
            }
            self.occupied.insert(agent.tile(), now);
            if Some(&agent.id) == self.teammate_id.as_ref() {
                self.teammate = Some(agent);
            } else {
                self.other_agents
                    .insert(agent.id.clone(), SeenAgent { agent, last_seen: now });
            }
        }

        let occupancy_horizon =
            u64::from(self.longest_path.max(1)) * self.config.movement_duration_ms();
        self.occupied
            .retain(|_, seen| now.saturating_sub(*seen) <= occupancy_horizon);

        let agent_horizon = self.config.agent_timeout.millis_or(10_000);
        self.other_agents
            .retain(|_, seen| now.saturating_sub(seen.last_seen) <= agent_horizon);
    }

    /// Competitors only (never self, never the teammate).
    pub fn other_agents(&self) -> Vec<Agent> {
        let mut out: Vec<Agent> = self
            .other_agents
            .values()
            .map(|s| s.agent.clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Tiles believed to host another agent, excluding the agent's own tile.
    pub fn occupied_positions(&self) -> HashSet<Point> {
        let mine = self.my_tile();
        self.occupied
            .keys()
            .copied()
            .filter(|p| Some(*p) != mine)
            .collect()
    }

    // --- partitioning ------------------------------------------------------

    pub fn set_partitioning(&mut self, partitioning: HashMap<Point, AgentId>) {
        self.partitioning = Some(partitioning);
    }

    pub fn partitioning(&self) -> Option<&HashMap<Point, AgentId>> {
        self.partitioning.as_ref()
    }

    /// Recompute the generator partitioning from the current positions of
    /// the pair. No-op (returning false) until the map, own position, and
    /// teammate are all known.
    pub fn recompute_partitioning(&mut self) -> bool {
        let (Some(grid), Some(me), Some(teammate)) =
            (self.grid.as_ref(), self.me.as_ref(), self.teammate.as_ref())
        else {
            return false;
        };
        let assignments = crate::utility::partition(
            grid,
            &[
                (me.id.clone(), me.tile()),
                (teammate.id.clone(), teammate.tile()),
            ],
        );
        self.partitioning = Some(assignments);
        true
    }

    /// Whether a generator tile is this agent's responsibility. True for
    /// every tile while no partitioning is known.
    pub fn assigned_to_me(&self, p: Point) -> bool {
        match (&self.partitioning, self.my_id()) {
            (Some(map), Some(me)) => map.get(&p).map_or(true, |owner| owner == me),
            _ => true,
        }
    }

    /// Generators this agent should service: its partition in co-op, every
    /// generator otherwise.
    pub fn my_generators(&self) -> Vec<Point> {
        self.generators
            .iter()
            .copied()
            .filter(|g| self.assigned_to_me(*g))
            .collect()
    }

    /// Forget everything session-scoped on disconnect.
    pub fn clear_session(&mut self) {
        self.teammate = None;
        self.teammate_id = None;
        self.partitioning = None;
        self.other_agents.clear();
        self.occupied.clear();
    }
}
