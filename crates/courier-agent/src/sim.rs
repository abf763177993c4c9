//! A scripted in-process world implementing the sensor/actuator contracts.
//!
//! Used by the end-to-end scenarios and by `local://` hosts. Deliberately
//! small: one agent, global sensing, no reward decay on the simulator side.
//!
//! Map legend: `.` walkable, `#` blocked, `P` parcel generator, `D`
//! delivery zone, `S` agent start (walkable).

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use courier_proto::{
    Actuator, ActuatorError, Agent, AgentId, Direction, Envelope, GameConfig, MapTile, Parcel,
    Point, SensorEvent,
};
use tokio::sync::mpsc;

const SIM_AGENT_ID: &str = "courier-1";

struct WorldState {
    width: u32,
    height: u32,
    tiles: Vec<MapTile>,
    position: Point,
    ground: Vec<Parcel>,
    carried: Vec<Parcel>,
    delivered: i32,
    actions: Vec<String>,
    events: mpsc::UnboundedSender<SensorEvent>,
    game: GameConfig,
}

impl WorldState {
    fn tile_kind(&self, p: Point) -> u8 {
        self.tiles
            .iter()
            .find(|t| t.x == p.x && t.y == p.y)
            .map(|t| t.kind)
            .unwrap_or(0)
    }

    fn walkable(&self, p: Point) -> bool {
        p.x >= 0
            && p.y >= 0
            && p.x < self.width as i32
            && p.y < self.height as i32
            && self.tile_kind(p) != 0
    }

    fn me(&self) -> Agent {
        Agent {
            id: SIM_AGENT_ID.to_string(),
            name: "courier".to_string(),
            x: f64::from(self.position.x),
            y: f64::from(self.position.y),
            score: f64::from(self.delivered),
            penalty: None,
        }
    }

    fn all_parcels(&self) -> Vec<Parcel> {
        let mut all = self.ground.clone();
        all.extend(self.carried.clone());
        all
    }

    fn emit(&self, event: SensorEvent) {
        // A closed channel just means the driver is gone.
        let _ = self.events.send(event);
    }

    fn emit_parcels(&self) {
        self.emit(SensorEvent::Parcels(self.all_parcels()));
    }
}

/// Handle on the scripted world. Clone-cheap via the inner lock.
#[derive(Clone)]
pub struct SimWorld {
    inner: Arc<Mutex<WorldState>>,
}

impl SimWorld {
    /// Build a world from an ASCII map and push the connect/config/you/map
    /// events into a fresh sensor channel.
    pub fn new(map: &str, game: GameConfig) -> (Self, mpsc::UnboundedReceiver<SensorEvent>) {
        let rows: Vec<&str> = map
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        assert!(!rows.is_empty(), "map must have at least one row");
        let height = rows.len() as u32;
        let width = rows[0].chars().count() as u32;

        let mut tiles = Vec::new();
        let mut start = Point::new(0, 0);
        for (row_idx, row) in rows.iter().enumerate() {
            // Top row of the drawing is the highest y.
            let y = (height as i32) - 1 - row_idx as i32;
            for (x, ch) in row.chars().enumerate() {
                let x = x as i32;
                let kind = match ch {
                    '#' => 0,
                    'P' => 1,
                    'D' => 2,
                    '.' => 3,
                    'S' => {
                        start = Point::new(x, y);
                        3
                    }
                    other => panic!("unknown map tile {other:?}"),
                };
                tiles.push(MapTile { x, y, kind });
            }
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = WorldState {
            width,
            height,
            tiles,
            position: start,
            ground: Vec::new(),
            carried: Vec::new(),
            delivered: 0,
            actions: Vec::new(),
            events: events_tx,
            game,
        };

        state.emit(SensorEvent::Connect);
        state.emit(SensorEvent::Config(state.game.clone()));
        state.emit(SensorEvent::You(state.me()));
        state.emit(SensorEvent::Map {
            width,
            height,
            tiles: state.tiles.clone(),
        });

        (
            Self {
                inner: Arc::new(Mutex::new(state)),
            },
            events_rx,
        )
    }

    fn lock(&self) -> MutexGuard<'_, WorldState> {
        self.inner.lock().expect("sim world poisoned")
    }

    pub fn actuator(&self) -> Arc<dyn Actuator> {
        Arc::new(SimActuator {
            world: self.inner.clone(),
        })
    }

    /// Drop a parcel into the world and re-sense.
    pub fn spawn_parcel(&self, id: &str, x: i32, y: i32, reward: i32) {
        let mut state = self.lock();
        state.ground.push(Parcel {
            id: id.to_string(),
            x,
            y,
            reward,
            carried_by: None,
        });
        state.emit_parcels();
    }

    /// Re-send the current sensing (parcels and agents).
    pub fn sense(&self) {
        let state = self.lock();
        state.emit_parcels();
        state.emit(SensorEvent::Agents(vec![]));
    }

    pub fn disconnect(&self) {
        self.lock().emit(SensorEvent::Disconnect);
    }

    /// Every actuator command issued so far, in order.
    pub fn actions(&self) -> Vec<String> {
        self.lock().actions.clone()
    }

    pub fn delivered(&self) -> i32 {
        self.lock().delivered
    }

    pub fn carried_count(&self) -> usize {
        self.lock().carried.len()
    }

    pub fn ground_count(&self) -> usize {
        self.lock().ground.len()
    }

    pub fn position(&self) -> Point {
        self.lock().position
    }
}

struct SimActuator {
    world: Arc<Mutex<WorldState>>,
}

impl SimActuator {
    fn lock(&self) -> MutexGuard<'_, WorldState> {
        self.world.lock().expect("sim world poisoned")
    }
}

#[async_trait]
impl Actuator for SimActuator {
    async fn step(&self, direction: Direction) -> Result<Point, ActuatorError> {
        let duration = {
            let state = self.lock();
            state.game.movement_duration_ms()
        };
        tokio::time::sleep(Duration::from_millis(duration)).await;

        let mut state = self.lock();
        let target = state.position.step(direction);
        if !state.walkable(target) {
            return Err(ActuatorError::MoveRefused);
        }
        state.position = target;
        state.actions.push(direction.as_str().to_string());
        state.emit(SensorEvent::You(state.me()));
        Ok(target)
    }

    async fn pickup(&self) -> Result<Vec<Parcel>, ActuatorError> {
        let mut state = self.lock();
        state.actions.push("pickup".to_string());

        let here = state.position;
        let (mut taken, left): (Vec<Parcel>, Vec<Parcel>) = state
            .ground
            .drain(..)
            .partition(|p| p.position() == here);
        state.ground = left;
        for parcel in &mut taken {
            parcel.carried_by = Some(SIM_AGENT_ID.to_string());
        }
        state.carried.extend(taken.clone());
        state.emit_parcels();
        Ok(taken)
    }

    async fn drop_parcels(&self) -> Result<Vec<Parcel>, ActuatorError> {
        let mut state = self.lock();
        state.actions.push("drop".to_string());

        let dropped: Vec<Parcel> = state.carried.drain(..).collect();
        if state.tile_kind(state.position) == 2 {
            state.delivered += dropped.iter().map(|p| p.reward).sum::<i32>();
        } else {
            // Not a delivery zone: the parcels land back on the ground.
            for mut parcel in dropped.clone() {
                parcel.carried_by = None;
                parcel.x = state.position.x;
                parcel.y = state.position.y;
                state.ground.push(parcel);
            }
        }
        state.emit(SensorEvent::You(state.me()));
        state.emit_parcels();
        Ok(dropped)
    }

    async fn say(&self, _to: &AgentId, _envelope: Envelope) -> Result<(), ActuatorError> {
        Ok(())
    }

    async fn shout(&self, _envelope: Envelope) -> Result<(), ActuatorError> {
        Ok(())
    }

    async fn ask(&self, _to: &AgentId, _envelope: Envelope) -> Result<Envelope, ActuatorError> {
        Err(ActuatorError::Transport("no peers in the local world".into()))
    }
}
