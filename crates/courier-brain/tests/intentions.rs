//! Intention execution against a scripted actuator.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_brain::{
    AgentContext, BeliefSet, Desire, Intention, ManualClock, PlanError, Predicate, StopToken,
};
use courier_proto::{
    Actuator, ActuatorError, Agent, AgentConfig, AgentId, Direction, Envelope, MapTile, Parcel,
    Point,
};

/// Walks every move, records it, and can trip a stop token after a set
/// number of steps.
struct ScriptedActuator {
    position: Mutex<Point>,
    steps: Mutex<Vec<Direction>>,
    stop_after: Option<(usize, StopToken)>,
    parcels_on_pickup: Vec<Parcel>,
}

impl ScriptedActuator {
    fn new(start: Point) -> Self {
        Self {
            position: Mutex::new(start),
            steps: Mutex::new(Vec::new()),
            stop_after: None,
            parcels_on_pickup: Vec::new(),
        }
    }

    fn stopping(mut self, after: usize, token: StopToken) -> Self {
        self.stop_after = Some((after, token));
        self
    }

    fn yielding(mut self, parcels: Vec<Parcel>) -> Self {
        self.parcels_on_pickup = parcels;
        self
    }

    fn steps_taken(&self) -> usize {
        self.steps.lock().unwrap().len()
    }
}

#[async_trait]
impl Actuator for ScriptedActuator {
    async fn step(&self, direction: Direction) -> Result<Point, ActuatorError> {
        let next = {
            let mut position = self.position.lock().unwrap();
            *position = position.step(direction);
            *position
        };
        let count = {
            let mut steps = self.steps.lock().unwrap();
            steps.push(direction);
            steps.len()
        };
        if let Some((after, token)) = &self.stop_after {
            if count >= *after {
                token.stop();
            }
        }
        Ok(next)
    }

    async fn pickup(&self) -> Result<Vec<Parcel>, ActuatorError> {
        Ok(self.parcels_on_pickup.clone())
    }

    async fn drop_parcels(&self) -> Result<Vec<Parcel>, ActuatorError> {
        Ok(vec![])
    }

    async fn say(&self, _to: &AgentId, _envelope: Envelope) -> Result<(), ActuatorError> {
        Ok(())
    }

    async fn shout(&self, _envelope: Envelope) -> Result<(), ActuatorError> {
        Ok(())
    }

    async fn ask(&self, _to: &AgentId, _envelope: Envelope) -> Result<Envelope, ActuatorError> {
        Err(ActuatorError::Transport("no peers".into()))
    }
}

fn open_row_beliefs(width: u32, me: Point) -> BeliefSet {
    let mut beliefs = BeliefSet::new(Arc::new(ManualClock::default()));
    let tiles: Vec<MapTile> = (0..width as i32)
        .map(|x| MapTile { x, y: 0, kind: 3 })
        .collect();
    beliefs.update_from_map(width, 1, &tiles);
    beliefs.update_from_you(Agent {
        id: "me".into(),
        name: "me".into(),
        x: f64::from(me.x),
        y: f64::from(me.y),
        score: 0.0,
        penalty: None,
    });
    beliefs
}

fn context(beliefs: BeliefSet, actuator: Arc<ScriptedActuator>) -> AgentContext {
    AgentContext::new(
        Arc::new(Mutex::new(beliefs)),
        actuator,
        Arc::new(AgentConfig::default()),
    )
}

#[tokio::test]
async fn go_to_walks_the_full_path() {
    let actuator = Arc::new(ScriptedActuator::new(Point::new(0, 0)));
    let ctx = context(open_row_beliefs(5, Point::new(0, 0)), actuator.clone());

    let mut intention = Intention::new(Predicate::new(
        Desire::GoTo {
            destination: Point::new(4, 0),
        },
        1.0,
    ));
    let result = intention.achieve(&ctx).await;
    assert_eq!(result, Ok(true));
    assert_eq!(actuator.steps_taken(), 4);
    assert!(intention.is_finished());
}

#[tokio::test]
async fn stopping_mid_path_aborts_within_one_step() {
    let mut intention = Intention::new(Predicate::new(
        Desire::GoTo {
            destination: Point::new(4, 0),
        },
        1.0,
    ));
    let actuator = Arc::new(
        ScriptedActuator::new(Point::new(0, 0)).stopping(2, intention.stop_token()),
    );
    let ctx = context(open_row_beliefs(5, Point::new(0, 0)), actuator.clone());

    let result = intention.achieve(&ctx).await;
    assert_eq!(result, Err(PlanError::Stopped));
    // The flag trips after the second step; the next check aborts.
    assert_eq!(actuator.steps_taken(), 2);
}

#[tokio::test]
async fn pickup_runs_its_sub_intention_and_fills_the_inventory() {
    let parcel = Parcel {
        id: "p1".into(),
        x: 3,
        y: 0,
        reward: 9,
        carried_by: None,
    };
    let actuator = Arc::new(
        ScriptedActuator::new(Point::new(0, 0)).yielding(vec![parcel.clone()]),
    );
    let mut beliefs = open_row_beliefs(5, Point::new(0, 0));
    beliefs.update_from_parcels(vec![parcel]);
    let ctx = context(beliefs, actuator.clone());

    let mut intention = Intention::new(Predicate::new(
        Desire::Pickup {
            parcel_id: "p1".into(),
            destination: Point::new(3, 0),
        },
        1.0,
    ));
    let result = intention.achieve(&ctx).await;
    assert_eq!(result, Ok(true));
    assert_eq!(actuator.steps_taken(), 3);

    let beliefs = ctx.lock_beliefs();
    assert_eq!(beliefs.carried_count(), 1);
    assert_eq!(beliefs.carried_reward(), 9);
}

#[tokio::test]
async fn stopping_a_pickup_cancels_its_go_to_sub_intention() {
    let mut intention = Intention::new(Predicate::new(
        Desire::Pickup {
            parcel_id: "p1".into(),
            destination: Point::new(4, 0),
        },
        1.0,
    ));
    let actuator = Arc::new(
        ScriptedActuator::new(Point::new(0, 0)).stopping(1, intention.stop_token()),
    );
    let mut beliefs = open_row_beliefs(5, Point::new(0, 0));
    beliefs.update_from_parcels(vec![Parcel {
        id: "p1".into(),
        x: 4,
        y: 0,
        reward: 5,
        carried_by: None,
    }]);
    let ctx = context(beliefs, actuator.clone());

    let result = intention.achieve(&ctx).await;
    // The parent's token is shared with the go-to sub-intention: stopping
    // the pickup halts the walk immediately and nothing gets picked up.
    assert_eq!(result, Err(PlanError::Stopped));
    assert_eq!(actuator.steps_taken(), 1);
    assert_eq!(ctx.lock_beliefs().carried_count(), 0);
}

#[tokio::test]
async fn deliver_without_cargo_has_no_satisfying_plan() {
    let actuator = Arc::new(ScriptedActuator::new(Point::new(0, 0)));
    let ctx = context(open_row_beliefs(5, Point::new(0, 0)), actuator.clone());

    let mut intention = Intention::new(Predicate::new(
        Desire::Deliver {
            destination: Point::new(4, 0),
        },
        1.0,
    ));
    // DeliverPlan rejects the precondition and no other plan applies.
    let result = intention.achieve(&ctx).await;
    assert_eq!(result, Err(PlanError::NoApplicablePlan));
    assert_eq!(actuator.steps_taken(), 0);
}

#[tokio::test]
async fn unreachable_destination_surfaces_path_not_found() {
    let actuator = Arc::new(ScriptedActuator::new(Point::new(0, 0)));
    // A wall tile splits the row.
    let mut beliefs = BeliefSet::new(Arc::new(ManualClock::default()));
    let tiles: Vec<MapTile> = (0..5)
        .map(|x| MapTile {
            x,
            y: 0,
            kind: if x == 2 { 0 } else { 3 },
        })
        .collect();
    beliefs.update_from_map(5, 1, &tiles);
    beliefs.update_from_you(Agent {
        id: "me".into(),
        name: "me".into(),
        x: 0.0,
        y: 0.0,
        score: 0.0,
        penalty: None,
    });
    let ctx = context(beliefs, actuator);

    let mut intention = Intention::new(Predicate::new(
        Desire::GoTo {
            destination: Point::new(4, 0),
        },
        1.0,
    ));
    let result = intention.achieve(&ctx).await;
    assert_eq!(
        result,
        Err(PlanError::PathNotFound {
            from: Point::new(0, 0),
            to: Point::new(4, 0),
        })
    );
}
