//! Handshake and session-exchange behaviour between two wired coordinators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_brain::{BeliefSet, CoopHandle, ManualClock};
use courier_coop::{decode_partitioning, encode_partitioning, Coordinator};
use courier_proto::{
    Actuator, ActuatorError, Agent, AgentId, Direction, Envelope, Parcel, Point,
};
use tokio::sync::oneshot;

const TEAM_KEY: &str = "secret-team";

/// Delivers say/shout/ask straight into the peer coordinator's dispatch.
struct Loopback {
    my_id: AgentId,
    peer: Mutex<Option<Arc<Coordinator>>>,
}

impl Loopback {
    fn new(my_id: &str) -> Arc<Self> {
        Arc::new(Self {
            my_id: my_id.to_string(),
            peer: Mutex::new(None),
        })
    }

    fn connect(&self, peer: Arc<Coordinator>) {
        *self.peer.lock().unwrap() = Some(peer);
    }

    fn peer(&self) -> Arc<Coordinator> {
        self.peer.lock().unwrap().clone().expect("peer wired")
    }
}

#[async_trait]
impl Actuator for Loopback {
    async fn step(&self, _direction: Direction) -> Result<Point, ActuatorError> {
        Err(ActuatorError::Transport("no movement in this test".into()))
    }

    async fn pickup(&self) -> Result<Vec<Parcel>, ActuatorError> {
        Ok(vec![])
    }

    async fn drop_parcels(&self) -> Result<Vec<Parcel>, ActuatorError> {
        Ok(vec![])
    }

    async fn say(&self, _to: &AgentId, envelope: Envelope) -> Result<(), ActuatorError> {
        self.peer().handle_message(&self.my_id, envelope, None).await;
        Ok(())
    }

    async fn shout(&self, envelope: Envelope) -> Result<(), ActuatorError> {
        self.peer().handle_message(&self.my_id, envelope, None).await;
        Ok(())
    }

    async fn ask(&self, _to: &AgentId, envelope: Envelope) -> Result<Envelope, ActuatorError> {
        let (tx, rx) = oneshot::channel();
        self.peer()
            .handle_message(&self.my_id, envelope, Some(tx))
            .await;
        rx.await
            .map_err(|_| ActuatorError::Transport("no answer".into()))
    }
}

struct Pair {
    low: Arc<Coordinator>,
    high: Arc<Coordinator>,
    low_beliefs: Arc<Mutex<BeliefSet>>,
    high_beliefs: Arc<Mutex<BeliefSet>>,
}

/// Two coordinators with ids "A" (low) and "Z" (high), wired back to back.
fn wire_pair() -> Pair {
    let low_beliefs = Arc::new(Mutex::new(BeliefSet::new(Arc::new(ManualClock::default()))));
    let high_beliefs = Arc::new(Mutex::new(BeliefSet::new(Arc::new(ManualClock::default()))));

    let low_actuator = Loopback::new("A");
    let high_actuator = Loopback::new("Z");

    let low = Arc::new(Coordinator::new(
        TEAM_KEY.to_string(),
        low_beliefs.clone(),
        low_actuator.clone(),
    ));
    let high = Arc::new(Coordinator::new(
        TEAM_KEY.to_string(),
        high_beliefs.clone(),
        high_actuator.clone(),
    ));
    low.set_identity("A".into());
    high.set_identity("Z".into());

    low_actuator.connect(high.clone());
    high_actuator.connect(low.clone());

    Pair {
        low,
        high,
        low_beliefs,
        high_beliefs,
    }
}

async fn complete_handshake(pair: &Pair) {
    // "Z" broadcasts hello; the lower id "A" initiates on receipt.
    pair.low
        .handle_message(
            &"Z".to_string(),
            Envelope::Hello {
                team_id: TEAM_KEY.to_string(),
                agent_id: "Z".to_string(),
                timestamp: 0,
            },
            None,
        )
        .await;
}

#[tokio::test]
async fn lower_id_initiates_and_both_share_the_session() {
    let pair = wire_pair();
    complete_handshake(&pair).await;

    let low = pair.low.handshake_state();
    let high = pair.high.handshake_state();

    assert!(low.complete);
    assert!(high.complete);
    assert!(low.initiated);
    assert!(!high.initiated);
    assert!(low.session_id.is_some());
    assert_eq!(low.session_id, high.session_id);
    assert_eq!(low.teammate_id.as_deref(), Some("Z"));
    assert_eq!(high.teammate_id.as_deref(), Some("A"));

    // Only the initiator owns partition broadcasts.
    assert!(pair.low.owns_partitioning());
    assert!(!pair.high.owns_partitioning());
}

#[tokio::test]
async fn hello_with_a_foreign_team_key_is_ignored() {
    let pair = wire_pair();
    pair.low
        .handle_message(
            &"Z".to_string(),
            Envelope::Hello {
                team_id: "other-team".to_string(),
                agent_id: "Z".to_string(),
                timestamp: 0,
            },
            None,
        )
        .await;

    assert!(!pair.low.handshake_complete());
    assert!(!pair.high.handshake_complete());
}

#[tokio::test]
async fn session_scoped_messages_merge_into_beliefs() {
    let pair = wire_pair();
    complete_handshake(&pair).await;
    let session = pair.high.session_id().expect("session established");

    let parcels = vec![Parcel {
        id: "p1".into(),
        x: 3,
        y: 0,
        reward: 12,
        carried_by: None,
    }];
    pair.high
        .handle_message(
            &"A".to_string(),
            Envelope::ParcelsSensed {
                session_id: session.clone(),
                parcels,
            },
            None,
        )
        .await;
    assert!(pair
        .high_beliefs
        .lock()
        .unwrap()
        .has_parcel_at(Point::new(3, 0)));

    let info = Agent {
        id: "A".into(),
        name: "alpha".into(),
        x: 1.0,
        y: 2.0,
        score: 7.0,
        penalty: None,
    };
    pair.high
        .handle_message(
            &"A".to_string(),
            Envelope::MyInfo {
                session_id: session.clone(),
                info,
            },
            None,
        )
        .await;
    let teammate = pair.high_beliefs.lock().unwrap().teammate().cloned();
    assert_eq!(teammate.map(|a| (a.id, a.x)), Some(("A".to_string(), 1.0)));

    let mut partitioning = HashMap::new();
    partitioning.insert(Point::new(0, 0), "A".to_string());
    partitioning.insert(Point::new(9, 9), "Z".to_string());
    pair.high
        .handle_message(
            &"A".to_string(),
            Envelope::MapPartitioning {
                session_id: session,
                partitioning: encode_partitioning(&partitioning),
            },
            None,
        )
        .await;
    let stored = pair.high_beliefs.lock().unwrap().partitioning().cloned();
    assert_eq!(stored, Some(partitioning));
}

#[tokio::test]
async fn stale_session_messages_are_discarded() {
    let pair = wire_pair();
    complete_handshake(&pair).await;

    pair.high
        .handle_message(
            &"A".to_string(),
            Envelope::ParcelsSensed {
                session_id: "some-old-session".to_string(),
                parcels: vec![Parcel {
                    id: "p1".into(),
                    x: 3,
                    y: 0,
                    reward: 12,
                    carried_by: None,
                }],
            },
            None,
        )
        .await;

    assert!(!pair
        .high_beliefs
        .lock()
        .unwrap()
        .has_parcel_at(Point::new(3, 0)));
}

#[tokio::test]
async fn partitioning_round_trips_through_the_wire_format() {
    let mut partitioning = HashMap::new();
    partitioning.insert(Point::new(2, 5), "A".to_string());
    partitioning.insert(Point::new(7, 1), "Z".to_string());

    let wire = encode_partitioning(&partitioning);
    assert_eq!(wire.get("2,5"), Some(&"A".to_string()));
    assert_eq!(decode_partitioning(&wire), partitioning);
}
