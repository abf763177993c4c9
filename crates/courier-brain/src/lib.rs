//! The BDI decision core: beliefs, desires, intentions, and plans.
//!
//! Data flows sensor-first: the driver feeds sensor events into the
//! [`BeliefSet`], the [`OptionGenerator`] scores candidate goals against the
//! snapshot, the [`IntentionQueue`] commits to the best one, and the plan
//! library turns the commitment into actuator calls. Everything shares one
//! logical thread and yields only at suspension points.

#![forbid(unsafe_code)]

pub mod beliefs;
pub mod context;
pub mod desire;
pub mod error;
pub mod intention;
pub mod options;
pub mod plans;
pub mod utility;

pub use beliefs::{BeliefSet, ExtendedParcel, ManualClock, SeenAgent, SystemClock, TimeSource};
pub use context::{AgentContext, CoopHandle};
pub use desire::{Desire, DesireKind, Predicate, Tour, TourStop};
pub use error::{PlanError, PlanResult};
pub use intention::{run_intention_loop, Intention, IntentionQueue, StopToken};
pub use options::OptionGenerator;
pub use plans::{DeliverPlan, GoToPlan, PickUpPlan, Plan, PlanEntry, PlanLibrary};
pub use utility::{
    closest_delivery, delivery_utility, parcel_threat, parcel_utility, partition, tour_utility,
    UtilityContext,
};
