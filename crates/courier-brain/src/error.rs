//! Error taxonomy for intention execution.
//!
//! Every kind is recovered at the intention-loop level: failed intentions
//! are popped and the next deliberation round takes over.

use courier_proto::Point;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    /// A* exhausted without reaching the goal.
    #[error("no path from {from} to {to}")]
    PathNotFound { from: Point, to: Point },

    /// The actuator refused a move (tile occupied mid-step).
    #[error("move refused at {at}")]
    MoveFailed { at: Point },

    /// Cooperative cancellation observed.
    #[error("intention stopped")]
    Stopped,

    /// A belief update invalidated a plan precondition.
    #[error("plan precondition no longer holds: {0}")]
    StateMismatch(&'static str),

    /// The predicate has no matching plan in the library.
    #[error("no plan satisfied the intention")]
    NoApplicablePlan,

    /// Actuator or network failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

pub type PlanResult<T> = Result<T, PlanError>;
