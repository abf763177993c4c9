//! Typed goals the option generator produces and the plan library consumes.

use courier_proto::{ParcelId, Point};

/// A candidate goal. Only `Pickup` names a parcel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Desire {
    Pickup {
        parcel_id: ParcelId,
        destination: Point,
    },
    Deliver { destination: Point },
    GoTo { destination: Point },
    Exploration { destination: Point },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesireKind {
    Pickup,
    Deliver,
    GoTo,
    Exploration,
}

impl Desire {
    pub fn kind(&self) -> DesireKind {
        match self {
            Desire::Pickup { .. } => DesireKind::Pickup,
            Desire::Deliver { .. } => DesireKind::Deliver,
            Desire::GoTo { .. } => DesireKind::GoTo,
            Desire::Exploration { .. } => DesireKind::Exploration,
        }
    }

    pub fn destination(&self) -> Point {
        match self {
            Desire::Pickup { destination, .. }
            | Desire::Deliver { destination }
            | Desire::GoTo { destination }
            | Desire::Exploration { destination } => *destination,
        }
    }
}

/// A desire plus its score.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub desire: Desire,
    pub utility: f64,
}

impl Predicate {
    pub fn new(desire: Desire, utility: f64) -> Self {
        Self { desire, utility }
    }

    /// Goal equality, ignoring the utility field.
    pub fn same_goal(&self, other: &Predicate) -> bool {
        self.desire == other.desire
    }
}

/// One stop of a jointly optimised pickup/delivery sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TourStop {
    Pickup {
        parcel_id: ParcelId,
        position: Point,
        reward: i32,
    },
    Delivery { position: Point },
}

impl TourStop {
    pub fn position(&self) -> Point {
        match self {
            TourStop::Pickup { position, .. } | TourStop::Delivery { position } => *position,
        }
    }
}

/// An ordered stop sequence with its cached score. The runtime commits one
/// stop at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct Tour {
    pub stops: Vec<TourStop>,
    pub utility: f64,
}
