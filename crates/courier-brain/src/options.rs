//! Turning beliefs into the next best predicate.

use courier_nav::TileType;
use courier_proto::AgentConfig;
use tracing::debug;

use crate::beliefs::BeliefSet;
use crate::desire::{Desire, DesireKind, Predicate};
use crate::utility::{self, UtilityContext};

/// Generates ranked candidate predicates from the current beliefs.
///
/// Stateless apart from the exploration cursor, which rotates the fallback
/// destination across the agent's assigned generators.
pub struct OptionGenerator {
    cooperative: bool,
    preemption_margin: f64,
    explore_cursor: usize,
}

impl OptionGenerator {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            cooperative: config.cooperative(),
            preemption_margin: config.preemption_margin,
            explore_cursor: 0,
        }
    }

    /// The predicate to push, if any beats the current commitment.
    ///
    /// `current` is the intention that will effectively run next (the
    /// queue's newest unstopped entry).
    pub fn best_option(
        &mut self,
        beliefs: &mut BeliefSet,
        current: Option<&Predicate>,
    ) -> Option<Predicate> {
        let my_tile = beliefs.my_tile()?;
        beliefs.grid()?;

        // Standing on an unclaimed parcel: grab it now unless it is already
        // the committed target.
        if beliefs.has_parcel_at(my_tile) {
            let targets_here = current
                .map(|p| p.desire.kind() == DesireKind::Pickup && p.desire.destination() == my_tile)
                .unwrap_or(false);
            if !targets_here {
                if let Some(found) = beliefs.parcel_at(my_tile) {
                    return Some(Predicate::new(
                        Desire::Pickup {
                            parcel_id: found.parcel.id,
                            destination: my_tile,
                        },
                        f64::INFINITY,
                    ));
                }
            }
        }

        // Standing on a delivery zone with cargo: drop it now.
        if beliefs.carried_count() > 0 && beliefs.standing_on(TileType::Delivery) {
            let targets_here = current
                .map(|p| {
                    p.desire.kind() == DesireKind::Deliver && p.desire.destination() == my_tile
                })
                .unwrap_or(false);
            if !targets_here {
                return Some(Predicate::new(
                    Desire::Deliver {
                        destination: my_tile,
                    },
                    f64::INFINITY,
                ));
            }
        }

        let candidate = self.best_scored_option(beliefs, my_tile);

        match candidate {
            Some(option) if option.utility > 0.0 => {
                let beats_current = match current {
                    None => true,
                    Some(current) => option.utility > current.utility + self.preemption_margin,
                };
                if beats_current {
                    debug!(utility = option.utility, desire = ?option.desire, "new best option");
                    Some(option)
                } else {
                    None
                }
            }
            _ if current.is_none() => self.exploration(beliefs, my_tile),
            _ => None,
        }
    }

    fn best_scored_option(
        &self,
        beliefs: &mut BeliefSet,
        my_tile: courier_proto::Point,
    ) -> Option<Predicate> {
        let parcels = beliefs.parcels();
        let carried_reward = beliefs.carried_reward();
        let carried_count = beliefs.carried_count();
        let others = beliefs.other_agents();
        let blocked = beliefs.occupied_positions();

        let eligible: Vec<_> = parcels
            .into_iter()
            .filter(|p| p.parcel.carried_by.is_none())
            .filter(|p| p.parcel.reward > 0)
            .filter(|p| !self.cooperative || beliefs.assigned_to_me(p.parcel.position()))
            .collect();

        let grid = beliefs.grid()?;
        let ctx = UtilityContext {
            grid,
            blocked: &blocked,
            delivery_zones: beliefs.delivery_zones(),
            movement_ms: beliefs.config().movement_duration_ms(),
            decay_ms: beliefs.config().decay_interval_ms(),
        };

        let mut best: Option<Predicate> = None;
        for extended in &eligible {
            let utility = utility::parcel_utility(
                &ctx,
                my_tile,
                &extended.parcel,
                carried_reward,
                carried_count,
                &others,
            );
            if best.as_ref().map_or(true, |b| utility > b.utility) {
                best = Some(Predicate::new(
                    Desire::Pickup {
                        parcel_id: extended.parcel.id.clone(),
                        destination: extended.parcel.position(),
                    },
                    utility,
                ));
            }
        }

        if carried_count > 0 {
            if let Some((zone, _)) = utility::closest_delivery(&ctx, my_tile) {
                let utility =
                    utility::delivery_utility(&ctx, my_tile, carried_reward, carried_count);
                if best.as_ref().map_or(true, |b| utility > b.utility) {
                    best = Some(Predicate::new(Desire::Deliver { destination: zone }, utility));
                }
            }
        }

        best
    }

    /// Fallback when nothing scores: wander across the assigned generators.
    fn exploration(
        &mut self,
        beliefs: &mut BeliefSet,
        my_tile: courier_proto::Point,
    ) -> Option<Predicate> {
        let generators = if self.cooperative {
            beliefs.my_generators()
        } else {
            beliefs.generators().to_vec()
        };
        if generators.is_empty() {
            return None;
        }

        // Rotate; never target the tile we are already on (that intention
        // would complete instantly and spin the loop).
        for _ in 0..generators.len() {
            let destination = generators[self.explore_cursor % generators.len()];
            self.explore_cursor = self.explore_cursor.wrapping_add(1);
            if destination != my_tile {
                return Some(Predicate::new(Desire::Exploration { destination }, 0.0));
            }
        }
        None
    }
}
