//! Committed goals and the revision loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::beliefs::BeliefSet;
use crate::context::AgentContext;
use crate::desire::{Desire, Predicate};
use crate::error::{PlanError, PlanResult};

/// Cooperative cancellation flag, observed at every suspension point.
///
/// Cloning shares the flag: a sub-intention receives its parent's token, so
/// stopping the parent transitively stops the whole tree within one tick.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Token for a sub-intention run by a plan on behalf of this one.
    pub fn child(&self) -> StopToken {
        self.clone()
    }
}

/// A predicate the agent has committed to, plus its lifecycle state.
#[derive(Debug)]
pub struct Intention {
    predicate: Predicate,
    stop: StopToken,
    started: bool,
    executing: bool,
    finished: bool,
}

impl Intention {
    pub fn new(predicate: Predicate) -> Self {
        Self::with_token(predicate, StopToken::new())
    }

    /// Sub-intentions share their parent's stop token.
    pub fn with_token(predicate: Predicate, stop: StopToken) -> Self {
        Self {
            predicate,
            stop,
            started: false,
            executing: false,
            finished: false,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Walk the plan library and run the first applicable plan. A failing
    /// plan falls through to the next applicable one; observation of the
    /// stop flag aborts immediately.
    pub async fn achieve(&mut self, ctx: &AgentContext) -> PlanResult<bool> {
        if self.stop.is_stopped() {
            return Err(PlanError::Stopped);
        }
        self.started = true;
        self.executing = true;

        let kind = self.predicate.desire.kind();
        for entry in ctx.plans.entries() {
            if !(entry.applicable)(kind) {
                continue;
            }
            let mut plan = (entry.build)(self.stop.child());
            debug!(plan = entry.name, desire = ?self.predicate.desire, "executing plan");
            match plan.execute(&self.predicate, ctx).await {
                Ok(done) => {
                    self.executing = false;
                    self.finished = true;
                    return Ok(done);
                }
                Err(PlanError::Stopped) => {
                    self.executing = false;
                    return Err(PlanError::Stopped);
                }
                Err(err) => {
                    warn!(plan = entry.name, %err, "plan failed, trying the next one");
                }
            }
        }

        self.executing = false;
        Err(PlanError::NoApplicablePlan)
    }
}

/// The intention queue. Effectively single-element: pushing a new goal
/// stops the previous tail so the newcomer takes over at the next loop
/// tick.
#[derive(Default)]
pub struct IntentionQueue {
    queue: VecDeque<Intention>,
    /// Predicate and stop handle of the intention currently being achieved
    /// by the revision loop.
    current: Option<(Predicate, StopToken)>,
}

impl IntentionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a goal. Pushing a duplicate predicate (utility ignored) is a
    /// no-op; any other push stops the previously newest intention.
    pub fn push(&mut self, predicate: Predicate) -> bool {
        let duplicate = self
            .queue
            .iter()
            .any(|i| i.predicate().same_goal(&predicate))
            || self
                .current
                .as_ref()
                .is_some_and(|(p, _)| p.same_goal(&predicate));
        if duplicate {
            return false;
        }

        if let Some(last) = self.queue.back() {
            last.stop();
        } else if let Some((_, stop)) = &self.current {
            stop.stop();
        }
        debug!(desire = ?predicate.desire, utility = predicate.utility, "intention queued");
        self.queue.push_back(Intention::new(predicate));
        true
    }

    /// Hand the head to the revision loop, recording it as current.
    pub fn take_next(&mut self) -> Option<Intention> {
        let intention = self.queue.pop_front()?;
        self.current = Some((intention.predicate().clone(), intention.stop_token()));
        Some(intention)
    }

    pub fn finish_current(&mut self) {
        self.current = None;
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.current.is_none()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// The commitment a challenger must beat: the newest queued goal,
    /// falling back to the one being executed.
    pub fn effective_commitment(&self) -> Option<Predicate> {
        self.queue
            .back()
            .map(|i| i.predicate().clone())
            .or_else(|| self.current.as_ref().map(|(p, _)| p.clone()))
    }
}

/// Whether a belief update invalidated a committed goal.
fn still_valid(predicate: &Predicate, beliefs: &mut BeliefSet) -> bool {
    match &predicate.desire {
        Desire::Deliver { .. } => beliefs.carried_count() > 0,
        Desire::Pickup { parcel_id, .. } => matches!(
            beliefs.parcel(parcel_id),
            Some(p) if p.parcel.carried_by.is_none()
        ),
        Desire::GoTo { .. } | Desire::Exploration { .. } => true,
    }
}

/// The revision loop: validate the head, achieve it, pop it, and signal
/// `on_empty` whenever the queue drains so deliberation re-runs
/// immediately. At most one intention is executing at any time.
pub async fn run_intention_loop(
    ctx: AgentContext,
    queue: Arc<Mutex<IntentionQueue>>,
    on_empty: mpsc::UnboundedSender<()>,
) {
    let tick = Duration::from_millis(ctx.config.loop_interval_ms.max(1));
    loop {
        let next = {
            let mut queue = queue.lock().expect("intention queue poisoned");
            queue.take_next()
        };

        let Some(mut intention) = next else {
            tokio::time::sleep(tick).await;
            continue;
        };

        let valid = {
            let mut beliefs = ctx.lock_beliefs();
            still_valid(intention.predicate(), &mut beliefs)
        };
        if !valid {
            debug!(desire = ?intention.predicate().desire, "dropping invalidated intention");
        } else {
            match intention.achieve(&ctx).await {
                Ok(_) => debug!(desire = ?intention.predicate().desire, "intention achieved"),
                Err(PlanError::Stopped) => {
                    debug!(desire = ?intention.predicate().desire, "intention stopped")
                }
                Err(err) => warn!(%err, "intention failed"),
            }
        }

        let drained = {
            let mut queue = queue.lock().expect("intention queue poisoned");
            queue.finish_current();
            queue.is_empty()
        };
        if drained {
            let _ = on_empty.send(());
        }
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use courier_proto::Point;

    use super::*;
    use crate::desire::Desire;

    fn goto(x: i32, utility: f64) -> Predicate {
        Predicate::new(
            Desire::GoTo {
                destination: Point::new(x, 0),
            },
            utility,
        )
    }

    #[test]
    fn duplicate_push_is_a_no_op() {
        let mut queue = IntentionQueue::new();
        assert!(queue.push(goto(1, 0.5)));
        // Same goal, different utility: ignored.
        assert!(!queue.push(goto(1, 9.0)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn pushing_a_new_goal_stops_the_previous_tail() {
        let mut queue = IntentionQueue::new();
        queue.push(goto(1, 0.5));
        queue.push(goto(2, 0.9));

        let first = queue.take_next().expect("head");
        assert!(first.is_stopped());
        queue.finish_current();
        let second = queue.take_next().expect("next");
        assert!(!second.is_stopped());
    }

    #[test]
    fn pushing_stops_the_executing_intention() {
        let mut queue = IntentionQueue::new();
        queue.push(goto(1, 0.5));
        let running = queue.take_next().expect("head");
        assert!(!running.is_stopped());

        queue.push(goto(2, 0.9));
        assert!(running.is_stopped());
        assert_eq!(
            queue.effective_commitment().map(|p| p.desire.destination()),
            Some(Point::new(2, 0))
        );
    }

    #[test]
    fn stop_token_is_shared_with_children() {
        let parent = StopToken::new();
        let child = parent.child();
        let grandchild = child.child();
        parent.stop();
        assert!(child.is_stopped());
        assert!(grandchild.is_stopped());
    }
}
