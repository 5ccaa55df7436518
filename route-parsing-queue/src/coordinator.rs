//! # Exclusive parsing lane
//!
//! The lane is a small state machine guarded by a synchronous mutex.
//! The mutex is never held across an `.await`;
//! tasks waiting for the lane park on a oneshot channel instead,
//! and the task releasing the lane hands it over by sending a [`LanePermit`] down that channel.
//!
//! Permits release the lane when dropped,
//! so a task which fails, panics or is cancelled mid-parse never wedges the lane.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, trace};

type PrepareForParsingAction = Arc<dyn Fn() + Send + Sync>;

/// Outcome of submitting alternative routes for parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlternativesParsingResult<T> {
    Parsed(T),
    /// A primary route update arrived first, so the alternatives are stale and were never parsed.
    NotActual,
}

impl<T> AlternativesParsingResult<T> {
    pub fn parsed(self) -> Option<T> {
        match self {
            AlternativesParsingResult::Parsed(value) => Some(value),
            AlternativesParsingResult::NotActual => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LaneHolder {
    Idle,
    Primary,
    Alternatives,
}

enum AlternativesAdmission {
    Admitted(LanePermit),
    NotActual,
}

enum PrimaryEntry {
    Admitted(LanePermit),
    Queued(oneshot::Receiver<LanePermit>),
}

enum AlternativesEntry {
    Admitted(LanePermit),
    Queued(oneshot::Receiver<AlternativesAdmission>),
    NotActual,
}

struct LaneState {
    holder: LaneHolder,
    primary_waiters: VecDeque<oneshot::Sender<LanePermit>>,
    alternatives_waiters: VecDeque<oneshot::Sender<AlternativesAdmission>>,
}

struct Lane {
    state: Mutex<LaneState>,
    prepare_for_parsing: Mutex<Option<PrepareForParsingAction>>,
}

/// Proof of holding the lane. Dropping it hands the lane to the next waiter.
struct LanePermit {
    lane: Option<Arc<Lane>>,
}

impl LanePermit {
    fn new(lane: &Arc<Lane>) -> Self {
        LanePermit {
            lane: Some(Arc::clone(lane)),
        }
    }

    /// Forgets the lane without releasing it.
    ///
    /// Only for permits that came back from a waiter which had already gone away;
    /// the caller is still deciding who holds the lane.
    fn disarm(mut self) {
        self.lane = None;
    }
}

impl Drop for LanePermit {
    fn drop(&mut self) {
        if let Some(lane) = self.lane.take() {
            lane.release();
        }
    }
}

impl Lane {
    fn new() -> Self {
        Lane {
            state: Mutex::new(LaneState {
                holder: LaneHolder::Idle,
                primary_waiters: VecDeque::new(),
                alternatives_waiters: VecDeque::new(),
            }),
            prepare_for_parsing: Mutex::new(None),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LaneState> {
        // The state is updated in single statements, so a panicking holder can't leave it half-written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_enter_primary(self: &Arc<Self>) -> PrimaryEntry {
        let mut state = self.lock_state();

        // Queued alternatives were computed for a route that is about to be replaced.
        for waiter in state.alternatives_waiters.drain(..) {
            let _ = waiter.send(AlternativesAdmission::NotActual);
        }

        if state.holder == LaneHolder::Idle {
            state.holder = LaneHolder::Primary;
            return PrimaryEntry::Admitted(LanePermit::new(self));
        }

        let (sender, receiver) = oneshot::channel();
        state.primary_waiters.push_back(sender);
        PrimaryEntry::Queued(receiver)
    }

    async fn enter_primary(self: &Arc<Self>) -> LanePermit {
        loop {
            match self.try_enter_primary() {
                PrimaryEntry::Admitted(permit) => return permit,
                PrimaryEntry::Queued(admission) => {
                    if let Ok(permit) = admission.await {
                        return permit;
                    }
                    trace!("Primary admission channel closed, queueing again");
                }
            }
        }
    }

    fn try_enter_alternatives(self: &Arc<Self>) -> AlternativesEntry {
        let mut state = self.lock_state();
        match state.holder {
            LaneHolder::Idle => {
                state.holder = LaneHolder::Alternatives;
                AlternativesEntry::Admitted(LanePermit::new(self))
            }
            LaneHolder::Primary => AlternativesEntry::NotActual,
            LaneHolder::Alternatives if !state.primary_waiters.is_empty() => {
                AlternativesEntry::NotActual
            }
            LaneHolder::Alternatives => {
                let (sender, receiver) = oneshot::channel();
                state.alternatives_waiters.push_back(sender);
                AlternativesEntry::Queued(receiver)
            }
        }
    }

    async fn enter_alternatives(self: &Arc<Self>) -> Option<LanePermit> {
        match self.try_enter_alternatives() {
            AlternativesEntry::Admitted(permit) => Some(permit),
            AlternativesEntry::NotActual => None,
            AlternativesEntry::Queued(admission) => match admission.await {
                Ok(AlternativesAdmission::Admitted(permit)) => Some(permit),
                Ok(AlternativesAdmission::NotActual) | Err(_) => None,
            },
        }
    }

    /// Hands the lane to the next waiter: primary tasks first, then alternatives.
    fn release(self: &Arc<Self>) {
        let mut state = self.lock_state();

        while let Some(waiter) = state.primary_waiters.pop_front() {
            state.holder = LaneHolder::Primary;
            match waiter.send(LanePermit::new(self)) {
                Ok(()) => {
                    trace!("Lane handed over to a queued primary task");
                    return;
                }
                // The waiting task was cancelled.
                Err(permit) => permit.disarm(),
            }
        }

        while let Some(waiter) = state.alternatives_waiters.pop_front() {
            state.holder = LaneHolder::Alternatives;
            match waiter.send(AlternativesAdmission::Admitted(LanePermit::new(self))) {
                Ok(()) => {
                    trace!("Lane handed over to a queued alternatives task");
                    return;
                }
                Err(AlternativesAdmission::Admitted(permit)) => permit.disarm(),
                Err(AlternativesAdmission::NotActual) => {}
            }
        }

        state.holder = LaneHolder::Idle;
    }

    fn prepare_for_parsing(&self) {
        let action = self
            .prepare_for_parsing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(action) = action {
            action();
        }
    }
}

/// Serialises route parsing work.
///
/// Primary route updates (new routes, reroutes, refreshes) always run,
/// one at a time and in submission order.
/// Alternative routes are best effort:
/// they are dropped as stale whenever a primary update is running or waiting.
///
/// The optional "prepare for parsing" action runs every time a task is admitted to the lane,
/// right before its work starts.
/// The application uses it to free memory held by previous routes.
#[derive(Clone)]
pub struct ParsingTaskCoordinator {
    lane: Arc<Lane>,
}

impl Default for ParsingTaskCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ParsingTaskCoordinator {
    pub fn new() -> Self {
        ParsingTaskCoordinator {
            lane: Arc::new(Lane::new()),
        }
    }

    /// Sets (or replaces) the action run before each admitted task.
    pub fn set_prepare_for_parsing_action(&self, action: impl Fn() + Send + Sync + 'static) {
        *self
            .lane
            .prepare_for_parsing
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(action));
    }

    /// Runs `work` once the lane is free, holding it until `work` completes.
    ///
    /// Submitting a primary task invalidates all alternatives waiting for the lane.
    /// Whatever `work` returns, including errors, is handed back unchanged.
    pub async fn parse_route_response<F, Fut, T>(&self, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _permit = self.lane.enter_primary().await;
        trace!("Primary parsing task admitted");
        self.lane.prepare_for_parsing();
        work().await
    }

    /// Runs `work` if no primary task is running or waiting.
    ///
    /// Alternatives submitted while other alternatives are being parsed wait for them,
    /// unless a primary task shows up in the meantime.
    pub async fn parse_alternatives<F, Fut, T>(&self, work: F) -> AlternativesParsingResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let Some(_permit) = self.lane.enter_alternatives().await else {
            debug!("Alternatives parsing skipped, a primary route update takes precedence");
            return AlternativesParsingResult::NotActual;
        };
        trace!("Alternatives parsing task admitted");
        self.lane.prepare_for_parsing();
        AlternativesParsingResult::Parsed(work().await)
    }
}
