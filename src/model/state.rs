//! The domain collaborator: model state, action vocabulary, preconditions,
//! and the random action generator.
//!
//! The core never mutates model state itself. It calls [`StateModel::next_state`]
//! and [`StateModel::advance_to`] when a step is committed, and clones the
//! state into an outcome when it needs a snapshot.

use std::fmt::Debug;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::model::step::{StepAction, Tick, Var};

/// Random source threaded through generation and domain generators.
pub type ScenarioRng = StdRng;

/// Build a deterministic generator from a seed.
#[must_use]
pub fn seeded_rng(seed: u64) -> ScenarioRng {
    StdRng::seed_from_u64(seed)
}

/// A stateful model that scenarios are generated against.
pub trait StateModel: Clone + Debug + 'static {
    /// The model's action vocabulary.
    type Action: Clone + Debug + PartialEq + 'static;

    /// State before any action has been committed.
    fn initial_state() -> Self;

    /// Draw a candidate action. `None` means the generator had nothing to offer
    /// this time; it counts as one failed attempt.
    fn arbitrary_action(&self, rng: &mut ScenarioRng, size: usize) -> Option<Self::Action>;

    /// Guard that must hold for `action` to be emitted from this state.
    fn precondition(&self, _action: &Self::Action) -> bool {
        true
    }

    /// Apply a committed action. `var` is the symbolic reference for its result.
    fn next_state(&mut self, action: &Self::Action, var: Var);

    /// Whether the result of `action` is bound to a reusable reference.
    fn binds_result(&self, _action: &Self::Action) -> bool {
        true
    }

    /// Current model time.
    fn now(&self) -> Tick {
        0
    }

    /// Advance model time to `tick`.
    fn advance_to(&mut self, _tick: Tick) {}
}

/// Whether `action` may be committed from `state`.
///
/// Waits are admissible only when they move time forward.
pub fn admits<M: StateModel>(state: &M, action: &StepAction<M::Action>) -> bool {
    match action {
        StepAction::Domain(action) => state.precondition(action),
        StepAction::WaitUntil(tick) => *tick > state.now(),
    }
}

/// Whether committing `action` from `state` binds its reference.
pub fn binds<M: StateModel>(state: &M, action: &StepAction<M::Action>) -> bool {
    match action {
        StepAction::Domain(action) => state.binds_result(action),
        StepAction::WaitUntil(_) => false,
    }
}

/// Commit `action` to `state`.
pub fn apply<M: StateModel>(state: &mut M, action: &StepAction<M::Action>, var: Var) {
    match action {
        StepAction::Domain(action) => state.next_state(action, var),
        StepAction::WaitUntil(tick) => state.advance_to(*tick),
    }
}
