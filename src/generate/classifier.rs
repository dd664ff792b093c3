//! Outcome classification: the trace under construction and the evidence
//! attached to each of the four outcomes.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::model::outcome::{ModelOutcome, Outcome, OutcomeKind};
use crate::model::state::StateModel;
use crate::model::step::{FailedStep, Step, StepAction, Var, dedup_failures};
use crate::model::witness::WitnessValue;

/// Accumulates the trace during generation or replay and turns it into an
/// outcome. The model state is snapshotted by clone at the moment of
/// classification.
#[derive(Debug)]
pub(crate) struct Classifier<M: StateModel> {
    trace: Vec<Step<M::Action>>,
    actions: usize,
    /// Witnesses committed since the last action.
    witness_run: usize,
}

impl<M: StateModel> Clone for Classifier<M> {
    fn clone(&self) -> Self {
        Self {
            trace: self.trace.clone(),
            actions: self.actions,
            witness_run: self.witness_run,
        }
    }
}

impl<M: StateModel> Classifier<M> {
    pub fn new() -> Self {
        Self {
            trace: Vec::new(),
            actions: 0,
            witness_run: 0,
        }
    }

    /// Do steps committed so far. Witnesses do not count.
    pub fn action_count(&self) -> usize {
        self.actions
    }

    /// Whether either the action count or the current witness run has
    /// passed `bound`.
    pub fn exceeds(&self, bound: usize) -> bool {
        self.actions > bound || self.witness_run > bound
    }

    /// Reference the next committed action will bind.
    pub fn next_var(&self) -> Var {
        Var::for_index(self.actions)
    }

    pub fn commit_action(&mut self, var: Var, action: StepAction<M::Action>, binds: bool) {
        self.trace.push(Step::Do {
            var,
            action,
            binds,
        });
        self.actions += 1;
        self.witness_run = 0;
    }

    pub fn commit_witness(&mut self, value: WitnessValue) {
        self.trace.push(Step::Witness { value });
        self.witness_run += 1;
    }

    pub fn bad_precondition(
        self,
        failures: Vec<FailedStep<M::Action>>,
        state: &M,
    ) -> ModelOutcome<M> {
        Outcome::BadPrecondition {
            trace: self.trace,
            failures: dedup_failures(failures),
            state: state.clone(),
        }
    }

    pub fn looping(self) -> ModelOutcome<M> {
        Outcome::Looping { trace: self.trace }
    }

    pub fn stuck(self, state: &M) -> ModelOutcome<M> {
        Outcome::Stuck {
            trace: self.trace,
            state: state.clone(),
        }
    }

    pub fn script(self) -> ModelOutcome<M> {
        Outcome::Script { trace: self.trace }
    }
}

/// Summary of an outcome, independent of the model's types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub kind: OutcomeKind,
    pub actions: usize,
    pub witnesses: usize,
    pub failures: usize,
    /// Whether a terminal state snapshot is attached.
    pub has_state: bool,
}

impl Evidence {
    #[must_use]
    pub fn of<A, S>(outcome: &Outcome<A, S>) -> Self {
        Self {
            kind: outcome.kind(),
            actions: outcome.action_count(),
            witnesses: outcome.witness_count(),
            failures: outcome.failures().len(),
            has_state: outcome.state().is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::state::ScenarioRng;

    #[derive(Debug, Clone, PartialEq)]
    struct Balance(u64);

    impl StateModel for Balance {
        type Action = u64;

        fn initial_state() -> Self {
            Self(0)
        }

        fn arbitrary_action(&self, _rng: &mut ScenarioRng, _size: usize) -> Option<u64> {
            None
        }

        fn next_state(&mut self, action: &u64, _var: Var) {
            self.0 += action;
        }
    }

    #[test]
    fn witnesses_do_not_advance_numbering() {
        let mut c: Classifier<Balance> = Classifier::new();
        assert_eq!(c.next_var(), Var(1));
        c.commit_witness(WitnessValue::UInt(4));
        assert_eq!(c.next_var(), Var(1));
        c.commit_action(Var(1), StepAction::Domain(10), true);
        assert_eq!(c.action_count(), 1);
        assert_eq!(c.next_var(), Var(2));
    }

    #[test]
    fn bad_precondition_dedups_and_snapshots() {
        let mut c: Classifier<Balance> = Classifier::new();
        c.commit_action(Var(1), StepAction::Domain(100), true);
        let state = Balance(100);
        let outcome = c.bad_precondition(
            vec![
                FailedStep::assertion("low"),
                FailedStep::assertion("low"),
                FailedStep::action(StepAction::Domain(7), true),
            ],
            &state,
        );
        assert_eq!(outcome.failures().len(), 2);
        assert_eq!(outcome.state(), Some(&Balance(100)));

        let evidence = Evidence::of(&outcome);
        assert_eq!(evidence.kind, OutcomeKind::BadPrecondition);
        assert_eq!(evidence.actions, 1);
        assert_eq!(evidence.failures, 2);
        assert!(evidence.has_state);
    }

    #[test]
    fn witness_runs_reset_on_each_action() {
        let mut c: Classifier<Balance> = Classifier::new();
        for n in 0..3 {
            c.commit_witness(WitnessValue::UInt(n));
        }
        assert!(c.exceeds(2));
        assert!(!c.exceeds(3));

        c.commit_action(Var(1), StepAction::Domain(1), true);
        assert!(!c.exceeds(2));
    }

    #[test]
    fn looping_keeps_the_prefix_only() {
        let mut c: Classifier<Balance> = Classifier::new();
        c.commit_action(Var(1), StepAction::WaitUntil(3), false);
        let outcome = c.looping();
        assert_eq!(outcome.trace().len(), 1);
        assert!(!Evidence::of(&outcome).has_state);
    }
}
