//! Step/action mapping between this crate's steps and the runner's generic
//! vocabulary.
//!
//! `lower` turns an outcome into the runner's form; `raise` takes it back.
//! Raising a lowered outcome restores the original up to the placeholder
//! reference on failed actions, which never carried a meaningful one.

pub mod generic;

use serde::{Deserialize, Serialize};

pub use generic::{ActionSequence, ExecEntry, GenericAction, GenericFailure};

use crate::model::outcome::{Outcome, OutcomeKind};
use crate::model::step::{FailedStep, Step, StepAction, Var};

/// An outcome with its trace and failures in the runner's vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoweredOutcome<A, S> {
    BadPrecondition {
        prefix: Vec<ExecEntry<A>>,
        failures: Vec<GenericFailure<A>>,
        state: S,
    },
    Looping {
        prefix: Vec<ExecEntry<A>>,
    },
    Stuck {
        prefix: Vec<ExecEntry<A>>,
        state: S,
    },
    Script {
        entries: Vec<ExecEntry<A>>,
    },
}

impl<A, S> LoweredOutcome<A, S> {
    /// Which outcome this came from.
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::BadPrecondition { .. } => OutcomeKind::BadPrecondition,
            Self::Looping { .. } => OutcomeKind::Looping,
            Self::Stuck { .. } => OutcomeKind::Stuck,
            Self::Script { .. } => OutcomeKind::Script,
        }
    }

    /// Lowered trace or prefix.
    #[must_use]
    pub fn entries(&self) -> &[ExecEntry<A>] {
        match self {
            Self::BadPrecondition { prefix, .. }
            | Self::Looping { prefix }
            | Self::Stuck { prefix, .. } => prefix,
            Self::Script { entries } => entries,
        }
    }
}

impl<A: Clone, S> LoweredOutcome<A, S> {
    /// The executable sequence, for scripts only.
    #[must_use]
    pub fn executable(&self) -> Option<ActionSequence<A>> {
        match self {
            Self::Script { entries } => Some(ActionSequence::from_entries(entries)),
            _ => None,
        }
    }
}

/// Lower one trace step.
pub fn lower_step<A: Clone>(step: &Step<A>) -> ExecEntry<A> {
    match step {
        Step::Do { var, action, binds } => ExecEntry::Action {
            var: *var,
            action: lower_action(action, *binds),
        },
        Step::Witness { value } => ExecEntry::Witness {
            value: value.clone(),
        },
    }
}

fn lower_action<A: Clone>(action: &StepAction<A>, binds: bool) -> GenericAction<A> {
    match action {
        StepAction::Domain(action) => GenericAction::Domain {
            action: action.clone(),
            binds,
        },
        StepAction::WaitUntil(tick) => GenericAction::WaitUntil { tick: *tick },
    }
}

/// Lower one failed step. Failed actions get the placeholder reference.
pub fn lower_failure<A: Clone>(failure: &FailedStep<A>) -> GenericFailure<A> {
    match failure {
        FailedStep::ActionFailure { action, binds } => GenericFailure::Action {
            var: Var::PLACEHOLDER,
            action: lower_action(action, *binds),
        },
        FailedStep::AssertionFailure { message } => GenericFailure::Assertion {
            message: message.clone(),
        },
    }
}

/// Lower a whole trace.
pub fn lower_trace<A: Clone>(trace: &[Step<A>]) -> Vec<ExecEntry<A>> {
    trace.iter().map(lower_step).collect()
}

/// Lower an outcome.
pub fn lower<A: Clone, S: Clone>(outcome: &Outcome<A, S>) -> LoweredOutcome<A, S> {
    match outcome {
        Outcome::BadPrecondition {
            trace,
            failures,
            state,
        } => LoweredOutcome::BadPrecondition {
            prefix: lower_trace(trace),
            failures: failures.iter().map(lower_failure).collect(),
            state: state.clone(),
        },
        Outcome::Looping { trace } => LoweredOutcome::Looping {
            prefix: lower_trace(trace),
        },
        Outcome::Stuck { trace, state } => LoweredOutcome::Stuck {
            prefix: lower_trace(trace),
            state: state.clone(),
        },
        Outcome::Script { trace } => LoweredOutcome::Script {
            entries: lower_trace(trace),
        },
    }
}

fn raise_action<A>(action: GenericAction<A>) -> Option<(StepAction<A>, bool)> {
    match action {
        GenericAction::Domain { action, binds } => Some((StepAction::Domain(action), binds)),
        GenericAction::WaitUntil { tick } => Some((StepAction::WaitUntil(tick), false)),
        GenericAction::Internal { .. } => None,
    }
}

/// Raise one entry. Internal runner entries have no step and yield `None`.
pub fn raise_entry<A>(entry: ExecEntry<A>) -> Option<Step<A>> {
    match entry {
        ExecEntry::Action { var, action } => {
            raise_action(action).map(|(action, binds)| Step::Do { var, action, binds })
        }
        ExecEntry::Witness { value } => Some(Step::Witness { value }),
    }
}

/// Raise one failure. Failures of internal entries yield `None`.
pub fn raise_failure<A>(failure: GenericFailure<A>) -> Option<FailedStep<A>> {
    match failure {
        GenericFailure::Action { action, .. } => {
            raise_action(action).map(|(action, binds)| FailedStep::ActionFailure { action, binds })
        }
        GenericFailure::Assertion { message } => Some(FailedStep::AssertionFailure { message }),
    }
}

fn raise_trace<A>(entries: Vec<ExecEntry<A>>) -> Vec<Step<A>> {
    entries.into_iter().filter_map(raise_entry).collect()
}

/// Raise a lowered outcome back to steps.
pub fn raise<A, S>(lowered: LoweredOutcome<A, S>) -> Outcome<A, S> {
    match lowered {
        LoweredOutcome::BadPrecondition {
            prefix,
            failures,
            state,
        } => Outcome::BadPrecondition {
            trace: raise_trace(prefix),
            failures: failures.into_iter().filter_map(raise_failure).collect(),
            state,
        },
        LoweredOutcome::Looping { prefix } => Outcome::Looping {
            trace: raise_trace(prefix),
        },
        LoweredOutcome::Stuck { prefix, state } => Outcome::Stuck {
            trace: raise_trace(prefix),
            state,
        },
        LoweredOutcome::Script { entries } => Outcome::Script {
            trace: raise_trace(entries),
        },
    }
}

/// The executable sequence of a trace: its Do steps as `(Var, action)` pairs.
pub fn action_sequence<A: Clone>(trace: &[Step<A>]) -> ActionSequence<A> {
    ActionSequence::from_entries(&lower_trace(trace))
}
