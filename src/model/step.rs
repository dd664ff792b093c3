//! Trace vocabulary: symbolic references, steps, and failed steps.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::witness::WitnessValue;

/// Model time, in abstract ticks.
pub type Tick = u64;

/// Symbolic reference standing in for an action's result before execution.
///
/// Generated references are numbered from 1 in commit order; `Var(0)` is the
/// placeholder used for actions that never bound anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Var(pub u32);

impl Var {
    /// Placeholder reference for failed actions.
    pub const PLACEHOLDER: Self = Self(0);

    /// Reference for the `index`-th committed action (zero-based).
    #[must_use]
    pub fn for_index(index: usize) -> Self {
        Self(u32::try_from(index.saturating_add(1)).unwrap_or(u32::MAX))
    }

    /// Whether this is the placeholder reference.
    #[must_use]
    pub const fn is_placeholder(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var{}", self.0)
    }
}

/// What a Do step asks of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction<A> {
    /// An action from the domain vocabulary.
    Domain(A),
    /// Advance model time to the given tick.
    WaitUntil(Tick),
}

impl<A> StepAction<A> {
    /// The domain action, if this is not a wait.
    #[must_use]
    pub const fn domain(&self) -> Option<&A> {
        match self {
            Self::Domain(action) => Some(action),
            Self::WaitUntil(_) => None,
        }
    }

    /// Whether this is a wait-until pseudo-action.
    #[must_use]
    pub const fn is_wait(&self) -> bool {
        matches!(self, Self::WaitUntil(_))
    }
}

impl<A: fmt::Debug> fmt::Display for StepAction<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(action) => write!(f, "{action:?}"),
            Self::WaitUntil(tick) => write!(f, "WaitUntil({tick})"),
        }
    }
}

/// One unit of a scenario trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step<A> {
    /// A committed action.
    Do {
        var: Var,
        action: StepAction<A>,
        /// Whether `var` may be referenced by later actions.
        binds: bool,
    },
    /// A recorded auxiliary random value. Carries no executable effect.
    Witness { value: WitnessValue },
}

impl<A> Step<A> {
    /// A domain action step.
    pub fn act(var: Var, action: A, binds: bool) -> Self {
        Self::Do {
            var,
            action: StepAction::Domain(action),
            binds,
        }
    }

    /// A wait-until step. Waits never bind a reference.
    pub fn wait(var: Var, tick: Tick) -> Self {
        Self::Do {
            var,
            action: StepAction::WaitUntil(tick),
            binds: false,
        }
    }

    /// A witness step.
    pub fn witness(value: WitnessValue) -> Self {
        Self::Witness { value }
    }

    /// Whether this step is an action (as opposed to a witness).
    #[must_use]
    pub const fn is_action(&self) -> bool {
        matches!(self, Self::Do { .. })
    }
}

/// Why one branch of scenario construction failed.
///
/// Equality is used only to deduplicate failures when reporting: it ignores
/// binding metadata, and wait failures compare by target tick alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "failure", rename_all = "snake_case")]
pub enum FailedStep<A> {
    /// An explicitly requested action whose precondition did not hold.
    ActionFailure { action: StepAction<A>, binds: bool },
    /// A scenario-level assertion or explicit failure call.
    AssertionFailure { message: String },
}

impl<A> FailedStep<A> {
    /// Failure of an explicitly requested action.
    pub fn action(action: StepAction<A>, binds: bool) -> Self {
        Self::ActionFailure { action, binds }
    }

    /// Failure of an assertion.
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailure {
            message: message.into(),
        }
    }
}

impl<A: PartialEq> PartialEq for FailedStep<A> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::AssertionFailure { message: a }, Self::AssertionFailure { message: b }) => {
                a == b
            }
            (
                Self::ActionFailure {
                    action: StepAction::WaitUntil(a),
                    ..
                },
                Self::ActionFailure {
                    action: StepAction::WaitUntil(b),
                    ..
                },
            ) => a == b,
            (
                Self::ActionFailure {
                    action: StepAction::Domain(a),
                    ..
                },
                Self::ActionFailure {
                    action: StepAction::Domain(b),
                    ..
                },
            ) => a == b,
            _ => false,
        }
    }
}

/// Drop repeated failures, keeping first occurrences in order.
pub fn dedup_failures<A: PartialEq>(failures: Vec<FailedStep<A>>) -> Vec<FailedStep<A>> {
    let mut unique: Vec<FailedStep<A>> = Vec::with_capacity(failures.len());
    for failure in failures {
        if !unique.contains(&failure) {
            unique.push(failure);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Push(u8),
        Pop,
    }

    #[test]
    fn assertion_failures_compare_by_message() {
        assert_eq!(
            FailedStep::<Op>::assertion("x"),
            FailedStep::<Op>::assertion("x")
        );
        assert_ne!(
            FailedStep::<Op>::assertion("x"),
            FailedStep::<Op>::assertion("y")
        );
    }

    #[test]
    fn wait_failures_compare_by_tick_only() {
        let a = FailedStep::<Op>::action(StepAction::WaitUntil(10), false);
        let b = FailedStep::<Op>::action(StepAction::WaitUntil(10), true);
        let c = FailedStep::<Op>::action(StepAction::WaitUntil(11), false);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn action_failures_ignore_binding() {
        let a = FailedStep::action(StepAction::Domain(Op::Push(1)), true);
        let b = FailedStep::action(StepAction::Domain(Op::Push(1)), false);
        let c = FailedStep::action(StepAction::Domain(Op::Pop), true);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn mixed_failures_never_equal() {
        let action = FailedStep::action(StepAction::Domain(Op::Pop), true);
        let assertion = FailedStep::assertion("Pop");
        let wait = FailedStep::action(StepAction::WaitUntil(0), false);
        assert_ne!(action, assertion);
        assert_ne!(assertion, action);
        assert_ne!(action, wait);
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let failures = vec![
            FailedStep::action(StepAction::Domain(Op::Pop), true),
            FailedStep::assertion("empty"),
            FailedStep::action(StepAction::Domain(Op::Pop), false),
            FailedStep::assertion("empty"),
        ];
        let unique = dedup_failures(failures);
        assert_eq!(unique.len(), 2);
        assert!(matches!(unique[0], FailedStep::ActionFailure { binds: true, .. }));
    }

    #[test]
    fn vars_number_from_one() {
        assert_eq!(Var::for_index(0), Var(1));
        assert_eq!(Var::for_index(4).to_string(), "var5");
        assert!(Var::PLACEHOLDER.is_placeholder());
        assert!(!Var::for_index(0).is_placeholder());
    }
}
