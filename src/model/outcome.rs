//! Generation outcomes: the four disjoint results of one generation attempt.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::state::StateModel;
use crate::model::step::{FailedStep, Step};

/// Which of the four outcomes occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    BadPrecondition,
    Looping,
    Stuck,
    Script,
}

impl OutcomeKind {
    /// All kinds, in reporting order.
    pub const ALL: [Self; 4] = [
        Self::Script,
        Self::BadPrecondition,
        Self::Stuck,
        Self::Looping,
    ];

    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadPrecondition => "bad_precondition",
            Self::Looping => "looping",
            Self::Stuck => "stuck",
            Self::Script => "script",
        }
    }

    /// Parse a snake_case name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }

    /// Whether scenario construction itself went wrong.
    #[must_use]
    pub const fn is_construction_failure(self) -> bool {
        !matches!(self, Self::Script)
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of attempting to generate a scenario.
///
/// `S` is a by-value snapshot of the model state taken at the instant the
/// failure or stuckness was detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome<A, S> {
    /// Some branch required a step whose precondition or assertion failed.
    BadPrecondition {
        trace: Vec<Step<A>>,
        failures: Vec<FailedStep<A>>,
        state: S,
    },
    /// Generation did not terminate within the looping bound.
    Looping { trace: Vec<Step<A>> },
    /// No branch had any viable next step.
    Stuck { trace: Vec<Step<A>>, state: S },
    /// A complete, viable test case.
    Script { trace: Vec<Step<A>> },
}

/// Outcome type for a given model.
pub type ModelOutcome<M> = Outcome<<M as StateModel>::Action, M>;

impl<A, S> Outcome<A, S> {
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::BadPrecondition { .. } => OutcomeKind::BadPrecondition,
            Self::Looping { .. } => OutcomeKind::Looping,
            Self::Stuck { .. } => OutcomeKind::Stuck,
            Self::Script { .. } => OutcomeKind::Script,
        }
    }

    /// The recorded trace (the prefix, for the failing variants).
    #[must_use]
    pub fn trace(&self) -> &[Step<A>] {
        match self {
            Self::BadPrecondition { trace, .. }
            | Self::Looping { trace }
            | Self::Stuck { trace, .. }
            | Self::Script { trace } => trace,
        }
    }

    /// Number of Do steps in the trace.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.trace().iter().filter(|step| step.is_action()).count()
    }

    /// Number of Witness steps in the trace.
    #[must_use]
    pub fn witness_count(&self) -> usize {
        self.trace().len() - self.action_count()
    }

    /// Collected failures; empty unless this is a bad precondition.
    #[must_use]
    pub fn failures(&self) -> &[FailedStep<A>] {
        match self {
            Self::BadPrecondition { failures, .. } => failures,
            _ => &[],
        }
    }

    /// Terminal model state, for the variants that carry one.
    #[must_use]
    pub const fn state(&self) -> Option<&S> {
        match self {
            Self::BadPrecondition { state, .. } | Self::Stuck { state, .. } => Some(state),
            Self::Looping { .. } | Self::Script { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_script(&self) -> bool {
        matches!(self, Self::Script { .. })
    }
}

impl<A, S> Outcome<A, S>
where
    A: Serialize,
    S: Serialize,
{
    /// JSON form, the paste-back format accepted by replay.
    pub fn to_json(&self) -> crate::core::errors::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<A, S> Outcome<A, S>
where
    A: for<'de> Deserialize<'de>,
    S: for<'de> Deserialize<'de>,
{
    /// Parse an outcome previously produced by [`Outcome::to_json`].
    pub fn from_json(raw: &str) -> crate::core::errors::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::step::{StepAction, Var};
    use crate::model::witness::WitnessValue;

    fn sample() -> Outcome<String, u32> {
        Outcome::BadPrecondition {
            trace: vec![
                Step::act(Var(1), "open".to_string(), true),
                Step::witness(WitnessValue::UInt(3)),
            ],
            failures: vec![FailedStep::action(
                StepAction::Domain("close".to_string()),
                true,
            )],
            state: 9,
        }
    }

    #[test]
    fn accessors_report_evidence() {
        let outcome = sample();
        assert_eq!(outcome.kind(), OutcomeKind::BadPrecondition);
        assert_eq!(outcome.action_count(), 1);
        assert_eq!(outcome.witness_count(), 1);
        assert_eq!(outcome.failures().len(), 1);
        assert_eq!(outcome.state(), Some(&9));
        assert!(!outcome.is_script());
    }

    #[test]
    fn looping_and_script_carry_no_state() {
        let looping: Outcome<String, u32> = Outcome::Looping { trace: vec![] };
        let script: Outcome<String, u32> = Outcome::Script { trace: vec![] };
        assert!(looping.state().is_none());
        assert!(script.state().is_none());
        assert!(script.failures().is_empty());
    }

    #[test]
    fn json_round_trip_preserves_outcome() {
        let outcome = sample();
        let json = outcome.to_json().expect("serialize");
        assert!(json.contains("\"kind\": \"bad_precondition\""));
        let back: Outcome<String, u32> = Outcome::from_json(&json).expect("deserialize");
        assert_eq!(back, outcome);
    }

    #[test]
    fn kind_names_parse_back() {
        for kind in OutcomeKind::ALL {
            assert_eq!(OutcomeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(OutcomeKind::parse("nope"), None);
        assert!(OutcomeKind::Stuck.is_construction_failure());
        assert!(!OutcomeKind::Script.is_construction_failure());
    }
}
