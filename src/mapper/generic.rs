//! Generic execution vocabulary consumed by the downstream runner.
//!
//! The runner sees no witnesses inside actions and no scenario structure:
//! only a flat list of `(Var, action)` pairs. `Internal` entries are
//! runner-side bookkeeping with no step counterpart.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::step::{Tick, Var};
use crate::model::witness::WitnessValue;

/// An action in the runner's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenericAction<A> {
    Domain { action: A, binds: bool },
    WaitUntil { tick: Tick },
    Internal { label: String },
}

impl<A> GenericAction<A> {
    #[must_use]
    pub const fn domain(&self) -> Option<&A> {
        match self {
            Self::Domain { action, .. } => Some(action),
            _ => None,
        }
    }

    #[must_use]
    pub const fn binds(&self) -> bool {
        matches!(self, Self::Domain { binds: true, .. })
    }
}

impl<A: fmt::Debug> fmt::Display for GenericAction<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain { action, .. } => write!(f, "{action:?}"),
            Self::WaitUntil { tick } => write!(f, "WaitUntil({tick})"),
            Self::Internal { label } => write!(f, "Internal({label})"),
        }
    }
}

/// One entry of a lowered trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum ExecEntry<A> {
    Action { var: Var, action: GenericAction<A> },
    Witness { value: WitnessValue },
}

/// A lowered failed step. Failed actions never bound anything, so they carry
/// [`Var::PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "failure", rename_all = "snake_case")]
pub enum GenericFailure<A> {
    Action { var: Var, action: GenericAction<A> },
    Assertion { message: String },
}

/// An executable action sequence: the `(Var, action)` pairs of a script with
/// witnesses dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSequence<A> {
    steps: Vec<(Var, GenericAction<A>)>,
}

impl<A> ActionSequence<A> {
    #[must_use]
    pub fn new(steps: Vec<(Var, GenericAction<A>)>) -> Self {
        Self { steps }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Var, GenericAction<A>)> {
        self.steps.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The domain actions, in order, skipping waits and internal entries.
    pub fn domain_actions(&self) -> impl Iterator<Item = &A> {
        self.steps.iter().filter_map(|(_, action)| action.domain())
    }

    /// References later actions may use.
    pub fn bound_vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.steps
            .iter()
            .filter(|(_, action)| action.binds())
            .map(|(var, _)| *var)
    }

    #[must_use]
    pub fn into_steps(self) -> Vec<(Var, GenericAction<A>)> {
        self.steps
    }
}

impl<A: Clone> ActionSequence<A> {
    /// Keep the action entries of a lowered trace.
    #[must_use]
    pub fn from_entries(entries: &[ExecEntry<A>]) -> Self {
        Self::new(
            entries
                .iter()
                .filter_map(|entry| match entry {
                    ExecEntry::Action { var, action } => Some((*var, action.clone())),
                    ExecEntry::Witness { .. } => None,
                })
                .collect(),
        )
    }
}

impl<'a, A> IntoIterator for &'a ActionSequence<A> {
    type Item = &'a (Var, GenericAction<A>);
    type IntoIter = std::slice::Iter<'a, (Var, GenericAction<A>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
