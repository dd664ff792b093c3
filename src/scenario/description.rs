//! Scenario descriptions: composable, nondeterministic programs over a model.
//!
//! A [`Scenario`] is an immutable tree. Leaves end a branch ([`done`],
//! [`empty`], [`fail`]); inner nodes choose ([`choose`]), annotate
//! ([`weight`], [`stopping`]), sequence ([`Scenario::then`]), or suspend on a
//! value only known during generation (an action's [`Var`], a witness, the
//! model state, the size). Those suspensions are closures, so recursive
//! descriptions such as [`any_actions`] stay finite until they are expanded.
//!
//! ```rust,no_run
//! use dynamic_scenarios::scenario::*;
//! # use dynamic_scenarios::model::state::{ScenarioRng, StateModel};
//! # use dynamic_scenarios::model::step::Var;
//! # #[derive(Debug, Clone)] struct Bank { balance: u64 }
//! # #[derive(Debug, Clone, PartialEq)] enum Op { Deposit(u64), Withdraw(u64) }
//! # impl StateModel for Bank {
//! #     type Action = Op;
//! #     fn initial_state() -> Self { Bank { balance: 0 } }
//! #     fn arbitrary_action(&self, _: &mut ScenarioRng, _: usize) -> Option<Op> { None }
//! #     fn next_state(&mut self, _: &Op, _: Var) {}
//! # }
//! let scenario: Scenario<Bank> = action(Op::Deposit(100))
//!     .then(any_actions_default())
//!     .then(assert_model("balance positive", |bank: &Bank| bank.balance > 0));
//! ```

#![allow(clippy::cast_precision_loss)]

use std::fmt;
use std::rc::Rc;

use crate::model::state::{ScenarioRng, StateModel};
use crate::model::step::{StepAction, Tick, Var};
use crate::model::witness::{Witness, WitnessKind, WitnessValue};
use crate::runner::property::{MonitorHook, TestResult};

/// Continuation receiving the reference bound by a committed action.
pub(crate) type ActionCont<M> = Rc<dyn Fn(Var) -> Scenario<M>>;
/// Auxiliary generator, already lowered to witness values.
pub(crate) type WitnessGen = Rc<dyn Fn(&mut ScenarioRng, usize) -> WitnessValue>;
/// Continuation receiving a witness; `None` when the value has the wrong type.
pub(crate) type WitnessCont<M> = Rc<dyn Fn(&WitnessValue) -> Option<Scenario<M>>>;

pub(crate) enum Node<M: StateModel> {
    Done,
    Empty,
    Fail(String),
    Stopping(Scenario<M>),
    Weight(f64, Scenario<M>),
    Alt(Vec<Scenario<M>>),
    Seq(Scenario<M>, Scenario<M>),
    Action {
        action: StepAction<M::Action>,
        next: ActionCont<M>,
    },
    AnyAction {
        next: ActionCont<M>,
    },
    ForAll {
        kind: WitnessKind,
        generate: WitnessGen,
        next: WitnessCont<M>,
    },
    Assert {
        message: String,
        predicate: Rc<dyn Fn(&M) -> bool>,
    },
    WithState(Rc<dyn Fn(&M) -> Scenario<M>>),
    WithSize(Rc<dyn Fn(usize) -> Scenario<M>>),
    Defer(Rc<dyn Fn() -> Scenario<M>>),
    Monitor(MonitorHook),
}

/// A scenario description for model `M`. Cheap to clone.
pub struct Scenario<M: StateModel> {
    node: Rc<Node<M>>,
}

impl<M: StateModel> Clone for Scenario<M> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
        }
    }
}

impl<M: StateModel> fmt::Debug for Scenario<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.node.as_ref() {
            Node::Done => "Done".to_string(),
            Node::Empty => "Empty".to_string(),
            Node::Fail(message) => format!("Fail({message:?})"),
            Node::Stopping(_) => "Stopping(..)".to_string(),
            Node::Weight(w, _) => format!("Weight({w}, ..)"),
            Node::Alt(branches) => format!("Alt({} branches)", branches.len()),
            Node::Seq(..) => "Seq(..)".to_string(),
            Node::Action { action, .. } => format!("Action({action})"),
            Node::AnyAction { .. } => "AnyAction".to_string(),
            Node::ForAll { kind, .. } => format!("ForAll({kind})"),
            Node::Assert { message, .. } => format!("Assert({message:?})"),
            Node::WithState(_) => "WithState(..)".to_string(),
            Node::WithSize(_) => "WithSize(..)".to_string(),
            Node::Defer(_) => "Defer(..)".to_string(),
            Node::Monitor(_) => "Monitor(..)".to_string(),
        };
        write!(f, "Scenario::{label}")
    }
}

impl<M: StateModel> Scenario<M> {
    fn from_node(node: Node<M>) -> Self {
        Self {
            node: Rc::new(node),
        }
    }

    pub(crate) fn node(&self) -> &Node<M> {
        &self.node
    }

    /// Run `self`, then `next` on every branch that ends successfully.
    #[must_use]
    pub fn then(self, next: Self) -> Self {
        Self::from_node(Node::Seq(self, next))
    }

    /// Offer `other` as an alternative to `self`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        choose(vec![self, other])
    }

    /// Scale this branch's selection weight.
    #[must_use]
    pub fn weighted(self, w: f64) -> Self {
        weight(w, self)
    }
}

// ──────────────────── endings ────────────────────

/// End the branch successfully.
#[must_use]
pub fn done<M: StateModel>() -> Scenario<M> {
    Scenario::from_node(Node::Done)
}

/// A branch with no viable continuation.
#[must_use]
pub fn empty<M: StateModel>() -> Scenario<M> {
    Scenario::from_node(Node::Empty)
}

/// Explicit failure; reported as an assertion failure carrying `message`.
#[must_use]
pub fn fail<M: StateModel>(message: impl Into<String>) -> Scenario<M> {
    Scenario::from_node(Node::Fail(message.into()))
}

// ──────────────────── actions ────────────────────

/// Require exactly `action`. The branch fails if its precondition does not hold.
#[must_use]
pub fn action<M: StateModel>(action: M::Action) -> Scenario<M> {
    action_then(action, |_| done())
}

/// Require exactly `action`, then continue with the reference it bound.
pub fn action_then<M, F>(action: M::Action, next: F) -> Scenario<M>
where
    M: StateModel,
    F: Fn(Var) -> Scenario<M> + 'static,
{
    Scenario::from_node(Node::Action {
        action: StepAction::Domain(action),
        next: Rc::new(next),
    })
}

/// Require advancing model time to `tick`.
#[must_use]
pub fn wait_until<M: StateModel>(tick: Tick) -> Scenario<M> {
    Scenario::from_node(Node::Action {
        action: StepAction::WaitUntil(tick),
        next: Rc::new(|_| done()),
    })
}

/// One precondition-satisfying action from the domain's generator.
#[must_use]
pub fn any_action<M: StateModel>() -> Scenario<M> {
    any_action_then(|_| done())
}

/// One random action, then continue with the reference it bound.
pub fn any_action_then<M, F>(next: F) -> Scenario<M>
where
    M: StateModel,
    F: Fn(Var) -> Scenario<M> + 'static,
{
    Scenario::from_node(Node::AnyAction {
        next: Rc::new(next),
    })
}

/// A random number of random actions, around `n` in expectation.
///
/// Each round either stops (preferred once the target length is reached),
/// ends with weight 1, or continues with weight `n`.
#[must_use]
pub fn any_actions<M: StateModel>(n: usize) -> Scenario<M> {
    choose(vec![
        stopping(),
        done(),
        weight(n as f64, any_action_then(move |_| any_actions(n))),
    ])
}

/// [`any_actions`] with `n` taken from the size: half of it, at least 1.
#[must_use]
pub fn any_actions_default<M: StateModel>() -> Scenario<M> {
    get_size(|size| any_actions((size / 2).max(1)))
}

// ──────────────────── choice ────────────────────

/// Marker leading a branch that generation prefers once it should stop.
#[must_use]
pub fn stopping<M: StateModel>() -> Scenario<M> {
    Scenario::from_node(Node::Stopping(done()))
}

/// Relative selection weight of a choice alternative (default 1).
///
/// Only effective as the outermost modifier of an alternative, before any
/// action or witness in it.
#[must_use]
pub fn weight<M: StateModel>(w: f64, branch: Scenario<M>) -> Scenario<M> {
    Scenario::from_node(Node::Weight(w, branch))
}

/// Choose between alternatives. An empty choice has no viable branch.
#[must_use]
pub fn choose<M: StateModel>(branches: Vec<Scenario<M>>) -> Scenario<M> {
    Scenario::from_node(Node::Alt(branches))
}

/// Choose between two alternatives.
#[must_use]
pub fn alt<M: StateModel>(left: Scenario<M>, right: Scenario<M>) -> Scenario<M> {
    choose(vec![left, right])
}

// ──────────────────── observation ────────────────────

/// Fail with `message` if `predicate` is false for the current model state.
/// A passing assertion adds nothing to the trace.
pub fn assert_model<M, P>(message: impl Into<String>, predicate: P) -> Scenario<M>
where
    M: StateModel,
    P: Fn(&M) -> bool + 'static,
{
    Scenario::from_node(Node::Assert {
        message: message.into(),
        predicate: Rc::new(predicate),
    })
}

/// Continue with a scenario built from the current model state.
pub fn with_state<M, F>(next: F) -> Scenario<M>
where
    M: StateModel,
    F: Fn(&M) -> Scenario<M> + 'static,
{
    Scenario::from_node(Node::WithState(Rc::new(next)))
}

/// Continue with a scenario built from the size parameter.
pub fn get_size<M, F>(next: F) -> Scenario<M>
where
    M: StateModel,
    F: Fn(usize) -> Scenario<M> + 'static,
{
    Scenario::from_node(Node::WithSize(Rc::new(next)))
}

/// Draw a value with the scenario's own generator and record it as a witness.
pub fn for_all<M, T, G, F>(generate: G, next: F) -> Scenario<M>
where
    M: StateModel,
    T: Witness + 'static,
    G: Fn(&mut ScenarioRng, usize) -> T + 'static,
    F: Fn(T) -> Scenario<M> + 'static,
{
    Scenario::from_node(Node::ForAll {
        kind: T::KIND,
        generate: Rc::new(move |rng, size| generate(rng, size).into_witness()),
        next: Rc::new(move |value| T::from_witness(value).map(&next)),
    })
}

/// Build the scenario lazily, each time it is reached.
pub fn defer<M, F>(build: F) -> Scenario<M>
where
    M: StateModel,
    F: Fn() -> Scenario<M> + 'static,
{
    Scenario::from_node(Node::Defer(Rc::new(build)))
}

/// Attach a statistics hook, applied to the checking property's result when
/// generation takes this branch.
pub fn monitor<M, H>(hook: H) -> Scenario<M>
where
    M: StateModel,
    H: Fn(TestResult) -> TestResult + 'static,
{
    Scenario::from_node(Node::Monitor(Rc::new(hook)))
}

/// Monitor hook that adds `label` to the result.
#[must_use]
pub fn label<M: StateModel>(label: impl Into<String>) -> Scenario<M> {
    let label = label.into();
    monitor(move |result: TestResult| result.with_label(label.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Counter(u32);

    impl StateModel for Counter {
        type Action = u32;

        fn initial_state() -> Self {
            Self(0)
        }

        fn arbitrary_action(&self, _rng: &mut ScenarioRng, _size: usize) -> Option<u32> {
            Some(1)
        }

        fn next_state(&mut self, action: &u32, _var: Var) {
            self.0 += action;
        }
    }

    #[test]
    fn combinators_build_expected_nodes() {
        let s: Scenario<Counter> = action(3).then(done());
        assert!(matches!(s.node(), Node::Seq(..)));

        let w: Scenario<Counter> = any_action().weighted(2.5);
        assert!(matches!(w.node(), Node::Weight(x, _) if (*x - 2.5).abs() < f64::EPSILON));

        let c: Scenario<Counter> = done().or(fail("no"));
        assert!(matches!(c.node(), Node::Alt(branches) if branches.len() == 2));
    }

    #[test]
    fn any_actions_is_lazy() {
        // Constructing an unbounded description must not recurse.
        let s: Scenario<Counter> = any_actions(1_000_000);
        assert!(matches!(s.node(), Node::Alt(branches) if branches.len() == 3));
    }

    #[test]
    fn for_all_rejects_wrong_witness_kind() {
        let s: Scenario<Counter> = for_all(|_, _| 5u32, action);
        let Node::ForAll { kind, next, .. } = s.node() else {
            panic!("expected ForAll node");
        };
        assert_eq!(*kind, WitnessKind::UInt);
        assert!(next(&WitnessValue::UInt(5)).is_some());
        assert!(next(&WitnessValue::Bool(true)).is_none());
    }

    #[test]
    fn debug_names_the_node() {
        let s: Scenario<Counter> = wait_until(10);
        assert_eq!(format!("{s:?}"), "Scenario::Action(WaitUntil(10))");
        let f: Scenario<Counter> = fail("boom");
        assert_eq!(format!("{f:?}"), "Scenario::Fail(\"boom\")");
    }
}
