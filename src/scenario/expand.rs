//! Heads normalization.
//!
//! Expanding a scenario against the current state and size yields its flat
//! list of candidate next steps ("heads"), each with its accumulated weight,
//! stopping flag, and monitor hooks. Assertions are evaluated here: a passing
//! one behaves like `done`, a failing one becomes a `Fail` head. Sequencing
//! is resolved by carrying the pending tail down into every branch.

use std::rc::Rc;

use crate::model::state::StateModel;
use crate::model::step::{StepAction, Var};
use crate::model::witness::{WitnessKind, WitnessValue};
use crate::runner::property::MonitorHook;
use crate::scenario::description::{ActionCont, Node, Scenario, WitnessCont, WitnessGen};

/// Nesting limit for one expansion. Exceeding it means the description keeps
/// unfolding without reaching a step, which is reported as looping.
pub const MAX_EXPANSION_DEPTH: usize = 1_000;

/// Expansion ran past [`MAX_EXPANSION_DEPTH`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExpansionOverflow;

pub(crate) enum HeadKind<M: StateModel> {
    Done,
    Fail(String),
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
}

/// One candidate next step.
pub(crate) struct Head<M: StateModel> {
    pub weight: f64,
    pub stopping: bool,
    pub monitors: Vec<MonitorHook>,
    pub kind: HeadKind<M>,
}

impl<M: StateModel> Head<M> {
    pub fn is_done(&self) -> bool {
        matches!(self.kind, HeadKind::Done)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self.kind, HeadKind::Fail(_))
    }

    pub fn is_any_action(&self) -> bool {
        matches!(self.kind, HeadKind::AnyAction { .. })
    }

    pub fn is_for_all(&self) -> bool {
        matches!(self.kind, HeadKind::ForAll { .. })
    }

    /// Whether this head can consume `action` as its next Do step.
    pub fn offers(&self, action: &StepAction<M::Action>) -> bool {
        match &self.kind {
            HeadKind::Action { action: fixed, .. } => fixed == action,
            HeadKind::AnyAction { .. } => action.domain().is_some(),
            _ => false,
        }
    }

    /// Residual scenario after committing an action that bound `var`.
    pub fn resume(&self, var: Var) -> Option<Scenario<M>> {
        match &self.kind {
            HeadKind::Action { next, .. } | HeadKind::AnyAction { next } => Some(next(var)),
            _ => None,
        }
    }

    /// Residual scenario after drawing `value`; `None` on a kind mismatch.
    pub fn resume_witness(&self, value: &WitnessValue) -> Option<Scenario<M>> {
        match &self.kind {
            HeadKind::ForAll { next, .. } => next(value),
            _ => None,
        }
    }

    pub fn witness_kind(&self) -> Option<WitnessKind> {
        match &self.kind {
            HeadKind::ForAll { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

struct Frame<M: StateModel> {
    weight: f64,
    stopping: bool,
    monitors: Vec<MonitorHook>,
    tail: Option<Scenario<M>>,
    depth: usize,
}

impl<M: StateModel> Frame<M> {
    fn root() -> Self {
        Self {
            weight: 1.0,
            stopping: false,
            monitors: Vec::new(),
            tail: None,
            depth: 0,
        }
    }

    fn descend(&self) -> Self {
        Self {
            weight: self.weight,
            stopping: self.stopping,
            monitors: self.monitors.clone(),
            tail: self.tail.clone(),
            depth: self.depth + 1,
        }
    }

    fn head(self, kind: HeadKind<M>) -> Head<M> {
        Head {
            weight: self.weight,
            stopping: self.stopping,
            monitors: self.monitors,
            kind,
        }
    }
}

/// Expand `scenario` into its candidate next steps.
pub(crate) fn expand<M: StateModel>(
    scenario: &Scenario<M>,
    state: &M,
    size: usize,
) -> Result<Vec<Head<M>>, ExpansionOverflow> {
    let mut heads = Vec::new();
    expand_into(scenario, Frame::root(), state, size, &mut heads)?;
    Ok(heads)
}

fn expand_into<M: StateModel>(
    scenario: &Scenario<M>,
    mut frame: Frame<M>,
    state: &M,
    size: usize,
    out: &mut Vec<Head<M>>,
) -> Result<(), ExpansionOverflow> {
    if frame.depth > MAX_EXPANSION_DEPTH {
        return Err(ExpansionOverflow);
    }
    match scenario.node() {
        Node::Done => finish(frame, state, size, out),
        Node::Empty => Ok(()),
        Node::Fail(message) => {
            out.push(frame.head(HeadKind::Fail(message.clone())));
            Ok(())
        }
        Node::Stopping(inner) => {
            let next = Frame {
                stopping: true,
                ..frame.descend()
            };
            expand_into(inner, next, state, size, out)
        }
        Node::Weight(w, inner) => {
            let next = Frame {
                weight: frame.weight * w,
                ..frame.descend()
            };
            expand_into(inner, next, state, size, out)
        }
        Node::Alt(branches) => {
            for branch in branches {
                expand_into(branch, frame.descend(), state, size, out)?;
            }
            Ok(())
        }
        Node::Seq(first, second) => {
            let tail = match frame.tail.take() {
                Some(rest) => second.clone().then(rest),
                None => second.clone(),
            };
            let next = Frame {
                tail: Some(tail),
                ..frame.descend()
            };
            expand_into(first, next, state, size, out)
        }
        Node::Action { action, next } => {
            let next = chain(next, frame.tail.take());
            out.push(frame.head(HeadKind::Action {
                action: action.clone(),
                next,
            }));
            Ok(())
        }
        Node::AnyAction { next } => {
            let next = chain(next, frame.tail.take());
            out.push(frame.head(HeadKind::AnyAction { next }));
            Ok(())
        }
        Node::ForAll {
            kind,
            generate,
            next,
        } => {
            let next = chain_witness(next, frame.tail.take());
            out.push(frame.head(HeadKind::ForAll {
                kind: *kind,
                generate: Rc::clone(generate),
                next,
            }));
            Ok(())
        }
        Node::Assert { message, predicate } => {
            if predicate(state) {
                finish(frame, state, size, out)
            } else {
                out.push(frame.head(HeadKind::Fail(message.clone())));
                Ok(())
            }
        }
        Node::WithState(build) => expand_into(&build(state), frame.descend(), state, size, out),
        Node::WithSize(build) => expand_into(&build(size), frame.descend(), state, size, out),
        Node::Defer(build) => expand_into(&build(), frame.descend(), state, size, out),
        Node::Monitor(hook) => {
            frame.monitors.push(Rc::clone(hook));
            finish(frame, state, size, out)
        }
    }
}

/// The current sub-scenario ended: continue with the pending tail, or emit Done.
fn finish<M: StateModel>(
    mut frame: Frame<M>,
    state: &M,
    size: usize,
    out: &mut Vec<Head<M>>,
) -> Result<(), ExpansionOverflow> {
    match frame.tail.take() {
        Some(tail) => expand_into(&tail, frame.descend(), state, size, out),
        None => {
            out.push(frame.head(HeadKind::Done));
            Ok(())
        }
    }
}

fn chain<M: StateModel>(next: &ActionCont<M>, tail: Option<Scenario<M>>) -> ActionCont<M> {
    match tail {
        None => Rc::clone(next),
        Some(tail) => {
            let next = Rc::clone(next);
            Rc::new(move |var| next(var).then(tail.clone()))
        }
    }
}

fn chain_witness<M: StateModel>(
    next: &WitnessCont<M>,
    tail: Option<Scenario<M>>,
) -> WitnessCont<M> {
    match tail {
        None => Rc::clone(next),
        Some(tail) => {
            let next = Rc::clone(next);
            Rc::new(move |value| next(value).map(|s| s.then(tail.clone())))
        }
    }
}
