//! Deterministic replay of a captured outcome against a scenario.
//!
//! Replay walks the captured trace step by step, re-injecting each recorded
//! witness and action into the residual scenario instead of drawing at
//! random. When the trace ends, the same pass order as generation decides
//! the classification, with the only choice left being whether Done is
//! offered. No randomness is consumed.
//!
//! A recorded step can match several branches (two alternatives offering
//! the same action, or a fixed action also produced by a random one). Each
//! matching branch is followed in order; the first one that reproduces the
//! captured classification wins, so an unchanged model always replays to
//! the same outcome kind.
//!
//! Size decides the phase and the looping bound at the end of the trace.
//! [`replay_outcome`] replays at a known size; [`replay_captured`] handles
//! captures whose size was not kept by also trying the sizes the trace
//! itself implies.

use tracing::{debug, warn};

use crate::core::errors::{Result, ScenarioError};
use crate::generate::chooser::{Pick, TerminalChooser};
use crate::generate::classifier::Classifier;
use crate::generate::search::{Generated, Phase, Selection, looping_bound, select_step, target_length};
use crate::model::outcome::{ModelOutcome, OutcomeKind};
use crate::model::state::{StateModel, admits, apply};
use crate::model::step::{FailedStep, Step, StepAction, Var};
use crate::model::witness::WitnessValue;
use crate::runner::property::MonitorHook;
use crate::scenario::Scenario;
use crate::scenario::expand::{Head, expand};

/// Residual scenario plus the monitors its branch collected.
type Branch<M> = (Scenario<M>, Vec<MonitorHook>);

struct ReplayContext<'c, M: StateModel> {
    captured: &'c ModelOutcome<M>,
    size: usize,
    target: usize,
    bound: usize,
}

struct Cursor<M: StateModel> {
    current: Scenario<M>,
    state: M,
    classifier: Classifier<M>,
    monitors: Vec<MonitorHook>,
}

impl<M: StateModel> Clone for Cursor<M> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
            state: self.state.clone(),
            classifier: self.classifier.clone(),
            monitors: self.monitors.clone(),
        }
    }
}

/// Replay `captured` against `scenario` at `size`.
///
/// Fails with [`ScenarioError::WitnessMismatch`] when a recorded witness has
/// the wrong type for the draw it feeds, and with
/// [`ScenarioError::ReplayDiverged`] when a recorded step is not offered by
/// the scenario at all.
pub fn replay_outcome<M: StateModel>(
    scenario: &Scenario<M>,
    captured: &ModelOutcome<M>,
    size: usize,
) -> Result<Generated<M>> {
    let target = target_length(size);
    let ctx = ReplayContext {
        captured,
        size,
        target,
        bound: looping_bound(target),
    };
    let cursor = Cursor {
        current: scenario.clone(),
        state: M::initial_state(),
        classifier: Classifier::new(),
        monitors: Vec::new(),
    };
    let replayed = replay_from(&ctx, cursor, 0)?;
    if replayed.outcome.kind() == captured.kind() {
        debug!(kind = %captured.kind(), steps = captured.trace().len(), "outcome replayed");
    } else {
        warn!(
            captured = %captured.kind(),
            replayed = %replayed.outcome.kind(),
            "replay classified the trace differently"
        );
    }
    Ok(replayed)
}

/// Replay `captured` when the size it was generated at is unknown, returning
/// the replay and the size it ran at.
///
/// `size` is tried first. If that does not reproduce the captured
/// classification, the sizes consistent with the trace are tried: the one
/// whose looping bound a looping capture just passed, otherwise the sizes
/// that end the trace in the stopping and in the growing phase. When none
/// reproduces it, the replay at `size` is returned, error included.
pub fn replay_captured<M: StateModel>(
    scenario: &Scenario<M>,
    captured: &ModelOutcome<M>,
    size: usize,
) -> Result<(Generated<M>, usize)> {
    let first = replay_outcome(scenario, captured, size);
    if matches!(&first, Ok(replayed) if replayed.outcome.kind() == captured.kind()) {
        return first.map(|replayed| (replayed, size));
    }
    for candidate in implied_sizes(captured) {
        if candidate == size {
            continue;
        }
        if let Ok(replayed) = replay_outcome(scenario, captured, candidate) {
            if replayed.outcome.kind() == captured.kind() {
                debug!(size = candidate, "capture size recovered from the trace");
                return Ok((replayed, candidate));
            }
        }
    }
    first.map(|replayed| (replayed, size))
}

/// Sizes at which generation could have produced `captured`'s ending.
fn implied_sizes<M: StateModel>(captured: &ModelOutcome<M>) -> Vec<usize> {
    let actions = captured.action_count();
    if captured.kind() != OutcomeKind::Looping {
        return vec![actions, actions + 1];
    }
    let trailing_witnesses = captured
        .trace()
        .iter()
        .rev()
        .take_while(|step| !step.is_action())
        .count();
    [actions, trailing_witnesses]
        .into_iter()
        .filter_map(|count| {
            let bound = count.checked_sub(1)?;
            let target = bound.checked_sub(looping_bound(0))? / 2;
            (looping_bound(target) == bound).then_some(target)
        })
        .collect()
}

fn replay_from<M: StateModel>(
    ctx: &ReplayContext<'_, M>,
    mut cursor: Cursor<M>,
    start: usize,
) -> Result<Generated<M>> {
    let trace = ctx.captured.trace();
    for (index, step) in trace.iter().enumerate().skip(start) {
        let heads = expand(&cursor.current, &cursor.state, ctx.size).map_err(|_| {
            diverged(index, "scenario kept unfolding without offering a step")
        })?;
        let mut branches = match step {
            Step::Witness { value } => {
                let branches = witness_branches(&heads, value, index)?;
                cursor.classifier.commit_witness(value.clone());
                branches
            }
            Step::Do { var, action, binds } => {
                let expected = cursor.classifier.next_var();
                if *var != expected {
                    return Err(diverged(
                        index,
                        format!("recorded {var} where {expected} was due"),
                    ));
                }
                let branches = action_branches(&heads, action, *var, index)?;
                if !admits(&cursor.state, action) {
                    let failure = FailedStep::action(action.clone(), *binds);
                    let outcome = cursor.classifier.bad_precondition(vec![failure], &cursor.state);
                    return Ok(Generated::new(outcome, cursor.monitors));
                }
                apply(&mut cursor.state, action, *var);
                cursor.classifier.commit_action(*var, action.clone(), *binds);
                branches
            }
        };
        if branches.len() > 1 {
            return explore(ctx, &cursor, branches, index + 1);
        }
        let Some((next, monitors)) = branches.pop() else {
            return Err(diverged(index, "no branch left to follow"));
        };
        cursor.monitors.extend(monitors);
        cursor.current = next;
    }
    Ok(classify_end(ctx, cursor))
}

/// Follow each ambiguous branch; prefer the first that reproduces the
/// captured classification, then any successful replay, then the first error.
fn explore<M: StateModel>(
    ctx: &ReplayContext<'_, M>,
    cursor: &Cursor<M>,
    branches: Vec<Branch<M>>,
    resume_at: usize,
) -> Result<Generated<M>> {
    let mut fallback: Option<Result<Generated<M>>> = None;
    for (next, monitors) in branches {
        let mut branch = cursor.clone();
        branch.monitors.extend(monitors);
        branch.current = next;
        let result = replay_from(ctx, branch, resume_at);
        match &result {
            Ok(replayed) if replayed.outcome.kind() == ctx.captured.kind() => return result,
            Ok(_) if !matches!(fallback, Some(Ok(_))) => fallback = Some(result),
            Err(_) if fallback.is_none() => fallback = Some(result),
            _ => {}
        }
    }
    fallback.unwrap_or_else(|| Err(diverged(resume_at, "no branch left to follow")))
}

fn witness_branches<M: StateModel>(
    heads: &[Head<M>],
    value: &WitnessValue,
    index: usize,
) -> Result<Vec<Branch<M>>> {
    let draws: Vec<&Head<M>> = heads.iter().filter(|head| head.is_for_all()).collect();
    let Some(first) = draws.first() else {
        return Err(diverged(
            index,
            format!("trace records witness {value} but the scenario draws nothing here"),
        ));
    };
    let branches: Vec<Branch<M>> = draws
        .iter()
        .filter_map(|head| {
            head.resume_witness(value)
                .map(|next| (next, head.monitors.clone()))
        })
        .collect();
    if branches.is_empty() {
        let expected = first.witness_kind().unwrap_or(value.kind());
        return Err(ScenarioError::WitnessMismatch {
            index,
            expected,
            found: value.kind(),
        });
    }
    Ok(branches)
}

fn action_branches<M: StateModel>(
    heads: &[Head<M>],
    action: &StepAction<M::Action>,
    var: Var,
    index: usize,
) -> Result<Vec<Branch<M>>> {
    let branches: Vec<Branch<M>> = heads
        .iter()
        .filter(|head| head.offers(action))
        .filter_map(|head| head.resume(var).map(|next| (next, head.monitors.clone())))
        .collect();
    if branches.is_empty() {
        return Err(diverged(
            index,
            format!("no branch offers {action} at this point"),
        ));
    }
    Ok(branches)
}

/// Decide the classification once the recorded trace is exhausted.
fn classify_end<M: StateModel>(ctx: &ReplayContext<'_, M>, mut cursor: Cursor<M>) -> Generated<M> {
    if cursor.classifier.exceeds(ctx.bound) {
        return Generated::new(cursor.classifier.looping(), cursor.monitors);
    }
    let Ok(heads) = expand(&cursor.current, &cursor.state, ctx.size) else {
        return Generated::new(cursor.classifier.looping(), cursor.monitors);
    };
    let phase = Phase::at(cursor.classifier.action_count(), ctx.target);
    let outcome = match select_step(&heads, phase, &cursor.state, ctx.size, &mut TerminalChooser) {
        Selection::Bad(failures) => cursor.classifier.bad_precondition(failures, &cursor.state),
        Selection::Picked(Pick::Stop(head)) => {
            cursor.monitors.extend(head.monitors.iter().cloned());
            cursor.classifier.script()
        }
        Selection::Picked(_) | Selection::Exhausted => cursor.classifier.stuck(&cursor.state),
    };
    Generated::new(outcome, cursor.monitors)
}

fn diverged(index: usize, details: impl Into<String>) -> ScenarioError {
    ScenarioError::ReplayDiverged {
        index,
        details: details.into(),
    }
}
