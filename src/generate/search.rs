//! The generation search loop.
//!
//! Each iteration expands the residual scenario into heads and walks four
//! candidate passes in a fixed fallback order: preferred heads, preferred
//! without random actions, all heads, all without random actions. The first
//! pass that has candidates either reports their failures or hands them to
//! the chooser; a pass that yields nothing falls through to the next one.
//!
//! "Preferred" depends on the phase. While growing, stopping-flagged heads
//! are set aside. Once the target length is reached, only stopping-flagged
//! heads plus Done and Fail heads are preferred.

use tracing::debug;

use crate::generate::chooser::{Pick, RandomChooser, StepChooser};
use crate::generate::classifier::{Classifier, Evidence};
use crate::model::outcome::ModelOutcome;
use crate::model::state::{ScenarioRng, StateModel, admits, apply, binds};
use crate::model::step::FailedStep;
use crate::runner::property::MonitorHook;
use crate::scenario::Scenario;
use crate::scenario::expand::{Head, HeadKind, expand};

/// Number of Do steps generation aims for at a given size.
#[must_use]
pub const fn target_length(size: usize) -> usize {
    size
}

/// Generation is looping once the Do count exceeds this bound, or once more
/// than this many witnesses are drawn without an action in between.
#[must_use]
pub const fn looping_bound(target: usize) -> usize {
    target.saturating_mul(2).saturating_add(20)
}

/// Whether generation should still grow the scenario or try to end it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Growing,
    Stopping,
}

impl Phase {
    pub fn at(action_count: usize, target: usize) -> Self {
        if action_count >= target {
            Self::Stopping
        } else {
            Self::Growing
        }
    }

    fn prefers<M: StateModel>(self, head: &Head<M>) -> bool {
        match self {
            Self::Growing => !head.stopping,
            Self::Stopping => head.stopping || head.is_done() || head.is_fail(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Preferred,
    PreferredWithoutAny,
    All,
    AllWithoutAny,
}

impl Pass {
    const ORDER: [Self; 4] = [
        Self::Preferred,
        Self::PreferredWithoutAny,
        Self::All,
        Self::AllWithoutAny,
    ];

    fn admits<M: StateModel>(self, head: &Head<M>, phase: Phase) -> bool {
        match self {
            Self::Preferred => phase.prefers(head),
            Self::PreferredWithoutAny => phase.prefers(head) && !head.is_any_action(),
            Self::All => true,
            Self::AllWithoutAny => !head.is_any_action(),
        }
    }
}

pub(crate) enum Selection<'h, M: StateModel> {
    /// The first pass with candidates contained failing branches.
    Bad(Vec<FailedStep<M::Action>>),
    Picked(Pick<'h, M>),
    /// Every pass was empty or yielded nothing.
    Exhausted,
}

/// Walk the passes over `heads` and select the next step.
pub(crate) fn select_step<'h, M, C>(
    heads: &'h [Head<M>],
    phase: Phase,
    state: &M,
    size: usize,
    chooser: &mut C,
) -> Selection<'h, M>
where
    M: StateModel,
    C: StepChooser<M>,
{
    for pass in Pass::ORDER {
        let candidates: Vec<&Head<M>> = heads
            .iter()
            .filter(|head| head.weight > 0.0 && pass.admits(head, phase))
            .collect();
        if candidates.is_empty() {
            continue;
        }
        let failures = failures_among(&candidates, state);
        if !failures.is_empty() {
            return Selection::Bad(failures);
        }
        if let Some(pick) = chooser.choose(&candidates, state, size) {
            return Selection::Picked(pick);
        }
    }
    Selection::Exhausted
}

/// Failing fixed actions and Fail heads among `candidates`, in head order.
fn failures_among<M: StateModel>(candidates: &[&Head<M>], state: &M) -> Vec<FailedStep<M::Action>> {
    candidates
        .iter()
        .filter_map(|head| match &head.kind {
            HeadKind::Fail(message) => Some(FailedStep::assertion(message.clone())),
            HeadKind::Action { action, .. } if !admits(state, action) => {
                Some(FailedStep::action(action.clone(), binds(state, action)))
            }
            _ => None,
        })
        .collect()
}

/// The result of one generation attempt.
pub struct Generated<M: StateModel> {
    pub outcome: ModelOutcome<M>,
    pub evidence: Evidence,
    /// Monitor hooks of the branches taken, in the order they were reached.
    pub monitors: Vec<MonitorHook>,
}

impl<M: StateModel> Generated<M> {
    pub(crate) fn new(outcome: ModelOutcome<M>, monitors: Vec<MonitorHook>) -> Self {
        Self {
            evidence: Evidence::of(&outcome),
            outcome,
            monitors,
        }
    }
}

impl<M: StateModel> std::fmt::Debug for Generated<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generated")
            .field("outcome", &self.outcome)
            .field("evidence", &self.evidence)
            .field("monitors", &self.monitors.len())
            .finish()
    }
}

/// Generate one outcome from `scenario` at `size`, drawing from `rng`.
pub fn generate<M: StateModel>(
    scenario: &Scenario<M>,
    size: usize,
    rng: &mut ScenarioRng,
) -> Generated<M> {
    let target = target_length(size);
    let bound = looping_bound(target);
    let mut state = M::initial_state();
    let mut current = scenario.clone();
    let mut classifier: Classifier<M> = Classifier::new();
    let mut monitors: Vec<MonitorHook> = Vec::new();
    let mut chooser = RandomChooser::new(rng);

    let outcome = loop {
        if classifier.exceeds(bound) {
            break classifier.looping();
        }
        let Ok(heads) = expand(&current, &state, size) else {
            break classifier.looping();
        };
        let phase = Phase::at(classifier.action_count(), target);
        match select_step(&heads, phase, &state, size, &mut chooser) {
            Selection::Bad(failures) => break classifier.bad_precondition(failures, &state),
            Selection::Exhausted => break classifier.stuck(&state),
            Selection::Picked(Pick::Stop(head)) => {
                monitors.extend(head.monitors.iter().cloned());
                break classifier.script();
            }
            Selection::Picked(Pick::Act { head, action }) => {
                let var = classifier.next_var();
                let bound_var = binds(&state, &action);
                apply(&mut state, &action, var);
                monitors.extend(head.monitors.iter().cloned());
                let Some(next) = head.resume(var) else {
                    break classifier.stuck(&state);
                };
                classifier.commit_action(var, action, bound_var);
                current = next;
            }
            Selection::Picked(Pick::Witness { head, value }) => {
                monitors.extend(head.monitors.iter().cloned());
                let Some(next) = head.resume_witness(&value) else {
                    break classifier.stuck(&state);
                };
                classifier.commit_witness(value);
                current = next;
            }
        }
    };

    debug!(
        kind = %outcome.kind(),
        actions = outcome.action_count(),
        witnesses = outcome.witness_count(),
        size,
        "scenario generated"
    );
    Generated::new(outcome, monitors)
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;
    use crate::generate::chooser::TerminalChooser;
    use crate::model::outcome::OutcomeKind;
    use crate::model::state::seeded_rng;
    use crate::model::step::{Step, StepAction, Var};
    use crate::scenario::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Gauge {
        level: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Raise(u32),
        Lower(u32),
    }

    impl StateModel for Gauge {
        type Action = Op;

        fn initial_state() -> Self {
            Self::default()
        }

        fn arbitrary_action(&self, rng: &mut ScenarioRng, _size: usize) -> Option<Op> {
            Some(Op::Raise(rng.random_range(1..5)))
        }

        fn precondition(&self, action: &Op) -> bool {
            match action {
                Op::Raise(_) => true,
                Op::Lower(n) => *n <= self.level,
            }
        }

        fn next_state(&mut self, action: &Op, _var: Var) {
            match action {
                Op::Raise(n) => self.level += n,
                Op::Lower(n) => self.level -= n,
            }
        }
    }

    fn run(s: &Scenario<Gauge>, size: usize, seed: u64) -> ModelOutcome<Gauge> {
        generate(s, size, &mut seeded_rng(seed)).outcome
    }

    #[test]
    fn bounds_follow_size() {
        assert_eq!(target_length(30), 30);
        assert_eq!(looping_bound(0), 20);
        assert_eq!(looping_bound(30), 80);
        assert_eq!(Phase::at(29, 30), Phase::Growing);
        assert_eq!(Phase::at(30, 30), Phase::Stopping);
    }

    #[test]
    fn fixed_sequence_becomes_script() {
        let s: Scenario<Gauge> = action(Op::Raise(3)).then(action(Op::Lower(2)));
        let outcome = run(&s, 10, 1);
        assert_eq!(
            outcome,
            crate::model::outcome::Outcome::Script {
                trace: vec![
                    Step::act(Var(1), Op::Raise(3), true),
                    Step::act(Var(2), Op::Lower(2), true),
                ]
            }
        );
    }

    #[test]
    fn failing_fixed_action_is_bad_precondition() {
        let s: Scenario<Gauge> = action(Op::Raise(1)).then(action(Op::Lower(5)));
        let outcome = run(&s, 10, 1);
        assert_eq!(outcome.kind(), OutcomeKind::BadPrecondition);
        assert_eq!(outcome.action_count(), 1);
        assert_eq!(
            outcome.failures(),
            &[FailedStep::action(StepAction::Domain(Op::Lower(5)), true)]
        );
        assert_eq!(outcome.state(), Some(&Gauge { level: 1 }));
    }

    #[test]
    fn failures_from_every_branch_of_the_pass_are_collected() {
        let s: Scenario<Gauge> = choose(vec![
            action(Op::Lower(1)),
            fail("explicit"),
            action(Op::Raise(1)),
        ]);
        let outcome = run(&s, 10, 4);
        assert_eq!(outcome.failures().len(), 2);
        assert!(outcome.trace().is_empty());
    }

    #[test]
    fn nothing_viable_is_stuck() {
        let outcome = run(&empty(), 10, 1);
        assert_eq!(outcome.kind(), OutcomeKind::Stuck);
        assert_eq!(outcome.state(), Some(&Gauge::default()));
    }

    #[test]
    fn zero_weight_branches_are_not_viable() {
        let outcome = run(&weight(0.0, action(Op::Lower(9))), 10, 1);
        assert_eq!(outcome.kind(), OutcomeKind::Stuck);
    }

    #[test]
    fn endless_random_actions_loop() {
        fn forever() -> Scenario<Gauge> {
            any_action_then(|_| forever())
        }
        let outcome = run(&forever(), 5, 2);
        assert_eq!(outcome.kind(), OutcomeKind::Looping);
        assert_eq!(outcome.action_count(), looping_bound(5) + 1);
    }

    #[test]
    fn endless_witness_draws_loop() {
        fn draws() -> Scenario<Gauge> {
            for_all(|rng: &mut ScenarioRng, _| rng.random_range(0u32..10), |_| draws())
        }
        let outcome = run(&draws(), 5, 2);
        assert_eq!(outcome.kind(), OutcomeKind::Looping);
        assert_eq!(outcome.action_count(), 0);
        assert_eq!(outcome.witness_count(), looping_bound(5) + 1);
    }

    #[test]
    fn witness_runs_between_actions_do_not_loop() {
        fn drawn_raises(left: usize) -> Scenario<Gauge> {
            if left == 0 {
                return done();
            }
            for_all(|rng: &mut ScenarioRng, _| rng.random_range(1u32..4), move |n| {
                action(Op::Raise(n)).then(drawn_raises(left - 1))
            })
        }
        let outcome = run(&drawn_raises(25), 30, 3);
        assert_eq!(outcome.kind(), OutcomeKind::Script);
        assert_eq!(outcome.witness_count(), 25);
        assert_eq!(outcome.action_count(), 25);
    }

    #[test]
    fn any_actions_zero_at_size_zero_is_empty_script() {
        let outcome = run(&any_actions(0), 0, 11);
        assert_eq!(outcome.kind(), OutcomeKind::Script);
        assert!(outcome.trace().is_empty());
    }

    #[test]
    fn stopping_phase_prefers_stopping_branches() {
        // Past the target, the stopping branch is preferred over more actions.
        let s: Scenario<Gauge> = choose(vec![
            stopping().then(action(Op::Raise(7))),
            weight(100.0, action(Op::Raise(1))),
        ]);
        let outcome = run(&s, 0, 5);
        assert_eq!(outcome.trace(), &[Step::act(Var(1), Op::Raise(7), true)]);
    }

    #[test]
    fn stopping_branches_are_set_aside_while_growing() {
        let s: Scenario<Gauge> = choose(vec![
            weight(100.0, stopping().then(action(Op::Raise(7)))),
            action(Op::Raise(1)),
        ]);
        let outcome = run(&s, 10, 5);
        assert_eq!(outcome.trace(), &[Step::act(Var(1), Op::Raise(1), true)]);
    }

    #[test]
    fn witnesses_are_recorded_without_numbering() {
        let s: Scenario<Gauge> = for_all(|rng: &mut ScenarioRng, _| rng.random_range(1u32..4), |n| {
            action(Op::Raise(n))
        });
        let outcome = run(&s, 10, 8);
        assert_eq!(outcome.trace().len(), 2);
        assert!(matches!(outcome.trace()[0], Step::Witness { .. }));
        assert!(matches!(outcome.trace()[1], Step::Do { var: Var(1), .. }));
    }

    #[test]
    fn same_seed_same_outcome() {
        let s: Scenario<Gauge> = any_actions_default();
        assert_eq!(run(&s, 20, 77), run(&s, 20, 77));
    }

    #[test]
    fn terminal_selection_prefers_failures_over_done() {
        let s: Scenario<Gauge> = choose(vec![done(), action(Op::Lower(3))]);
        let heads = expand(&s, &Gauge::default(), 1).expect("heads");
        let selection = select_step(&heads, Phase::Growing, &Gauge::default(), 1, &mut TerminalChooser);
        assert!(matches!(selection, Selection::Bad(ref f) if f.len() == 1));
    }
}
