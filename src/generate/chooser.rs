//! Step choosers: how one candidate is picked from a pass.
//!
//! Generation picks at random by weight. Replay only ever needs to decide
//! whether the recorded trace may end here, so it uses [`TerminalChooser`].

use rand::Rng;

use crate::model::state::{ScenarioRng, StateModel};
use crate::model::step::StepAction;
use crate::model::witness::WitnessValue;
use crate::scenario::expand::{Head, HeadKind};

/// Attempts made to draw a precondition-satisfying random action.
pub const ANY_ACTION_ATTEMPTS: usize = 100;

/// A chosen next step, borrowing the head it came from.
pub(crate) enum Pick<'h, M: StateModel> {
    /// End generation here.
    Stop(&'h Head<M>),
    /// Commit an action.
    Act {
        head: &'h Head<M>,
        action: StepAction<M::Action>,
    },
    /// Record a witness.
    Witness {
        head: &'h Head<M>,
        value: WitnessValue,
    },
}

pub(crate) trait StepChooser<M: StateModel> {
    /// Pick among `candidates` (non-empty, all weights positive, none failing).
    /// `None` means nothing usable came out of this pass.
    fn choose<'h>(
        &mut self,
        candidates: &[&'h Head<M>],
        state: &M,
        size: usize,
    ) -> Option<Pick<'h, M>>;
}

/// Weighted random choice backed by the scenario's generator.
pub(crate) struct RandomChooser<'r> {
    rng: &'r mut ScenarioRng,
}

impl<'r> RandomChooser<'r> {
    pub fn new(rng: &'r mut ScenarioRng) -> Self {
        Self { rng }
    }
}

impl<M: StateModel> StepChooser<M> for RandomChooser<'_> {
    fn choose<'h>(
        &mut self,
        candidates: &[&'h Head<M>],
        state: &M,
        size: usize,
    ) -> Option<Pick<'h, M>> {
        let head = weighted_pick(candidates, self.rng)?;
        match &head.kind {
            HeadKind::Done => Some(Pick::Stop(head)),
            HeadKind::Action { action, .. } => Some(Pick::Act {
                head,
                action: action.clone(),
            }),
            HeadKind::AnyAction { .. } => {
                sample_any_action(state, self.rng, size).map(|action| Pick::Act {
                    head,
                    action: StepAction::Domain(action),
                })
            }
            HeadKind::ForAll { generate, .. } => Some(Pick::Witness {
                head,
                value: generate(self.rng, size),
            }),
            // Fail heads are reported before a pass reaches the chooser.
            HeadKind::Fail(_) => None,
        }
    }
}

/// Picks Done when the pass offers it, and nothing otherwise.
pub(crate) struct TerminalChooser;

impl<M: StateModel> StepChooser<M> for TerminalChooser {
    fn choose<'h>(
        &mut self,
        candidates: &[&'h Head<M>],
        _state: &M,
        _size: usize,
    ) -> Option<Pick<'h, M>> {
        candidates
            .iter()
            .copied()
            .find(|head| head.is_done())
            .map(Pick::Stop)
    }
}

/// Weighted choice; the probability of each candidate is proportional to its
/// weight.
fn weighted_pick<'h, M: StateModel>(
    candidates: &[&'h Head<M>],
    rng: &mut ScenarioRng,
) -> Option<&'h Head<M>> {
    let total: f64 = candidates.iter().map(|head| head.weight).sum();
    let mut remaining = rng.random::<f64>() * total;
    for &head in candidates {
        if remaining < head.weight {
            return Some(head);
        }
        remaining -= head.weight;
    }
    candidates.last().copied()
}

/// Draw from the domain generator until an action satisfies its precondition.
pub(crate) fn sample_any_action<M: StateModel>(
    state: &M,
    rng: &mut ScenarioRng,
    size: usize,
) -> Option<M::Action> {
    for _ in 0..ANY_ACTION_ATTEMPTS {
        if let Some(action) = state.arbitrary_action(rng, size) {
            if state.precondition(&action) {
                return Some(action);
            }
        }
    }
    None
}
