//! Running scenarios against properties: single runs, replays, and
//! many-test checks with a size ramp.
//!
//! The property receives the executable action sequence of a script. Other
//! outcomes never reach it: bad preconditions and looping fail the test,
//! stuck scenarios discard it.
//!
//! A failing or discarded result carries the outcome twice: rendered for
//! reading, and as JSON that [`Outcome::from_json`] turns back into a value
//! [`replay`] accepts.

pub mod property;

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::config::{Config, GenerationConfig};
use crate::core::errors::Result;
use crate::generate::search::{Generated, generate};
use crate::logger::jsonl::{ArchiveEntry, EventType, JsonlConfig, OutcomeArchive};
use crate::mapper::{ActionSequence, action_sequence};
use crate::model::outcome::{ModelOutcome, Outcome, OutcomeKind};
use crate::model::state::{StateModel, seeded_rng};
use crate::replay::{replay_captured, replay_outcome};
use crate::scenario::Scenario;

pub use property::{MonitorHook, TestResult, Verdict};

/// Turn a generated outcome into a test result, running `property` on scripts.
pub fn evaluate<M, P, R>(generated: Generated<M>, property: P) -> TestResult
where
    M: StateModel + Serialize,
    M::Action: Serialize,
    P: Fn(&ActionSequence<M::Action>) -> R,
    R: Into<TestResult>,
{
    let Generated {
        outcome, monitors, ..
    } = generated;
    let kind = outcome.kind();
    let result = match &outcome {
        Outcome::Script { trace } => {
            let result: TestResult = property(&action_sequence(trace)).into();
            let result = monitors.iter().fold(result, |acc, hook| hook(acc));
            if result.is_failed() {
                with_evidence(result, &outcome)
            } else {
                result
            }
        }
        Outcome::BadPrecondition { .. } => with_evidence(
            TestResult::failed(
                "scenario construction failed: a required step's precondition or assertion does not hold",
            ),
            &outcome,
        ),
        Outcome::Looping { .. } => with_evidence(
            TestResult::failed("scenario generation did not terminate within the looping bound"),
            &outcome,
        ),
        Outcome::Stuck { .. } => with_evidence(
            TestResult::discarded("scenario is stuck: no branch has a viable next step"),
            &outcome,
        ),
    };
    result.classified(kind)
}

/// Attach the rendered outcome and its JSON form.
fn with_evidence<M>(result: TestResult, outcome: &ModelOutcome<M>) -> TestResult
where
    M: StateModel + Serialize,
    M::Action: Serialize,
{
    let result = result.with_counterexample(outcome.to_string());
    match outcome.to_json() {
        Ok(json) => result.with_counterexample(json),
        Err(error) => {
            warn!(%error, "outcome has no JSON form");
            result
        }
    }
}

/// Size of the `index`-th of `tests` checks, ramping from 0 to `max_size`.
#[must_use]
pub fn size_ramp(index: usize, tests: usize, max_size: usize) -> usize {
    if tests <= 1 {
        return max_size;
    }
    (index.saturating_mul(max_size) / (tests - 1)).min(max_size)
}

/// The first failing test of a check.
pub struct CheckFailure<M: StateModel> {
    /// Zero-based test number.
    pub test: usize,
    pub size: usize,
    /// Seed that regenerates this test at `size`.
    pub seed: u64,
    pub outcome: ModelOutcome<M>,
    pub result: TestResult,
}

impl<M: StateModel> CheckFailure<M> {
    /// Replay the captured outcome at the size it failed at.
    pub fn replay<P, R>(&self, scenario: &Scenario<M>, property: P) -> Result<TestResult>
    where
        M: Serialize,
        M::Action: Serialize,
        P: Fn(&ActionSequence<M::Action>) -> R,
        R: Into<TestResult>,
    {
        replay_at(scenario, property, &self.outcome, self.size)
    }

    /// Generation settings that reproduce this failure with [`ScenarioRunner::run`].
    #[must_use]
    pub fn reproduction(&self) -> GenerationConfig {
        GenerationConfig {
            size: self.size,
            max_size: self.size.max(1),
            tests: 1,
            seed: Some(self.seed),
        }
    }
}

/// Summary of a many-test check.
pub struct CheckReport<M: StateModel> {
    pub seed: u64,
    pub tests_run: usize,
    pub passed: usize,
    pub discarded: usize,
    pub kinds: BTreeMap<OutcomeKind, usize>,
    pub labels: BTreeMap<String, usize>,
    pub failure: Option<CheckFailure<M>>,
}

impl<M: StateModel> CheckReport<M> {
    fn new(seed: u64) -> Self {
        Self {
            seed,
            tests_run: 0,
            passed: 0,
            discarded: 0,
            kinds: BTreeMap::new(),
            labels: BTreeMap::new(),
            failure: None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

impl<M: StateModel> fmt::Display for CheckReport<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            None => write!(
                f,
                "+++ OK, passed {} tests ({} discarded, seed {})",
                self.passed, self.discarded, self.seed
            )?,
            Some(failure) => write!(
                f,
                "*** Failed after {} tests (size {}, seed {}): {}",
                self.tests_run, failure.size, failure.seed, failure.result
            )?,
        }
        let total: usize = self.labels.values().sum();
        for (label, count) in &self.labels {
            #[allow(clippy::cast_precision_loss)]
            let pct = (*count as f64) * 100.0 / (total.max(1) as f64);
            write!(f, "\n{pct:5.1}% {label}")?;
        }
        Ok(())
    }
}

/// Runs scenarios with a fixed configuration and seed.
pub struct ScenarioRunner {
    config: GenerationConfig,
    seed: u64,
    archive: Option<OutcomeArchive>,
    config_hash: Option<String>,
    record_passing: bool,
}

impl ScenarioRunner {
    /// Runner for `config`. Without a configured seed, one is drawn from
    /// entropy and logged.
    #[must_use]
    pub fn new(config: GenerationConfig) -> Self {
        let seed = config.seed.unwrap_or_else(|| {
            let seed = rand::random();
            info!(seed, "no seed configured, drew one from entropy");
            seed
        });
        Self {
            config,
            seed,
            archive: None,
            config_hash: None,
            record_passing: false,
        }
    }

    /// Runner for a full validated config, with its archive when enabled.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let mut runner = Self::new(config.generation.clone());
        runner.config_hash = Some(config.stable_hash()?);
        if config.archive.enabled {
            runner.archive = Some(OutcomeArchive::open(JsonlConfig::from(&config.archive)));
            runner.record_passing = config.archive.record_passing;
        }
        Ok(runner)
    }

    #[must_use]
    pub fn with_archive(mut self, archive: OutcomeArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    #[must_use]
    pub fn record_passing(mut self, record: bool) -> Self {
        self.record_passing = record;
        self
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Generate one outcome at the configured size and seed.
    pub fn generate<M: StateModel>(&self, scenario: &Scenario<M>) -> Generated<M> {
        generate(scenario, self.config.size, &mut seeded_rng(self.seed))
    }

    /// Generate one scenario and check `property` against it.
    pub fn run<M, P, R>(&self, scenario: &Scenario<M>, property: P) -> TestResult
    where
        M: StateModel + Serialize,
        M::Action: Serialize,
        P: Fn(&ActionSequence<M::Action>) -> R,
        R: Into<TestResult>,
    {
        evaluate(self.generate(scenario), property)
    }

    /// Replay a captured outcome of unknown size and check `property`
    /// against the result. The configured size is tried first; see
    /// [`replay_captured`].
    pub fn replay<M, P, R>(
        &self,
        scenario: &Scenario<M>,
        property: P,
        captured: &ModelOutcome<M>,
    ) -> Result<TestResult>
    where
        M: StateModel + Serialize,
        M::Action: Serialize,
        P: Fn(&ActionSequence<M::Action>) -> R,
        R: Into<TestResult>,
    {
        let (replayed, _) = replay_captured(scenario, captured, self.config.size)?;
        Ok(evaluate(replayed, property))
    }

    /// Replay a captured outcome at the size it was generated at.
    pub fn replay_at<M, P, R>(
        &self,
        scenario: &Scenario<M>,
        property: P,
        captured: &ModelOutcome<M>,
        size: usize,
    ) -> Result<TestResult>
    where
        M: StateModel + Serialize,
        M::Action: Serialize,
        P: Fn(&ActionSequence<M::Action>) -> R,
        R: Into<TestResult>,
    {
        Ok(evaluate(replay_outcome(scenario, captured, size)?, property))
    }

    /// [`ScenarioRunner::replay`], archiving the replayed outcome and its
    /// verdict when an archive is attached.
    pub fn replay_archived<M, P, R>(
        &mut self,
        scenario: &Scenario<M>,
        property: P,
        captured: &ModelOutcome<M>,
    ) -> Result<TestResult>
    where
        M: StateModel + Serialize,
        M::Action: Serialize,
        P: Fn(&ActionSequence<M::Action>) -> R,
        R: Into<TestResult>,
    {
        let (replayed, size) = replay_captured(scenario, captured, self.config.size)?;
        let outcome = replayed.outcome.clone();
        let result = evaluate(replayed, property);
        if self.archive.is_some() {
            let entry = ArchiveEntry::capture(EventType::Replayed, &outcome, size, None)?
                .with_details(result.verdict.to_string());
            self.append(entry);
            debug!(kind = %outcome.kind(), size, "replay archived");
        }
        Ok(result)
    }

    /// Check `property` over the configured number of tests, stopping at the
    /// first failure.
    pub fn check<M, P, R>(&self, scenario: &Scenario<M>, property: P) -> CheckReport<M>
    where
        M: StateModel + Serialize,
        M::Action: Serialize,
        P: Fn(&ActionSequence<M::Action>) -> R,
        R: Into<TestResult>,
    {
        self.check_observed(scenario, property, |_, _, _, _| {})
    }

    /// [`ScenarioRunner::check`], archiving the failure (and every outcome when
    /// recording passing tests) when an archive is attached.
    pub fn check_archived<M, P, R>(&mut self, scenario: &Scenario<M>, property: P) -> CheckReport<M>
    where
        M: StateModel + Serialize,
        M::Action: Serialize,
        P: Fn(&ActionSequence<M::Action>) -> R,
        R: Into<TestResult>,
    {
        let mut pending: Vec<(EventType, ArchiveEntry)> = Vec::new();
        let record_passing = self.record_passing;
        let report = self.check_observed(scenario, property, |outcome, result, size, seed| {
            let event = if result.is_failed() {
                EventType::CheckFailed
            } else if record_passing {
                EventType::Generated
            } else {
                return;
            };
            match ArchiveEntry::capture(event, outcome, size, Some(seed)) {
                Ok(entry) => {
                    let entry = match &result.reason {
                        Some(reason) if result.is_failed() => entry.with_details(reason.clone()),
                        _ => entry,
                    };
                    pending.push((event, entry));
                }
                Err(error) => debug!(%error, "outcome not archived"),
            }
        });
        for (event, entry) in pending {
            self.append(entry);
            debug!(?event, "outcome archived");
        }
        report
    }

    /// Archive one outcome. A no-op without an attached archive.
    pub fn archive_outcome<A, S>(
        &mut self,
        event: EventType,
        outcome: &Outcome<A, S>,
        size: usize,
        seed: Option<u64>,
    ) -> Result<()>
    where
        A: Serialize + fmt::Debug,
        S: Serialize + fmt::Debug,
    {
        if self.archive.is_some() {
            let entry = ArchiveEntry::capture(event, outcome, size, seed)?;
            self.append(entry);
        }
        Ok(())
    }

    fn append(&mut self, entry: ArchiveEntry) {
        let entry = match &self.config_hash {
            Some(hash) => entry.with_config_hash(hash.clone()),
            None => entry,
        };
        if let Some(archive) = self.archive.as_mut() {
            archive.append(&entry);
        }
    }

    fn check_observed<M, P, R, O>(
        &self,
        scenario: &Scenario<M>,
        property: P,
        mut observe: O,
    ) -> CheckReport<M>
    where
        M: StateModel + Serialize,
        M::Action: Serialize,
        P: Fn(&ActionSequence<M::Action>) -> R,
        R: Into<TestResult>,
        O: FnMut(&ModelOutcome<M>, &TestResult, usize, u64),
    {
        let tests = self.config.tests;
        info!(tests, max_size = self.config.max_size, seed = self.seed, "check started");
        let mut master = seeded_rng(self.seed);
        let mut report = CheckReport::new(self.seed);

        for test in 0..tests {
            let size = size_ramp(test, tests, self.config.max_size);
            let seed: u64 = master.random();
            let generated = generate(scenario, size, &mut seeded_rng(seed));
            let outcome = generated.outcome.clone();
            let result = evaluate(generated, &property);
            observe(&outcome, &result, size, seed);

            report.tests_run += 1;
            *report.kinds.entry(outcome.kind()).or_insert(0) += 1;
            for label in &result.labels {
                *report.labels.entry(label.clone()).or_insert(0) += 1;
            }
            match result.verdict {
                Verdict::Passed => report.passed += 1,
                Verdict::Discarded => report.discarded += 1,
                Verdict::Failed => {
                    report.failure = Some(CheckFailure {
                        test,
                        size,
                        seed,
                        outcome,
                        result,
                    });
                    break;
                }
            }
        }

        info!(
            tests_run = report.tests_run,
            passed = report.passed,
            discarded = report.discarded,
            failed = report.failure.is_some(),
            "check finished"
        );
        report
    }
}

/// Generate with default settings and check `property`.
pub fn run_scenario<M, P, R>(scenario: &Scenario<M>, property: P) -> TestResult
where
    M: StateModel + Serialize,
    M::Action: Serialize,
    P: Fn(&ActionSequence<M::Action>) -> R,
    R: Into<TestResult>,
{
    ScenarioRunner::new(GenerationConfig::default()).run(scenario, property)
}

/// Replay `captured` and check `property`. The size it was generated at
/// is recovered from the trace when the default size does not reproduce it.
pub fn replay<M, P, R>(
    scenario: &Scenario<M>,
    property: P,
    captured: &ModelOutcome<M>,
) -> Result<TestResult>
where
    M: StateModel + Serialize,
    M::Action: Serialize,
    P: Fn(&ActionSequence<M::Action>) -> R,
    R: Into<TestResult>,
{
    let (replayed, _) = replay_captured(scenario, captured, GenerationConfig::default().size)?;
    Ok(evaluate(replayed, property))
}

/// Replay `captured` at the size it was generated at and check `property`.
pub fn replay_at<M, P, R>(
    scenario: &Scenario<M>,
    property: P,
    captured: &ModelOutcome<M>,
    size: usize,
) -> Result<TestResult>
where
    M: StateModel + Serialize,
    M::Action: Serialize,
    P: Fn(&ActionSequence<M::Action>) -> R,
    R: Into<TestResult>,
{
    Ok(evaluate(replay_outcome(scenario, captured, size)?, property))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::state::ScenarioRng;
    use crate::model::step::Var;
    use crate::scenario::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, serde::Deserialize)]
    struct Counter {
        value: i32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
    enum Op {
        Inc,
        Dec,
    }

    impl StateModel for Counter {
        type Action = Op;

        fn initial_state() -> Self {
            Self::default()
        }

        fn arbitrary_action(&self, rng: &mut ScenarioRng, _size: usize) -> Option<Op> {
            Some(if rng.random_bool(0.5) { Op::Inc } else { Op::Dec })
        }

        fn precondition(&self, action: &Op) -> bool {
            !matches!(action, Op::Dec) || self.value > 0
        }

        fn next_state(&mut self, action: &Op, _var: Var) {
            match action {
                Op::Inc => self.value += 1,
                Op::Dec => self.value -= 1,
            }
        }
    }

    fn seeded(seed: u64, size: usize) -> ScenarioRunner {
        ScenarioRunner::new(GenerationConfig {
            size,
            seed: Some(seed),
            ..GenerationConfig::default()
        })
    }

    #[test]
    fn size_ramp_spans_zero_to_max() {
        assert_eq!(size_ramp(0, 100, 100), 0);
        assert_eq!(size_ramp(99, 100, 100), 100);
        assert_eq!(size_ramp(0, 1, 40), 40);
        assert!((0..10).all(|i| size_ramp(i, 10, 5) <= 5));
    }

    #[test]
    fn script_results_carry_property_verdict_and_monitors() {
        let s: Scenario<Counter> = label("inc-only").then(action(Op::Inc));
        let result = seeded(1, 5).run(&s, |actions: &ActionSequence<Op>| actions.len() == 1);
        assert!(result.is_passed());
        assert_eq!(result.classification, Some(OutcomeKind::Script));
        assert_eq!(result.labels, vec!["inc-only"]);
    }

    #[test]
    fn failed_property_carries_the_rendered_script() {
        let s: Scenario<Counter> = action(Op::Inc);
        let result = seeded(1, 5).run(&s, |_: &ActionSequence<Op>| false);
        assert!(result.is_failed());
        assert!(result.counterexample[0].starts_with("Script"));
        let pasted: ModelOutcome<Counter> =
            Outcome::from_json(&result.counterexample[1]).expect("json form");
        assert_eq!(pasted.action_count(), 1);
    }

    #[test]
    fn check_failure_replays_at_its_own_size() {
        let s: Scenario<Counter> = any_actions_default();
        let runner = ScenarioRunner::new(GenerationConfig {
            size: 0,
            max_size: 20,
            tests: 200,
            seed: Some(3),
        });
        let report = runner.check(&s, |actions: &ActionSequence<Op>| actions.len() < 4);
        let failure = report.failure.as_ref().expect("long scripts exist");
        let replayed = failure
            .replay(&s, |actions: &ActionSequence<Op>| actions.len() < 4)
            .expect("replays");
        assert_eq!(replayed, failure.result);
    }

    #[test]
    fn bad_precondition_fails_without_running_the_property() {
        let s: Scenario<Counter> = action(Op::Dec);
        let result = seeded(1, 5).run(&s, |_: &ActionSequence<Op>| -> bool {
            panic!("property must not run")
        });
        assert!(result.is_failed());
        assert_eq!(result.classification, Some(OutcomeKind::BadPrecondition));
    }

    #[test]
    fn stuck_is_discarded() {
        let result = seeded(1, 5).run(&empty::<Counter>(), |_: &ActionSequence<Op>| true);
        assert!(result.is_discarded());
        assert_eq!(result.classification, Some(OutcomeKind::Stuck));
    }

    #[test]
    fn check_stops_at_the_first_failure_and_reproduces() {
        let s: Scenario<Counter> = any_actions_default();
        let runner = ScenarioRunner::new(GenerationConfig {
            size: 10,
            max_size: 20,
            tests: 200,
            seed: Some(3),
        });
        let property = |actions: &ActionSequence<Op>| actions.len() < 4;
        let report = runner.check(&s, property);
        let failure = report.failure.as_ref().expect("long scripts exist");
        assert_eq!(report.tests_run, failure.test + 1);

        let again = ScenarioRunner::new(failure.reproduction()).generate(&s);
        assert_eq!(again.outcome, failure.outcome);
        assert!(report.to_string().starts_with("*** Failed"));
    }

    #[test]
    fn passing_check_counts_labels() {
        let s: Scenario<Counter> = choose(vec![
            label("up").then(action(Op::Inc)),
            label("idle").then(done()),
        ]);
        let runner = ScenarioRunner::new(GenerationConfig {
            tests: 50,
            seed: Some(8),
            ..GenerationConfig::default()
        });
        let report = runner.check(&s, |_: &ActionSequence<Op>| true);
        assert!(report.is_success());
        assert_eq!(report.passed, 50);
        assert_eq!(report.labels.values().sum::<usize>(), 50);
        assert!(report.to_string().starts_with("+++ OK, passed 50 tests"));
    }

    #[test]
    fn replay_reuses_the_captured_trace() {
        let s: Scenario<Counter> = any_actions_default();
        let runner = seeded(21, 12);
        let captured = runner.generate(&s).outcome;
        let count = captured.action_count();
        let result = runner
            .replay(&s, move |actions: &ActionSequence<Op>| actions.len() == count, &captured)
            .expect("replays");
        assert!(result.is_passed());
    }

    #[test]
    fn archived_check_writes_the_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("outcomes.jsonl");
        let archive = OutcomeArchive::open(JsonlConfig {
            path: path.clone(),
            max_size_bytes: 1024 * 1024,
            max_rotated_files: 2,
        });
        let mut runner = seeded(5, 5).with_archive(archive);
        let s: Scenario<Counter> = action(Op::Dec);
        let report = runner.check_archived(&s, |_: &ActionSequence<Op>| true);
        assert!(!report.is_success());

        let entries = crate::logger::jsonl::read_archive(&path).expect("archive readable");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, EventType::CheckFailed);
        let outcome: ModelOutcome<Counter> = entries[0].outcome().expect("outcome parses");
        assert_eq!(outcome.kind(), OutcomeKind::BadPrecondition);
    }
}
