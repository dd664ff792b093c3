//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use dynamic_scenarios::prelude::*;
//! ```

// Core
pub use crate::core::config::{ArchiveConfig, Config, GenerationConfig};
pub use crate::core::errors::{Result, ScenarioError};

// Model
pub use crate::model::outcome::{ModelOutcome, Outcome, OutcomeKind};
pub use crate::model::state::{ScenarioRng, StateModel, seeded_rng};
pub use crate::model::step::{FailedStep, Step, StepAction, Tick, Var};
pub use crate::model::witness::{Witness, WitnessKind, WitnessValue};

// Scenario
pub use crate::scenario::{
    Scenario, action, action_then, alt, any_action, any_action_then, any_actions,
    any_actions_default, assert_model, choose, defer, done, empty, fail, for_all, get_size, label,
    monitor, stopping, wait_until, weight, with_state,
};

// Generation
pub use crate::generate::{Evidence, Generated, generate};

// Mapper
pub use crate::mapper::{ActionSequence, ExecEntry, GenericAction, GenericFailure, LoweredOutcome};

// Replay
pub use crate::replay::{replay_captured, replay_outcome};

// Runner
pub use crate::runner::{
    CheckFailure, CheckReport, ScenarioRunner, TestResult, Verdict, replay, replay_at,
    run_scenario,
};

// Archive
pub use crate::logger::jsonl::{ArchiveEntry, OutcomeArchive, read_archive};
