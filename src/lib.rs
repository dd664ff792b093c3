#![forbid(unsafe_code)]

//! Dynamic scenarios: turn branching, partly random scenario descriptions
//! into concrete, reproducible action sequences for model-based testing.
//!
//! The pipeline has four stages:
//! 1. **Describe** a scenario with the combinators in [`scenario`]
//! 2. **Generate** one outcome against a [`model::state::StateModel`], classified as
//!    a script, a bad precondition, stuck, or looping
//! 3. **Map** the outcome to a plain [`mapper::ActionSequence`] a property can run
//! 4. **Replay** a captured outcome so a failure reproduces exactly
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use dynamic_scenarios::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use dynamic_scenarios::core::config::Config;
//! use dynamic_scenarios::runner::ScenarioRunner;
//! ```

pub mod prelude;

pub mod core;
pub mod generate;
pub mod logger;
pub mod mapper;
pub mod model;
pub mod replay;
pub mod runner;
pub mod scenario;
