//! DSC-prefixed error types with structured error codes.
//!
//! Scenario-construction failures (bad preconditions, looping, stuck scenarios)
//! are not errors: they are [`Outcome`](crate::model::outcome::Outcome)
//! variants. Everything here is either an environment failure (config, IO,
//! archive) or a programmer error detected during replay.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::witness::WitnessKind;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, ScenarioError>;

/// Top-level error type for dynamic scenarios.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("[DSC-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[DSC-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[DSC-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[DSC-2001] witness mismatch at trace step {index}: scenario expects {expected}, trace recorded {found}")]
    WitnessMismatch {
        index: usize,
        expected: WitnessKind,
        found: WitnessKind,
    },

    #[error("[DSC-2002] replay diverged at trace step {index}: {details}")]
    ReplayDiverged { index: usize, details: String },

    #[error("[DSC-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[DSC-2102] malformed archive entry at line {line}: {details}")]
    ArchiveEntry { line: usize, details: String },

    #[error("[DSC-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScenarioError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "DSC-1001",
            Self::MissingConfig { .. } => "DSC-1002",
            Self::ConfigParse { .. } => "DSC-1003",
            Self::WitnessMismatch { .. } => "DSC-2001",
            Self::ReplayDiverged { .. } => "DSC-2002",
            Self::Serialization { .. } => "DSC-2101",
            Self::ArchiveEntry { .. } => "DSC-2102",
            Self::Io { .. } => "DSC-3002",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// Replay mismatches never are: the captured outcome does not belong to
    /// the scenario it is being replayed against.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Whether the error comes from replaying a captured outcome.
    #[must_use]
    pub const fn is_replay_mismatch(&self) -> bool {
        matches!(
            self,
            Self::WitnessMismatch { .. } | Self::ReplayDiverged { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for ScenarioError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
