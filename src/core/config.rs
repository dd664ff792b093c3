//! Configuration system: TOML file + env var overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, ScenarioError};

/// Full dscn configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub archive: ArchiveConfig,
}

/// Scenario generation knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Size used by a single run or replay.
    pub size: usize,
    /// Upper bound of the size ramp used when checking many tests.
    pub max_size: usize,
    pub tests: usize,
    /// Fixed seed; fresh entropy when absent.
    pub seed: Option<u64>,
}

/// JSONL outcome archive settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArchiveConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub max_size_bytes: u64,
    pub max_rotated_files: usize,
    /// Archive passing scripts too, not only failures.
    pub record_passing: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            size: 30,
            max_size: 100,
            tests: 100,
            seed: None,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: data_dir().join("outcomes.jsonl"),
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
            record_passing: false,
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[DSCN-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("dscn")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        home_dir().join(".config").join("dscn").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from the default path;
    /// defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| ScenarioError::Io {
                path: path_buf.clone(),
                source,
            })?;
            Self::from_toml(&raw)?
        } else if path.is_some() {
            return Err(ScenarioError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without env overrides or validation.
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// TOML rendering of the effective config.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|error| ScenarioError::Serialization {
            context: "toml",
            details: error.to_string(),
        })
    }

    /// Deterministic hash of the effective config, stamped on archive entries.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // generation
        set_usize(&mut lookup, "DSCN_GENERATION_SIZE", &mut self.generation.size)?;
        set_usize(
            &mut lookup,
            "DSCN_GENERATION_MAX_SIZE",
            &mut self.generation.max_size,
        )?;
        set_usize(&mut lookup, "DSCN_GENERATION_TESTS", &mut self.generation.tests)?;
        if let Some(raw) = lookup("DSCN_GENERATION_SEED") {
            self.generation.seed = Some(parse_env_u64("DSCN_GENERATION_SEED", &raw)?);
        }

        // archive
        set_bool(&mut lookup, "DSCN_ARCHIVE_ENABLED", &mut self.archive.enabled)?;
        if let Some(raw) = lookup("DSCN_ARCHIVE_PATH") {
            self.archive.path = PathBuf::from(raw);
        }
        set_bool(
            &mut lookup,
            "DSCN_ARCHIVE_RECORD_PASSING",
            &mut self.archive.record_passing,
        )?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let generation = &self.generation;
        if generation.tests == 0 {
            return Err(invalid("generation.tests must be >= 1"));
        }
        if generation.max_size == 0 {
            return Err(invalid("generation.max_size must be >= 1"));
        }
        if generation.size > generation.max_size {
            return Err(invalid(format!(
                "generation.size ({}) must not exceed generation.max_size ({})",
                generation.size, generation.max_size
            )));
        }

        let archive = &self.archive;
        if archive.max_rotated_files == 0 {
            return Err(invalid("archive.max_rotated_files must be >= 1"));
        }
        if archive.max_size_bytes < 1024 {
            return Err(invalid(format!(
                "archive.max_size_bytes must be >= 1024, got {}",
                archive.max_size_bytes
            )));
        }
        if archive.enabled && archive.path.as_os_str().is_empty() {
            return Err(invalid("archive.path must be set when the archive is enabled"));
        }

        Ok(())
    }
}

fn invalid(details: impl Into<String>) -> ScenarioError {
    ScenarioError::InvalidConfig {
        details: details.into(),
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn non_empty<F>(lookup: &mut F, name: &str) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(name).filter(|raw| !raw.trim().is_empty())
}

fn set_usize<F>(lookup: &mut F, name: &str, slot: &mut usize) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = non_empty(lookup, name) {
        *slot = raw
            .trim()
            .parse::<usize>()
            .map_err(|error| ScenarioError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

fn set_bool<F>(lookup: &mut F, name: &str, slot: &mut bool) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = non_empty(lookup, name) {
        *slot = parse_env_bool(name, &raw)?;
    }
    Ok(())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|error| ScenarioError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| ScenarioError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

#[cfg(test)]
mod tests {
    use super::{Config, ScenarioError};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    fn with_env(pairs: &[(&str, &str)]) -> crate::core::errors::Result<Config> {
        let env = vars(pairs);
        let mut cfg = Config::default();
        cfg.apply_env_overrides_from(|name| env.get(name).cloned())?;
        Ok(cfg)
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.generation.size, 30);
        assert_eq!(cfg.generation.tests, 100);
        assert!(cfg.generation.seed.is_none());
        assert!(!cfg.archive.enabled);
        assert!(cfg.archive.path.ends_with("dscn/outcomes.jsonl"));
    }

    #[test]
    fn size_above_max_size_rejected() {
        let mut cfg = Config::default();
        cfg.generation.size = 101;
        let err = cfg.validate().expect_err("expected invalid size");
        match err {
            ScenarioError::InvalidConfig { details } => {
                assert!(details.contains("max_size"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_tests_rejected() {
        let mut cfg = Config::default();
        cfg.generation.tests = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn tiny_archive_rotation_size_rejected() {
        let mut cfg = Config::default();
        cfg.archive.max_size_bytes = 512;
        let msg = cfg.validate().expect_err("too small").to_string();
        assert!(msg.contains("1024"), "error should mention the floor: {msg}");
    }

    #[test]
    fn env_overrides_apply() {
        let cfg = with_env(&[
            ("DSCN_GENERATION_SIZE", "12"),
            ("DSCN_GENERATION_SEED", " 42 "),
            ("DSCN_ARCHIVE_ENABLED", "true"),
            ("DSCN_ARCHIVE_PATH", "/var/tmp/out.jsonl"),
        ])
        .expect("overrides parse");
        assert_eq!(cfg.generation.size, 12);
        assert_eq!(cfg.generation.seed, Some(42));
        assert!(cfg.archive.enabled);
        assert_eq!(cfg.archive.path, PathBuf::from("/var/tmp/out.jsonl"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let cfg = with_env(&[("DSCN_GENERATION_TESTS", "  ")]).expect("ignored");
        assert_eq!(cfg.generation.tests, 100);
    }

    #[test]
    fn env_invalid_boolean_rejected() {
        let err = with_env(&[("DSCN_ARCHIVE_RECORD_PASSING", "maybe")])
            .expect_err("expected parse failure");
        assert!(matches!(err, ScenarioError::ConfigParse { context: "env", .. }));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = Config::from_toml("[generation]\nsize = 8\nseed = 5\n").expect("parses");
        assert_eq!(cfg.generation.size, 8);
        assert_eq!(cfg.generation.seed, Some(5));
        assert_eq!(cfg.generation.max_size, 100);
        assert_eq!(cfg.archive.max_rotated_files, 3);
    }

    #[test]
    fn toml_rendering_parses_back() {
        let mut cfg = Config::default();
        cfg.generation.seed = Some(9);
        let rendered = cfg.to_toml().expect("renders");
        assert_eq!(Config::from_toml(&rendered).expect("parses"), cfg);
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/dscn/config.toml")));
        assert!(matches!(result, Err(ScenarioError::MissingConfig { .. })));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[generation]\ntests = 7\n").expect("write");
        let cfg = Config::load(Some(&path)).expect("loads");
        assert_eq!(cfg.generation.tests, 7);
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let before = cfg.stable_hash().expect("hash should compute");
        assert_eq!(before, cfg.stable_hash().expect("hash"));
        let mut changed = cfg;
        changed.generation.size = 31;
        assert_ne!(before, changed.stable_hash().expect("hash"));
    }
}
