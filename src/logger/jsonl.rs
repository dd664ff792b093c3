//! Outcome archive: append-only line-delimited JSON of captured outcomes.
//!
//! Each line is a self-contained JSON object holding one outcome in its
//! paste-back form plus its rendering, so a failure found in one run can be
//! pulled out later and replayed. Lines are assembled in memory and written
//! via a single `write_all` to prevent interleaved partial lines when the
//! file is tailed by another process.
//!
//! Three-level degradation chain:
//! 1. Archive file path
//! 2. stderr with `[DSCN-JSONL]` prefix
//! 3. Silent discard (a test run must never fail because archiving did)

#![allow(missing_docs)]

use std::fmt::Debug;
use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::config::ArchiveConfig;
use crate::core::errors::{Result, ScenarioError};
use crate::model::outcome::{Outcome, OutcomeKind};

/// Severity level for archived outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Scripts are informational, stuck scenarios are suspicious, and
    /// construction failures are critical.
    #[must_use]
    pub const fn for_kind(kind: OutcomeKind) -> Self {
        match kind {
            OutcomeKind::Script => Self::Info,
            OutcomeKind::Stuck => Self::Warning,
            OutcomeKind::BadPrecondition | OutcomeKind::Looping => Self::Critical,
        }
    }
}

/// Why an outcome was archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Generated,
    Replayed,
    CheckFailed,
}

/// A single archived outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    pub kind: OutcomeKind,
    /// Size the outcome was generated at.
    pub size: usize,
    /// Seed that reproduces the outcome, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub action_count: usize,
    pub witness_count: usize,
    /// Stable hash of the effective configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    /// The outcome in its JSON paste-back form.
    pub outcome: serde_json::Value,
    /// Human-readable rendering of the outcome.
    pub rendered: String,
    /// Freeform details, e.g. the failing property's reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ArchiveEntry {
    /// Capture `outcome`, stamped with the current UTC time.
    pub fn capture<A, S>(
        event: EventType,
        outcome: &Outcome<A, S>,
        size: usize,
        seed: Option<u64>,
    ) -> Result<Self>
    where
        A: Serialize + Debug,
        S: Serialize + Debug,
    {
        let kind = outcome.kind();
        Ok(Self {
            ts: format_utc_now(),
            event,
            severity: Severity::for_kind(kind),
            kind,
            size,
            seed,
            action_count: outcome.action_count(),
            witness_count: outcome.witness_count(),
            config_hash: None,
            outcome: serde_json::to_value(outcome)?,
            rendered: outcome.to_string(),
            details: None,
        })
    }

    #[must_use]
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Deserialize the captured outcome, ready for replay.
    pub fn outcome<A, S>(&self) -> Result<Outcome<A, S>>
    where
        A: DeserializeOwned,
        S: DeserializeOwned,
    {
        Ok(serde_json::from_value(self.outcome.clone())?)
    }
}

/// Degradation state of the archive writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Writing to the archive file.
    Normal,
    /// The file failed, writing to stderr.
    Stderr,
    /// Everything failed, silently discarding.
    Discard,
}

/// Configuration for the archive writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    /// Maximum file size before rotation (bytes).
    pub max_size_bytes: u64,
    /// Number of rotated files to keep.
    pub max_rotated_files: usize,
}

impl From<&ArchiveConfig> for JsonlConfig {
    fn from(config: &ArchiveConfig) -> Self {
        Self {
            path: config.path.clone(),
            max_size_bytes: config.max_size_bytes,
            max_rotated_files: config.max_rotated_files,
        }
    }
}

/// Append-only outcome archive with rotation and degradation.
pub struct OutcomeArchive {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
}

impl OutcomeArchive {
    /// Open the archive file. Falls through the degradation chain on failure.
    pub fn open(config: JsonlConfig) -> Self {
        let mut archive = Self {
            config,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
        };
        archive.try_open();
        archive
    }

    /// Append one entry as a single JSONL line, flushed before returning.
    pub fn append(&mut self, entry: &ArchiveEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[DSCN-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
        self.flush();
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    /// Number of bytes in the current file.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Try reopening the archive file after a degradation.
    pub fn try_recover(&mut self) {
        if self.state == WriterState::Normal {
            return;
        }
        if let Ok((file, size)) = open_append(&self.config.path) {
            self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
            self.state = WriterState::Normal;
            self.bytes_written = size;
            warn!(path = %self.config.path.display(), "outcome archive recovered");
        }
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        if self.state == WriterState::Normal
            && self.bytes_written + line.len() as u64 > self.config.max_size_bytes
        {
            self.rotate();
        }

        match self.state {
            WriterState::Normal => {
                if let Some(w) = self.writer.as_mut() {
                    if w.write_all(line.as_bytes()).is_err() {
                        self.degrade();
                        self.write_line(line);
                        return;
                    }
                    self.bytes_written += line.len() as u64;
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[DSCN-JSONL] {line}").is_err() {
                    self.degrade();
                }
            }
            WriterState::Discard => {}
        }
    }

    fn try_open(&mut self) {
        match open_append(&self.config.path) {
            Ok((file, size)) => {
                self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                self.state = WriterState::Normal;
                self.bytes_written = size;
            }
            Err(error) => {
                self.state = WriterState::Stderr;
                warn!(%error, "outcome archive unavailable, writing to stderr");
            }
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.state {
            WriterState::Normal => {
                self.state = WriterState::Stderr;
                warn!(
                    path = %self.config.path.display(),
                    "outcome archive write failed, writing to stderr"
                );
            }
            WriterState::Stderr => {
                self.state = WriterState::Discard;
            }
            WriterState::Discard => {}
        }
    }

    fn rotate(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
        self.writer = None;

        let base = self.config.path.clone();
        // Drop the oldest, then shift: .N-1→.N, …, .1→.2, current→.1
        let _ = fs::remove_file(rotated_name(&base, self.config.max_rotated_files));
        for i in (1..self.config.max_rotated_files).rev() {
            let _ = rename(rotated_name(&base, i), rotated_name(&base, i + 1));
        }
        let _ = rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                self.bytes_written = 0;
            }
            Err(_) => self.degrade(),
        }
    }
}

/// Load every entry of an archive file. Blank lines are skipped; a malformed
/// line fails with its 1-based line number.
pub fn read_archive(path: &Path) -> Result<Vec<ArchiveEntry>> {
    let file = File::open(path).map_err(|source| ScenarioError::io(path, source))?;
    let mut entries = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| ScenarioError::io(path, source))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|error| ScenarioError::ArchiveEntry {
            line: index + 1,
            details: error.to_string(),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

// ──────────────────────── helpers ────────────────────────

/// Open or create a file for appending. Returns `(File, current_size)`.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ScenarioError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ScenarioError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// Build a rotated filename: `foo.jsonl` → `foo.jsonl.3`.
fn rotated_name(base: &Path, index: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// Format current UTC time as ISO 8601.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────────── tests ────────────────────────
