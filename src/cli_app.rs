//! Top-level CLI definition and dispatch.

use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use colored::{Colorize, control};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use dynamic_scenarios::core::config::Config;
use dynamic_scenarios::logger::jsonl::{ArchiveEntry, Severity, read_archive};
use dynamic_scenarios::model::outcome::OutcomeKind;

/// dscn: inspect archived scenario outcomes and the effective configuration.
#[derive(Debug, Parser)]
#[command(
    name = "dscn",
    author,
    version,
    about = "Dynamic scenarios - archived outcome inspector",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Default tracing filter implied by the verbosity flags.
    #[must_use]
    pub const fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// View configuration state.
    Config(ConfigArgs),
    /// List archived outcomes.
    Inspect(InspectArgs),
    /// Summarize an outcome archive.
    Stats(StatsArgs),
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand, Serialize)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args, Serialize)]
struct InspectArgs {
    /// Archive file; defaults to the configured archive path.
    #[arg(value_name = "ARCHIVE")]
    archive: Option<PathBuf>,
    /// Only show outcomes of this kind (script, bad_precondition, stuck, looping).
    #[arg(long, value_name = "KIND")]
    kind: Option<String>,
    /// Print each outcome's full rendering.
    #[arg(long)]
    render: bool,
    /// Show at most this many entries, newest last.
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

#[derive(Debug, Clone, Args, Serialize)]
struct StatsArgs {
    /// Archive file; defaults to the configured archive path.
    #[arg(value_name = "ARCHIVE")]
    archive: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Config(args) => run_config(cli, args),
        Command::Inspect(args) => run_inspect(cli, args),
        Command::Stats(args) => run_stats(cli, args),
    }
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = config
                        .to_toml()
                        .map_err(|e| CliError::Runtime(e.to_string()))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config
                    .stable_hash()
                    .map_err(|e| CliError::Runtime(e.to_string()))?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("{}", "Configuration is valid.".green());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("{} {e}", "Configuration is INVALID:".red().bold());
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                            "code": e.code(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

fn run_inspect(cli: &Cli, args: &InspectArgs) -> Result<(), CliError> {
    let kind = args
        .kind
        .as_deref()
        .map(|raw| {
            OutcomeKind::parse(raw.trim()).ok_or_else(|| {
                CliError::User(format!(
                    "unknown outcome kind {raw:?}; expected script, bad_precondition, stuck, or looping"
                ))
            })
        })
        .transpose()?;
    let path = archive_path(cli, args.archive.as_deref())?;
    let entries = load_entries(&path)?;
    let selected = select_entries(&entries, kind, args.limit);

    match output_mode(cli) {
        OutputMode::Human => {
            if selected.is_empty() {
                println!("No matching outcomes in {}.", path.display());
            }
            for entry in selected {
                println!("{}", entry_headline(entry));
                if let Some(details) = &entry.details {
                    println!("  {details}");
                }
                if args.render {
                    for line in entry.rendered.lines() {
                        println!("  {line}");
                    }
                }
            }
        }
        OutputMode::Json => {
            for entry in selected {
                write_json_line(&serde_json::to_value(entry)?)?;
            }
        }
    }
    Ok(())
}

fn run_stats(cli: &Cli, args: &StatsArgs) -> Result<(), CliError> {
    let path = archive_path(cli, args.archive.as_deref())?;
    let entries = load_entries(&path)?;
    let summary = ArchiveSummary::of(&entries);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{} {}", "Archive:".bold(), path.display());
            println!("  entries: {}", summary.total);
            for kind in OutcomeKind::ALL {
                let count = summary.by_kind.get(kind.as_str()).copied().unwrap_or(0);
                println!("  {:<17} {count}", format!("{kind}:"));
            }
            if summary.total > 0 {
                println!(
                    "  actions per outcome: mean {:.1}, max {}",
                    summary.mean_actions, summary.max_actions
                );
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "stats",
                "path": path.to_string_lossy(),
                "summary": serde_json::to_value(&summary)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────────── helpers ────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
struct ArchiveSummary {
    total: usize,
    by_kind: BTreeMap<&'static str, usize>,
    by_event: BTreeMap<String, usize>,
    mean_actions: f64,
    max_actions: usize,
}

impl ArchiveSummary {
    #[allow(clippy::cast_precision_loss)]
    fn of(entries: &[ArchiveEntry]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            ..Self::default()
        };
        let mut actions = 0usize;
        for entry in entries {
            *summary.by_kind.entry(entry.kind.as_str()).or_insert(0) += 1;
            let event = serde_json::to_value(entry.event)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            *summary.by_event.entry(event).or_insert(0) += 1;
            actions += entry.action_count;
            summary.max_actions = summary.max_actions.max(entry.action_count);
        }
        if summary.total > 0 {
            summary.mean_actions = actions as f64 / summary.total as f64;
        }
        summary
    }
}

fn select_entries(
    entries: &[ArchiveEntry],
    kind: Option<OutcomeKind>,
    limit: Option<usize>,
) -> Vec<&ArchiveEntry> {
    let matching: Vec<&ArchiveEntry> = entries
        .iter()
        .filter(|entry| kind.is_none_or(|k| entry.kind == k))
        .collect();
    let skip = limit.map_or(0, |n| matching.len().saturating_sub(n));
    matching.into_iter().skip(skip).collect()
}

fn entry_headline(entry: &ArchiveEntry) -> String {
    let kind = match entry.severity {
        Severity::Info => entry.kind.as_str().green(),
        Severity::Warning => entry.kind.as_str().yellow(),
        Severity::Critical => entry.kind.as_str().red().bold(),
    };
    let seed = entry
        .seed
        .map_or_else(|| "-".to_string(), |seed| seed.to_string());
    format!(
        "{} {kind} size={} seed={seed} actions={} witnesses={}",
        entry.ts.dimmed(),
        entry.size,
        entry.action_count,
        entry.witness_count
    )
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Config::load(cli.config.as_deref()).map_err(|e| CliError::Runtime(e.to_string()))
}

fn archive_path(cli: &Cli, explicit: Option<&Path>) -> Result<PathBuf, CliError> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(load_config(cli)?.archive.path),
    }
}

fn load_entries(path: &Path) -> Result<Vec<ArchiveEntry>, CliError> {
    read_archive(path).map_err(|e| {
        if e.is_retryable() {
            CliError::Runtime(e.to_string())
        } else {
            CliError::User(e.to_string())
        }
    })
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("DSCN_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
