#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use dynamic_scenarios::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

// ──────────────────── bank model ────────────────────

/// A single account with a clock. Withdrawals need covering funds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    pub balance: u64,
    pub clock: u64,
    pub audits: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    Deposit(u64),
    Withdraw(u64),
    Audit,
}

impl StateModel for Bank {
    type Action = Op;

    fn initial_state() -> Self {
        Self::default()
    }

    fn arbitrary_action(&self, rng: &mut ScenarioRng, size: usize) -> Option<Op> {
        let ceiling = (size as u64).max(1) * 10;
        match rng.random_range(0..3) {
            0 => Some(Op::Deposit(rng.random_range(1..=ceiling))),
            1 if self.balance > 0 => Some(Op::Withdraw(rng.random_range(1..=self.balance))),
            1 => None,
            _ => Some(Op::Audit),
        }
    }

    fn precondition(&self, action: &Op) -> bool {
        match action {
            Op::Deposit(amount) => *amount > 0,
            Op::Withdraw(amount) => self.balance >= *amount,
            Op::Audit => true,
        }
    }

    fn next_state(&mut self, action: &Op, _var: Var) {
        match action {
            Op::Deposit(amount) => self.balance += amount,
            Op::Withdraw(amount) => self.balance -= amount,
            Op::Audit => self.audits += 1,
        }
    }

    fn binds_result(&self, action: &Op) -> bool {
        !matches!(action, Op::Audit)
    }

    fn now(&self) -> Tick {
        self.clock
    }

    fn advance_to(&mut self, tick: Tick) {
        self.clock = tick;
    }
}

/// Replays an executable sequence against a fresh ledger; `false` on overdraft.
pub fn ledger_never_overdrawn(sequence: &ActionSequence<Op>) -> bool {
    let mut balance: i128 = 0;
    for op in sequence.domain_actions() {
        match op {
            Op::Deposit(amount) => balance += i128::from(*amount),
            Op::Withdraw(amount) => balance -= i128::from(*amount),
            Op::Audit => {}
        }
        if balance < 0 {
            return false;
        }
    }
    true
}

/// Random traffic, then an optional audit decided by a recorded coin flip.
pub fn audited_traffic() -> Scenario<Bank> {
    any_actions_default().then(for_all(
        |rng: &mut ScenarioRng, _size| rng.random_bool(0.5),
        |audit: bool| {
            if audit {
                label("audited").then(action(Op::Audit))
            } else {
                label("unaudited").then(done())
            }
        },
    ))
}

// ──────────────────── CLI harness ────────────────────

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_dscn") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "dscn.exe" } else { "dscn" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve dscn binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("dscn-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("RUST_LOG", "debug")
        .env("RUST_BACKTRACE", "1")
        .env_remove("DSCN_OUTPUT_FORMAT")
        .output()
        .expect("execute dscn command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
