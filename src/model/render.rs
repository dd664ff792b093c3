//! Stable human-readable rendering of steps, failed steps, and outcomes.
//!
//! Lists use one bracketed form everywhere: `[]` when empty, `[x]` inline for
//! a single element, and otherwise one indented entry per line with trailing
//! commas (the last entry has none) and the closing bracket on its own line.

use std::fmt::{self, Debug, Display, Write as _};

use crate::model::outcome::Outcome;
use crate::model::step::{FailedStep, Step};

const INDENT: &str = "  ";

/// Render `items` as a bracketed list whose continuation lines start at
/// `indent` levels.
#[must_use]
pub fn render_list<T: Display>(items: &[T], indent: usize) -> String {
    match items {
        [] => "[]".to_string(),
        [only] => format!("[{only}]"),
        many => {
            let pad = INDENT.repeat(indent);
            let mut out = String::from("[\n");
            for (i, item) in many.iter().enumerate() {
                let sep = if i + 1 == many.len() { "" } else { "," };
                let _ = writeln!(out, "{pad}{INDENT}{item}{sep}");
            }
            out.push_str(&pad);
            out.push(']');
            out
        }
    }
}

impl<A: Debug> Display for Step<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Do {
                var,
                action,
                binds: true,
            } => write!(f, "Do({var} := {action})"),
            Self::Do { action, .. } => write!(f, "Do({action})"),
            Self::Witness { value } => write!(f, "Witness({}: {value})", value.kind()),
        }
    }
}

impl<A: Debug> Display for FailedStep<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActionFailure { action, .. } => write!(f, "ActionFailure({action})"),
            Self::AssertionFailure { message } => write!(f, "AssertionFailure({message:?})"),
        }
    }
}

impl<A: Debug, S: Debug> Display for Outcome<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadPrecondition {
                trace,
                failures,
                state,
            } => {
                writeln!(f, "BadPrecondition")?;
                writeln!(f, "{INDENT}trace: {}", render_list(trace, 1))?;
                writeln!(f, "{INDENT}failures: {}", render_list(failures, 1))?;
                write!(f, "{INDENT}state: {state:?}")
            }
            Self::Looping { trace } => {
                writeln!(f, "Looping")?;
                write!(f, "{INDENT}trace: {}", render_list(trace, 1))
            }
            Self::Stuck { trace, state } => {
                writeln!(f, "Stuck")?;
                writeln!(f, "{INDENT}trace: {}", render_list(trace, 1))?;
                write!(f, "{INDENT}state: {state:?}")
            }
            Self::Script { trace } => {
                writeln!(f, "Script")?;
                write!(f, "{INDENT}trace: {}", render_list(trace, 1))
            }
        }
    }
}
