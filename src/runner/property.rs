//! Property results and monitor hooks.

#![allow(missing_docs)]

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::model::outcome::OutcomeKind;

/// Statistics hook collected from scenario branches and applied to the
/// checking property's result.
pub type MonitorHook = Rc<dyn Fn(TestResult) -> TestResult>;

/// How one test ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
    /// Neither passed nor failed; the case is thrown away.
    Discarded,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Discarded => "discarded",
        })
    }
}

/// Result of checking one generated scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub verdict: Verdict,
    /// Outcome the scenario generation produced, once known.
    pub classification: Option<OutcomeKind>,
    pub reason: Option<String>,
    /// Labels added by monitors, in application order.
    pub labels: Vec<String>,
    /// Rendered evidence shown when the test fails.
    pub counterexample: Vec<String>,
}

impl TestResult {
    fn with_verdict(verdict: Verdict) -> Self {
        Self {
            verdict,
            classification: None,
            reason: None,
            labels: Vec::new(),
            counterexample: Vec::new(),
        }
    }

    #[must_use]
    pub fn passed() -> Self {
        Self::with_verdict(Verdict::Passed)
    }

    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::with_verdict(Verdict::Failed)
        }
    }

    #[must_use]
    pub fn discarded(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::with_verdict(Verdict::Discarded)
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    #[must_use]
    pub fn with_counterexample(mut self, evidence: impl Into<String>) -> Self {
        self.counterexample.push(evidence.into());
        self
    }

    #[must_use]
    pub fn classified(mut self, kind: OutcomeKind) -> Self {
        self.classification = Some(kind);
        self
    }

    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.verdict == Verdict::Passed
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.verdict == Verdict::Failed
    }

    #[must_use]
    pub fn is_discarded(&self) -> bool {
        self.verdict == Verdict::Discarded
    }
}

impl From<bool> for TestResult {
    fn from(ok: bool) -> Self {
        if ok {
            Self::passed()
        } else {
            Self::failed("property returned false")
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verdict)?;
        if let Some(kind) = self.classification {
            write!(f, " ({kind})")?;
        }
        if let Some(reason) = &self.reason {
            write!(f, ": {reason}")?;
        }
        for evidence in &self.counterexample {
            write!(f, "\n{evidence}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bools_convert_to_verdicts() {
        assert!(TestResult::from(true).is_passed());
        let failed = TestResult::from(false);
        assert!(failed.is_failed());
        assert_eq!(failed.reason.as_deref(), Some("property returned false"));
    }

    #[test]
    fn monitors_compose_in_order() {
        let first: MonitorHook = Rc::new(|r: TestResult| r.with_label("a"));
        let second: MonitorHook = Rc::new(|r: TestResult| r.with_label("b"));
        let result = [first, second]
            .iter()
            .fold(TestResult::passed(), |acc, hook| hook(acc));
        assert_eq!(result.labels, vec!["a", "b"]);
    }

    #[test]
    fn display_includes_classification_and_evidence() {
        let result = TestResult::failed("boom")
            .classified(OutcomeKind::BadPrecondition)
            .with_counterexample("trace: []");
        assert_eq!(
            result.to_string(),
            "failed (bad_precondition): boom\ntrace: []"
        );
        assert!(!result.is_discarded());
    }
}
