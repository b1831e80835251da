//! Run result types.

use crate::case::BenchmarkUnits;
use crate::stats::BenchmarkStats;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Final classification of one planned entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseOutcome {
    Ok,
    Fail,
    XFail,
    XPass,
    Skip,
    /// The case ran without making a single check.
    NoCheck,
    Bench,
}

impl CaseOutcome {
    /// Right-aligned status column of a report line.
    pub fn status(self) -> &'static str {
        match self {
            CaseOutcome::Ok => "    OK",
            CaseOutcome::Fail => "  FAIL",
            CaseOutcome::XFail => " XFAIL",
            CaseOutcome::XPass => " XPASS",
            CaseOutcome::Skip => "  SKIP",
            CaseOutcome::NoCheck => "     ?",
            CaseOutcome::Bench => " BENCH",
        }
    }

    /// Counts towards the error total.
    pub fn is_error(self) -> bool {
        matches!(self, CaseOutcome::Fail | CaseOutcome::XPass)
    }
}

/// Measurements of one benchmark entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    #[serde(flatten)]
    pub stats: BenchmarkStats,
    /// Repetitions that went into the statistics.
    pub samples: usize,
    pub batch_size: usize,
    pub units: BenchmarkUnits,
    /// Name of what was measured, e.g. `wall time`.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub measured: String,
}

/// Result of one planned entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    /// 1-based registry number.
    pub id: usize,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
    pub outcome: CaseOutcome,
    /// Failure detail, skip reason or expected-failure justification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<BenchmarkRecord>,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    /// Every planned entry ran.
    Completed,
    /// Stopped after the first failure.
    Aborted,
    /// Filtering by kind left nothing, which is not an error.
    NothingToRun,
    /// No case was planned at all.
    Empty,
}

/// Results of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub name: String,
    pub status: RunStatus,
    pub cases: Vec<CaseRecord>,
    pub check_count: usize,
    pub error_count: usize,
    pub no_check_count: usize,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl RunSummary {
    pub(crate) fn new(name: &str, status: RunStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            cases: Vec::new(),
            check_count: 0,
            error_count: 0,
            no_check_count: 0,
            duration: Duration::ZERO,
        }
    }

    /// Load a summary written by a JSON report.
    pub fn load(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Process exit status for this run: 0 on success, 1 when a check
    /// failed or a case made no checks, 2 when nothing was planned.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Empty => 2,
            RunStatus::NothingToRun => 0,
            RunStatus::Completed | RunStatus::Aborted => {
                if self.error_count > 0 || self.no_check_count > 0 {
                    1
                } else {
                    0
                }
            }
        }
    }

    pub fn passed(&self) -> bool {
        self.exit_code() == 0
    }

    /// Records with the given outcome.
    pub fn with_outcome(&self, outcome: CaseOutcome) -> impl Iterator<Item = &CaseRecord> {
        self.cases.iter().filter(move |c| c.outcome == outcome)
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_nanos().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let nanos = u128::deserialize(d)?;
        Ok(Duration::from_nanos(nanos as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(outcome: CaseOutcome) -> CaseRecord {
        CaseRecord {
            id: 1,
            name: "case".to_string(),
            description: String::new(),
            outcome,
            message: None,
            benchmark: None,
        }
    }

    #[test]
    fn should_exit_zero_when_all_passed() {
        let mut summary = RunSummary::new("Suite", RunStatus::Completed);
        summary.cases.push(record(CaseOutcome::Ok));
        summary.cases.push(record(CaseOutcome::XFail));
        assert_eq!(summary.exit_code(), 0);
        assert!(summary.passed());
    }

    #[test]
    fn should_exit_one_when_errors_or_missing_checks() {
        let mut summary = RunSummary::new("Suite", RunStatus::Aborted);
        summary.error_count = 1;
        assert_eq!(summary.exit_code(), 1);

        let mut summary = RunSummary::new("Suite", RunStatus::Completed);
        summary.no_check_count = 1;
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn should_exit_two_when_nothing_planned() {
        assert_eq!(RunSummary::new("Suite", RunStatus::Empty).exit_code(), 2);
        assert_eq!(RunSummary::new("Suite", RunStatus::NothingToRun).exit_code(), 0);
    }

    #[test]
    fn should_classify_errors() {
        assert!(CaseOutcome::Fail.is_error());
        assert!(CaseOutcome::XPass.is_error());
        assert!(!CaseOutcome::XFail.is_error());
        assert!(!CaseOutcome::NoCheck.is_error());
        assert_eq!(CaseOutcome::NoCheck.status(), "     ?");
    }

    #[test]
    fn should_serialize_outcomes_in_lowercase() {
        let json = serde_json::to_string(&record(CaseOutcome::XPass)).unwrap();
        assert!(json.contains("\"outcome\":\"xpass\""), "{}", json);
        assert!(!json.contains("description"));
    }
}
