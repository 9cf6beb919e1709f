use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One embedded code block, in the order it appeared in its document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRegion {
    pub position: usize,
    pub lines: Vec<String>,
}

impl CodeRegion {
    pub fn new(position: usize, lines: Vec<String>) -> Self {
        Self { position, lines }
    }

    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|line| line.trim().is_empty())
    }
}

/// Assembled script text and where it belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScript {
    pub path: PathBuf,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTask {
    /// Submission order, used to report results in order
    pub index: usize,
    pub script: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ok,
    Error,
    Crashed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "OK",
            Outcome::Error => "ERROR",
            Outcome::Crashed => "CRASHED",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub index: usize,
    pub script: PathBuf,
    pub outcome: Outcome,
    /// None when the process never ran, was killed, or ended by signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Text around the first failure keyword in stdout (non-zero exits only)
    pub diagnostic: Option<String>,
    /// Why a crashed task never completed
    pub crash_reason: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ok: usize,
    pub error: usize,
    pub crashed: usize,
    /// Submission order, independent of completion order
    pub results: Vec<ValidationResult>,
}

impl ValidationSummary {
    pub fn from_results(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        results: Vec<ValidationResult>,
    ) -> Self {
        let count = |outcome: Outcome| results.iter().filter(|r| r.outcome == outcome).count();

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            ok: count(Outcome::Ok),
            error: count(Outcome::Error),
            crashed: count(Outcome::Crashed),
            results,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// True when nothing failed or crashed
    pub fn is_success(&self) -> bool {
        self.error == 0 && self.crashed == 0
    }
}
