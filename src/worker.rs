//! Concurrent script validation
//!
//! Each matching script runs as its own subprocess inside a bounded
//! [`WorkerPool`]; the results are gathered into a [`ValidationSummary`].

pub mod pool;
pub mod report;
pub mod runner;

use chrono::Utc;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ValidateSettings;
use crate::error::ConfigError;
use crate::types::{ValidationSummary, ValidationTask};

pub use pool::WorkerPool;
pub use report::render_summary;
pub use runner::{run_command, run_script, CommandOutput, RunnerSettings};

/// Inputs for one validation run
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub dir: PathBuf,
    pub pattern: String,
    pub workers: usize,
    pub runner: RunnerSettings,
}

impl ValidationContext {
    pub fn from_settings(settings: &ValidateSettings, dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pattern: settings.pattern.clone(),
            workers: settings.workers,
            runner: RunnerSettings::from(settings),
        }
    }
}

/// Compile a file name pattern where `*` matches any run of characters and
/// `?` matches exactly one.
pub fn pattern_regex(pattern: &str) -> Result<Regex, ConfigError> {
    if pattern.contains('/') || pattern.contains('\\') {
        return Err(ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "patterns match file names, not paths".to_string(),
        });
    }

    let mut source = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            c => source.push_str(&regex::escape(&c.to_string())),
        }
    }
    source.push('$');

    Regex::new(&source).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Files directly inside `dir` whose names match `pattern`, sorted
pub fn find_scripts(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::MissingScriptDir(dir.to_path_buf()));
    }
    let matcher = pattern_regex(pattern)?;

    let entries = fs::read_dir(dir).map_err(|_| ConfigError::MissingScriptDir(dir.to_path_buf()))?;
    let mut scripts: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| matcher.is_match(name))
        })
        .collect();

    scripts.sort();
    Ok(scripts)
}

/// Run every matching script and summarize.
///
/// Only configuration problems are errors; failing or crashing scripts are
/// recorded in the summary.
pub async fn validate_dir(ctx: &ValidationContext) -> Result<ValidationSummary, ConfigError> {
    let pool = WorkerPool::new(ctx.workers)?;
    let scripts = find_scripts(&ctx.dir, &ctx.pattern)?;

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    info!(
        "Validation run {}: {} script(s) in {} matching {}, {} worker(s)",
        run_id,
        scripts.len(),
        ctx.dir.display(),
        ctx.pattern,
        pool.workers()
    );

    let tasks: Vec<ValidationTask> = scripts
        .into_iter()
        .enumerate()
        .map(|(index, script)| ValidationTask { index, script })
        .collect();
    let submitted: Vec<PathBuf> = tasks.iter().map(|t| t.script.clone()).collect();

    let settings = Arc::new(ctx.runner.clone());
    let joined = pool
        .run(tasks, move |task| {
            let settings = Arc::clone(&settings);
            async move { run_script(task, &settings).await }
        })
        .await;

    let results = joined
        .into_iter()
        .zip(submitted)
        .enumerate()
        .map(|(index, (joined, script))| match joined {
            Ok(result) => result,
            Err(e) => runner::crashed(index, &script, format!("worker slot failed: {}", e), Duration::ZERO),
        })
        .collect();

    let summary = ValidationSummary::from_results(run_id, started_at, results);
    info!(
        "Validation run {} finished: {} OK, {} ERROR, {} CRASHED",
        summary.run_id, summary.ok, summary.error, summary.crashed
    );
    Ok(summary)
}
