use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::ValidateSettings;
use crate::error::ProcessError;
use crate::types::{Outcome, ValidationResult, ValidationTask};

/// How each script is launched and judged
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub interpreter: String,
    pub interpreter_args: Vec<String>,
    pub timeout: Option<Duration>,
    pub failure_keyword: String,
    pub context_chars: usize,
}

impl From<&ValidateSettings> for RunnerSettings {
    fn from(settings: &ValidateSettings) -> Self {
        Self {
            interpreter: settings.interpreter.clone(),
            interpreter_args: settings.interpreter_args.clone(),
            timeout: settings.timeout_secs.map(Duration::from_secs),
            failure_keyword: settings.failure_keyword.clone(),
            context_chars: settings.context_chars,
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from(&ValidateSettings::default())
    }
}

/// Everything a finished process left behind
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Run a program to completion with its output captured.
///
/// stdin is closed and the child is killed if the timeout expires.
pub async fn run_command(
    program: &str,
    args: &[String],
    timeout: Option<Duration>,
) -> Result<CommandOutput, ProcessError> {
    let started = Instant::now();

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.to_string(),
            source,
        })?;

    // Dropping the wait future drops the child, which kills it
    let waited = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| ProcessError::Timeout(limit))?,
        None => child.wait_with_output().await,
    };
    let output = waited.map_err(|source| ProcessError::Wait {
        program: program.to_string(),
        source,
    })?;

    Ok(CommandOutput {
        exit_code: output.status.code(),
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        duration: started.elapsed(),
    })
}

/// OK iff the process exited with status zero
pub fn classify(exit_code: Option<i32>) -> Outcome {
    match exit_code {
        Some(0) => Outcome::Ok,
        _ => Outcome::Error,
    }
}

/// Up to `context_chars` characters before the first `keyword` in `stdout`,
/// plus everything from the keyword on.
pub fn failure_context(stdout: &str, keyword: &str, context_chars: usize) -> Option<String> {
    if keyword.is_empty() {
        return None;
    }
    let at = stdout.find(keyword)?;
    let start = match context_chars {
        0 => at,
        n => stdout[..at].char_indices().rev().nth(n - 1).map_or(0, |(i, _)| i),
    };
    Some(stdout[start..].to_string())
}

/// Run one script and classify it. Never fails: problems become
/// `Error` or `Crashed` results.
pub async fn run_script(task: ValidationTask, settings: &RunnerSettings) -> ValidationResult {
    let started = Instant::now();
    let mut args = settings.interpreter_args.clone();
    args.push(task.script.display().to_string());
    let cmd = format!("{} {}", settings.interpreter, args.join(" "));

    debug!("Running task {}: {}", task.index, cmd);

    match run_command(&settings.interpreter, &args, settings.timeout).await {
        Ok(output) => {
            let outcome = classify(output.exit_code);
            let diagnostic = match outcome {
                Outcome::Ok => {
                    info!("[OK:    {:?} exited with {:?}]", cmd, output.exit_code);
                    None
                }
                _ => {
                    warn!("[ERROR: {:?} exited with {:?}]", cmd, output.exit_code);
                    let context = failure_context(&output.stdout, &settings.failure_keyword, settings.context_chars);
                    if let Some(context) = &context {
                        error!("{}", context);
                    }
                    context
                }
            };

            ValidationResult {
                index: task.index,
                script: task.script,
                outcome,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
                diagnostic,
                crash_reason: None,
                duration_ms: output.duration.as_millis() as u64,
            }
        }
        Err(e) => {
            error!("[CRASHED: {:?}: {}]", cmd, e);
            crashed(task.index, &task.script, e.to_string(), started.elapsed())
        }
    }
}

/// Result for a task that never produced an exit status
pub fn crashed(index: usize, script: &Path, reason: String, elapsed: Duration) -> ValidationResult {
    ValidationResult {
        index,
        script: script.to_path_buf(),
        outcome: Outcome::Crashed,
        exit_code: None,
        stdout: String::new(),
        stderr: String::new(),
        diagnostic: None,
        crash_reason: Some(reason),
        duration_ms: elapsed.as_millis() as u64,
    }
}

#[cfg(test)]
#[path = "tests/runner_tests.rs"]
mod tests;
