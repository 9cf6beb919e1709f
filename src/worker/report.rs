use std::fmt::Write;

use crate::types::{Outcome, ValidationResult, ValidationSummary};

/// Human-readable summary of a validation run
pub fn render_summary(summary: &ValidationSummary, stderr_tail_lines: usize) -> String {
    let mut out = String::new();
    let elapsed = summary.finished_at - summary.started_at;

    let _ = writeln!(out, "Validation run {}", summary.run_id);
    let _ = writeln!(
        out,
        "{} script(s) in {:.2}s: {} OK, {} ERROR, {} CRASHED",
        summary.total(),
        elapsed.num_milliseconds() as f64 / 1000.0,
        summary.ok,
        summary.error,
        summary.crashed
    );

    for result in &summary.results {
        let _ = writeln!(
            out,
            "  [{:<7}] {} ({}, {} ms)",
            result.outcome.as_str(),
            result.script.display(),
            exit_label(result),
            result.duration_ms
        );
    }

    for result in summary.results.iter().filter(|r| r.outcome != Outcome::Ok) {
        let _ = writeln!(out, "\n--- {} {}", result.outcome, result.script.display());
        match result.outcome {
            Outcome::Crashed => {
                let reason = result.crash_reason.as_deref().unwrap_or("unknown");
                let _ = writeln!(out, "{}", reason);
            }
            _ => match &result.diagnostic {
                Some(diagnostic) => {
                    let _ = writeln!(out, "{}", diagnostic.trim_end());
                }
                None => {
                    let tail = tail_lines(&result.stderr, stderr_tail_lines);
                    if tail.is_empty() {
                        let _ = writeln!(out, "(no diagnostic output)");
                    } else {
                        let _ = writeln!(out, "{}", tail);
                    }
                }
            },
        }
    }

    out
}

fn exit_label(result: &ValidationResult) -> String {
    match (result.outcome, result.exit_code) {
        (Outcome::Crashed, _) => "did not finish".to_string(),
        (_, Some(code)) => format!("exit {}", code),
        (_, None) => "killed by signal".to_string(),
    }
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn result(index: usize, outcome: Outcome, exit_code: Option<i32>) -> ValidationResult {
        ValidationResult {
            index,
            script: PathBuf::from(format!("out/s{}.py", index)),
            outcome,
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
            diagnostic: None,
            crash_reason: None,
            duration_ms: 5,
        }
    }

    #[test]
    fn test_render_lists_counts_and_diagnostics() {
        let mut failing = result(1, Outcome::Error, Some(1));
        failing.diagnostic = Some("x\nKeyError: 'a'\n".to_string());
        let mut quiet = result(2, Outcome::Error, Some(2));
        quiet.stderr = "line1\nline2\nline3\n".to_string();
        let mut crashed = result(3, Outcome::Crashed, None);
        crashed.crash_reason = Some("Timed out after 1s".to_string());

        let summary = ValidationSummary::from_results(
            Uuid::new_v4(),
            Utc::now(),
            vec![result(0, Outcome::Ok, Some(0)), failing, quiet, crashed],
        );
        let text = render_summary(&summary, 2);

        assert!(text.contains("4 script(s)"));
        assert!(text.contains("1 OK, 2 ERROR, 1 CRASHED"));
        assert!(text.contains("[OK     ] out/s0.py (exit 0, 5 ms)"));
        assert!(text.contains("[CRASHED] out/s3.py (did not finish, 5 ms)"));
        assert!(text.contains("KeyError: 'a'"));
        assert!(text.contains("line2\nline3"));
        assert!(!text.contains("line1"));
        assert!(text.contains("Timed out after 1s"));
    }

    #[test]
    fn test_all_ok_has_no_detail_sections() {
        let summary = ValidationSummary::from_results(
            Uuid::new_v4(),
            Utc::now(),
            vec![result(0, Outcome::Ok, Some(0))],
        );
        let text = render_summary(&summary, 10);
        assert!(!text.contains("---"));
    }

    #[test]
    fn test_tail_lines() {
        assert_eq!(tail_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail_lines("a\n", 5), "a");
        assert_eq!(tail_lines("", 5), "");
    }
}
