//! One-file staging for the static-site builder
//!
//! Copies a single document into a staging project as its index page and
//! builds that project, which is much faster than building the full docs.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::StagingSettings;
use crate::error::{ConfigError, ProcessError};
use crate::worker::{run_command, runner::failure_context, CommandOutput};

const INDEX_PAGE: &str = "index.rst";
const STAGING_TOKEN: &str = "{staging}";

/// Copy `document` to `<staging_dir>/index.rst`
pub fn stage_document(document: &Path, staging_dir: &Path) -> Result<PathBuf> {
    if !staging_dir.is_dir() {
        return Err(ConfigError::MissingStagingDir(staging_dir.to_path_buf()).into());
    }

    info!("Reading {}", document.display());
    let text = fs::read_to_string(document)
        .with_context(|| format!("Failed to read {}", document.display()))?;

    let index = staging_dir.join(INDEX_PAGE);
    info!("Writing {}", index.display());
    fs::write(&index, text).with_context(|| format!("Failed to write {}", index.display()))?;
    Ok(index)
}

/// Split the configured builder command, filling in the staging directory
pub fn builder_args(command: &str, staging_dir: &Path) -> Result<(String, Vec<String>), ProcessError> {
    let staging = staging_dir.display().to_string();
    let mut parts = command
        .split_whitespace()
        .map(|part| part.replace(STAGING_TOKEN, &staging));
    let program = parts.next().ok_or(ProcessError::EmptyCommand)?;
    Ok((program, parts.collect()))
}

/// Run the builder on the staging project.
///
/// Exit code zero is success. Otherwise the combined output is scanned for
/// `keyword` and the surrounding text is logged.
pub async fn build_staged(
    settings: &StagingSettings,
    staging_dir: &Path,
    keyword: &str,
    context_chars: usize,
) -> Result<CommandOutput> {
    let (program, args) = builder_args(&settings.builder_command, staging_dir)?;
    info!("Running {} {}", program, args.join(" "));

    let output = run_command(&program, &args, None)
        .await
        .with_context(|| format!("Failed to run site builder {}", program))?;

    if output.success {
        info!("[OK:    {} exited with {:?}]", program, output.exit_code);
    } else {
        warn!("[ERROR: {} exited with {:?}]", program, output.exit_code);
        let combined = format!("{}{}", output.stdout, output.stderr);
        if let Some(context) = failure_context(&combined, keyword, context_chars) {
            error!("{}", context);
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_args_substitutes_staging() {
        let (program, args) = builder_args(
            &StagingSettings::default().builder_command,
            Path::new("/tmp/stage"),
        )
        .unwrap();
        assert_eq!(program, "sphinx-build");
        assert_eq!(
            args,
            vec![
                "-b",
                "html",
                "-d",
                "/tmp/stage/_build/doctrees",
                "/tmp/stage",
                "/tmp/stage/_build/html"
            ]
        );
    }

    #[test]
    fn test_empty_builder_command() {
        assert!(matches!(
            builder_args("   ", Path::new("x")),
            Err(ProcessError::EmptyCommand)
        ));
    }

    #[test]
    fn test_stage_document_writes_index() {
        let staging = tempfile::TempDir::new().unwrap();
        let src = tempfile::TempDir::new().unwrap();
        let doc = src.path().join("chapter.rst");
        fs::write(&doc, "Chapter\n=======\n").unwrap();

        let index = stage_document(&doc, staging.path()).unwrap();
        assert_eq!(index, staging.path().join("index.rst"));
        assert_eq!(fs::read_to_string(index).unwrap(), "Chapter\n=======\n");
    }

    #[test]
    fn test_missing_staging_dir() {
        let src = tempfile::TempDir::new().unwrap();
        let err = stage_document(&src.path().join("a.rst"), &src.path().join("missing")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingStagingDir(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_build_staged_reports_exit_status() {
        let staging = tempfile::TempDir::new().unwrap();
        let settings = StagingSettings {
            staging_dir: staging.path().to_path_buf(),
            builder_command: "sh {staging}/build.sh".to_string(),
        };
        fs::write(staging.path().join("build.sh"), "echo 'Sphinx Error: broken ref'\nexit 2\n").unwrap();

        let output = build_staged(&settings, staging.path(), "Error", 100).await.unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(2));
    }
}
