use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::check_image_dir;
use crate::error::ConfigError;
use crate::transpile::{transpile_file, AssembleOutcome, TranspileContext};

/// What happened to each document in a batch
#[derive(Debug, Default)]
pub struct TranspileReport {
    pub written: Vec<PathBuf>,
    /// Documents without any code
    pub empty: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl TranspileReport {
    pub fn documents(&self) -> usize {
        self.written.len() + self.empty.len() + self.failed.len()
    }
}

/// Delete old scripts in `to_dir` and everything in its image folder,
/// creating both directories if needed
pub fn clear_output_dir(ctx: &TranspileContext) -> Result<()> {
    check_image_dir(&ctx.image_dir)?;
    let image_dir = ctx.image_path();
    fs::create_dir_all(&image_dir)
        .with_context(|| format!("Failed to create {}", image_dir.display()))?;

    for entry in fs::read_dir(&ctx.to_dir)
        .with_context(|| format!("Failed to list {}", ctx.to_dir.display()))?
    {
        let path = entry?.path();
        let is_script = path.extension().is_some_and(|ext| *ext == *ctx.script_extension);
        if path.is_file() && is_script {
            info!("Deleting {}", path.display());
            fs::remove_file(&path).with_context(|| format!("Failed to delete {}", path.display()))?;
        }
    }

    info!("Deleting all images in {}", image_dir.display());
    for entry in fs::read_dir(&image_dir)
        .with_context(|| format!("Failed to list {}", image_dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path).with_context(|| format!("Failed to delete {}", path.display()))?;
        }
    }

    Ok(())
}

/// Documents under `from_dir` with the given extension, sorted by path
pub fn find_documents(from_dir: &Path, extension: &str) -> Vec<PathBuf> {
    WalkDir::new(from_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| *ext == *extension))
        .collect()
}

/// Convert every document under `from_dir` into `ctx.to_dir`.
///
/// The destination is cleared first. A failing document is logged and
/// recorded; the rest of the batch still runs.
pub fn transpile_dir(ctx: &TranspileContext, from_dir: &Path, extension: &str) -> Result<TranspileReport> {
    if !from_dir.is_dir() {
        return Err(ConfigError::MissingSourceDir(from_dir.to_path_buf()).into());
    }
    info!("Transpiling documents under {}", from_dir.display());

    clear_output_dir(ctx)?;

    let documents = find_documents(from_dir, extension);
    warn_on_name_clashes(ctx, &documents);

    let mut report = TranspileReport::default();
    for (i, document) in documents.iter().enumerate() {
        info!("Converting file {}: {}", i, document.display());
        record(&mut report, document, transpile_file(ctx, document));
    }

    info!(
        "Transpiled {} document(s): {} written, {} without code, {} failed",
        report.documents(),
        report.written.len(),
        report.empty.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Convert an explicit list of documents without clearing anything
pub fn transpile_files(ctx: &TranspileContext, documents: &[PathBuf]) -> TranspileReport {
    let mut report = TranspileReport::default();
    for document in documents {
        record(&mut report, document, transpile_file(ctx, document));
    }
    report
}

fn record(
    report: &mut TranspileReport,
    document: &Path,
    outcome: std::result::Result<AssembleOutcome, crate::error::TranspileError>,
) {
    match outcome {
        Ok(AssembleOutcome::Written(script)) => report.written.push(script.path),
        Ok(AssembleOutcome::NoCode) => report.empty.push(document.to_path_buf()),
        Err(e) => {
            error!("Failed to transpile {}: {}", document.display(), e);
            report.failed.push((document.to_path_buf(), e.to_string()));
        }
    }
}

fn warn_on_name_clashes(ctx: &TranspileContext, documents: &[PathBuf]) {
    let mut targets: HashMap<PathBuf, &PathBuf> = HashMap::new();
    for document in documents {
        let Ok(target) = ctx.script_path(document) else {
            continue;
        };
        if let Some(previous) = targets.insert(target.clone(), document) {
            warn!(
                "{} and {} both write {}; the later one wins",
                previous.display(),
                document.display(),
                target.display()
            );
        }
    }
}
