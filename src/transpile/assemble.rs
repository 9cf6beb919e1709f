//! Turn rewritten regions into one script.

use std::fs;
use std::path::Path;

use crate::error::TranspileError;
use crate::transpile::hopper::Hopper;
use crate::types::{CodeRegion, GeneratedScript};

/// What assembling a document produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleOutcome {
    Written(GeneratedScript),
    /// Nothing survived extraction and cleanup; no file was written
    NoCode,
}

/// Remove one level of indentation: the indent of the first non-blank line.
/// Lines indented less than that are left alone.
pub fn dedent(region: &CodeRegion) -> CodeRegion {
    let width = region
        .lines
        .iter()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches(' ').len())
        .unwrap_or(0);

    let lines = region
        .lines
        .iter()
        .map(|line| match line.get(..width) {
            Some(prefix) if prefix.bytes().all(|b| b == b' ') => line[width..].to_string(),
            _ => line.clone(),
        })
        .collect();

    CodeRegion::new(region.position, lines)
}

/// Place hopper entries in the code stream.
///
/// Each cleanup line is preceded by the saves captured since the previous
/// flush, at the cleanup line's indentation. Saves left over at the end form
/// one final block.
pub fn flush_hopper(regions: &[CodeRegion], hopper: &Hopper, cleanup_call: &str) -> Vec<Vec<String>> {
    let entries = hopper.entries();
    let mut next = 0;
    let mut blocks = Vec::with_capacity(regions.len() + 1);

    for (index, region) in regions.iter().enumerate() {
        let mut block = Vec::with_capacity(region.lines.len());
        for (line_no, line) in region.lines.iter().enumerate() {
            if line.contains(cleanup_call) {
                let indent = &line[..line.len() - line.trim_start().len()];
                while next < entries.len() && (entries[next].region, entries[next].line) < (index, line_no) {
                    block.push(format!("{}{}", indent, entries[next].statement));
                    next += 1;
                }
            }
            block.push(line.clone());
        }
        blocks.push(block);
    }

    if next < entries.len() {
        blocks.push(entries[next..].iter().map(|e| e.statement.clone()).collect());
    }

    blocks
}

/// Blank out whitespace-only lines, squeeze blank runs to a single blank
/// line, and join the blocks with one blank line. Other lines are kept as
/// written. Returns `None` when no code is left.
pub fn render(blocks: &[Vec<String>]) -> Option<String> {
    let mut rendered = Vec::new();

    for block in blocks {
        let mut lines: Vec<&str> = Vec::with_capacity(block.len());
        for line in block {
            let line = if line.trim().is_empty() { "" } else { line.as_str() };
            if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
                continue;
            }
            lines.push(line);
        }
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        if !lines.is_empty() {
            rendered.push(lines.join("\n"));
        }
    }

    if rendered.is_empty() {
        return None;
    }

    let mut text = rendered.join("\n\n");
    text.push('\n');
    Some(text)
}

/// Dedent, flush the hopper, and render.
pub fn assemble(regions: &[CodeRegion], hopper: &Hopper, cleanup_call: &str) -> Option<String> {
    let dedented: Vec<CodeRegion> = regions.iter().map(dedent).collect();
    render(&flush_hopper(&dedented, hopper, cleanup_call))
}

/// Write a script, creating parent directories as needed
pub fn write_script(path: &Path, text: &str) -> Result<(), TranspileError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TranspileError::write(parent, e))?;
    }
    fs::write(path, text).map_err(|e| TranspileError::write(path, e))
}
