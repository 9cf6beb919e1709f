//! Figure captures, split into an immediate snapshot and a deferred save.
//!
//! `@savefig hist.png width=4in` becomes `fig_generated_0 = plt.gcf()` at the
//! call site, while `fig_generated_0.savefig(".../img/hist.png")` waits in the
//! hopper until the assembler finds a place for it.

use std::path::Path;
use tracing::warn;

use crate::types::CodeRegion;

const FIGURE_VAR_PREFIX: &str = "fig_generated_";
const SUPPRESS_DECORATOR: &str = "@suppress";

/// A deferred save, remembering where its capture happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopperEntry {
    /// Index of the region in the assembled sequence
    pub region: usize,
    /// Line of the binding statement within the rewritten region
    pub line: usize,
    pub statement: String,
}

/// Deferred statements for one script. The counter never resets, so
/// generated names stay unique across the whole script.
#[derive(Debug, Default)]
pub struct Hopper {
    entries: Vec<HopperEntry>,
    next_id: usize,
}

impl Hopper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next generated figure variable name
    pub fn next_var(&mut self) -> String {
        let var = format!("{}{}", FIGURE_VAR_PREFIX, self.next_id);
        self.next_id += 1;
        var
    }

    pub fn push(&mut self, region: usize, line: usize, statement: String) {
        self.entries.push(HopperEntry {
            region,
            line,
            statement,
        });
    }

    pub fn entries(&self) -> &[HopperEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rewrites capture lines and fills the hopper
#[derive(Debug, Clone)]
pub struct CaptureRewriter {
    marker: String,
    image_root: String,
}

impl CaptureRewriter {
    pub fn new(marker: impl Into<String>, out_dir: &Path, image_dir: &str) -> Self {
        Self {
            marker: marker.into(),
            image_root: format!("{}/{}", out_dir.display(), image_dir),
        }
    }

    /// Produce a rewritten copy of `region`. `index` is the region's slot in
    /// the sequence handed to the assembler.
    pub fn rewrite(&self, index: usize, region: &CodeRegion, hopper: &mut Hopper) -> CodeRegion {
        let mut lines = Vec::with_capacity(region.lines.len());

        for line in &region.lines {
            let body = line.trim_start();
            let indent = &line[..line.len() - body.len()];

            if body.trim_end() == SUPPRESS_DECORATOR {
                continue;
            }

            match self.capture_target(body) {
                Some(Some(file_name)) => {
                    let var = hopper.next_var();
                    let save = format!("{}.savefig(\"{}/{}\")", var, self.image_root, file_name)
                        .replace('\\', "/");
                    hopper.push(index, lines.len(), save);
                    lines.push(format!("{}{} = plt.gcf()", indent, var));
                }
                Some(None) => {
                    warn!("{} without a file name left as is: {}", self.marker, body);
                    lines.push(line.clone());
                }
                None => lines.push(line.clone()),
            }
        }

        CodeRegion::new(region.position, lines)
    }

    /// `None` if not a capture line, `Some(None)` if the file name is missing
    fn capture_target<'a>(&self, body: &'a str) -> Option<Option<&'a str>> {
        let rest = body.strip_prefix(self.marker.as_str())?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        Some(rest.split_whitespace().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(lines: &[&str]) -> CodeRegion {
        CodeRegion::new(0, lines.iter().map(|l| l.to_string()).collect())
    }

    #[test]
    fn test_capture_is_split() {
        let rewriter = CaptureRewriter::new("@savefig", Path::new("out"), "img");
        let mut hopper = Hopper::new();
        let rewritten = rewriter.rewrite(
            0,
            &region(&["   x = 1", "   @savefig hist.png width=4in", "   plt.hist(x)"]),
            &mut hopper,
        );

        assert_eq!(
            rewritten.lines,
            vec!["   x = 1", "   fig_generated_0 = plt.gcf()", "   plt.hist(x)"]
        );
        assert_eq!(hopper.len(), 1);
        assert_eq!(
            hopper.entries()[0],
            HopperEntry {
                region: 0,
                line: 1,
                statement: "fig_generated_0.savefig(\"out/img/hist.png\")".to_string(),
            }
        );
    }

    #[test]
    fn test_counter_spans_regions() {
        let rewriter = CaptureRewriter::new("@savefig", Path::new("out"), "img");
        let mut hopper = Hopper::new();
        rewriter.rewrite(0, &region(&["@savefig a.png", "plot()"]), &mut hopper);
        let second = rewriter.rewrite(1, &region(&["@savefig b.png", "plot()"]), &mut hopper);

        assert_eq!(second.lines[0], "fig_generated_1 = plt.gcf()");
        let regions: Vec<usize> = hopper.entries().iter().map(|e| e.region).collect();
        assert_eq!(regions, vec![0, 1]);
    }

    #[test]
    fn test_backslashes_normalized() {
        let rewriter = CaptureRewriter::new("@savefig", Path::new(r"C:\temp\out"), "img");
        let mut hopper = Hopper::new();
        rewriter.rewrite(0, &region(&[r"@savefig sub\fig.png"]), &mut hopper);
        assert_eq!(
            hopper.entries()[0].statement,
            "fig_generated_0.savefig(\"C:/temp/out/img/sub/fig.png\")"
        );
    }

    #[test]
    fn test_suppress_decorator_dropped() {
        let rewriter = CaptureRewriter::new("@savefig", Path::new("out"), "img");
        let mut hopper = Hopper::new();
        let rewritten = rewriter.rewrite(0, &region(&["   @suppress", "   import os"]), &mut hopper);
        assert_eq!(rewritten.lines, vec!["   import os"]);
        assert!(hopper.is_empty());
    }

    #[test]
    fn test_lookalike_lines_untouched() {
        let rewriter = CaptureRewriter::new("@savefig", Path::new("out"), "img");
        let mut hopper = Hopper::new();
        let lines = ["@savefigure x.png", "fig.savefig('x.png')", "@savefig"];
        let rewritten = rewriter.rewrite(0, &region(&lines), &mut hopper);
        assert_eq!(rewritten.lines, lines);
        assert!(hopper.is_empty());
    }
}
