//! Pull ipython code regions out of reStructuredText.
//!
//! A region starts after a directive and its optional flags:
//! ```rst
//! .. ipython:: python
//!    :suppress:
//!
//!    import matplotlib.pyplot as plt
//! ```
//! and runs until the text visibly returns to prose, the next directive,
//! or the end of the document.

use crate::config::TerminatorSettings;
use crate::types::CodeRegion;

pub const DIRECTIVE: &str = ".. ipython::";
pub const LANGUAGE: &str = "python";

/// Directive flags; each may appear once, in any order
pub const MODIFIERS: [&str; 3] = [":okwarning:", ":suppress:", ":okexcept:"];

/// Decides which lines hand control back to prose.
///
/// A line ends a region when a blank line precedes it (other than the blank
/// line directly after the directive), it is indented by at most
/// `max_indent` spaces, and its first character is one that opens prose or
/// markup: headings, directives, math, lists, emphasis, rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminatorPolicy {
    pub max_indent: usize,
    pub alphanumeric: bool,
    pub punctuation: String,
}

impl Default for TerminatorPolicy {
    fn default() -> Self {
        Self::from(&TerminatorSettings::default())
    }
}

impl From<&TerminatorSettings> for TerminatorPolicy {
    fn from(settings: &TerminatorSettings) -> Self {
        Self {
            max_indent: settings.max_indent,
            alphanumeric: settings.alphanumeric,
            punctuation: settings.punctuation.clone(),
        }
    }
}

impl TerminatorPolicy {
    /// Whether `line` reads as prose (ignores the blank-line requirement)
    pub fn is_prose(&self, line: &str) -> bool {
        let body = line.trim_start_matches(' ');
        let indent = line.len() - body.len();
        if indent > self.max_indent {
            return false;
        }

        match body.chars().next() {
            Some(c) => (self.alphanumeric && c.is_ascii_alphanumeric()) || self.punctuation.contains(c),
            None => false,
        }
    }

    fn ends_region(&self, lines: &[&str], start: usize, i: usize) -> bool {
        i >= start + 2 && is_blank(lines[i - 1]) && self.is_prose(lines[i])
    }
}

/// Check if a line opens an ipython python block.
pub fn is_directive(line: &str) -> bool {
    let Some(rest) = line.trim().strip_prefix(DIRECTIVE) else {
        return false;
    };
    rest.starts_with(' ') && rest.trim() == LANGUAGE
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Extract code regions in document order.
pub fn extract_regions(text: &str, policy: &TerminatorPolicy) -> Vec<CodeRegion> {
    let lines: Vec<&str> = text.lines().collect();
    let mut regions = Vec::new();
    let mut directives = 0;
    let mut i = 0;

    while i < lines.len() {
        if !is_directive(lines[i]) {
            i += 1;
            continue;
        }
        let position = directives;
        directives += 1;
        i += 1;

        // Flags directly under the directive
        let mut seen: Vec<&str> = Vec::new();
        while i < lines.len() && seen.len() < MODIFIERS.len() {
            let trimmed = lines[i].trim();
            match MODIFIERS.iter().find(|m| **m == trimmed) {
                Some(m) if !seen.contains(m) => {
                    seen.push(*m);
                    i += 1;
                }
                _ => break,
            }
        }

        let start = i;
        while i < lines.len() && !is_directive(lines[i]) && !policy.ends_region(&lines, start, i) {
            i += 1;
        }

        let mut body: Vec<String> = lines[start..i].iter().map(|l| l.to_string()).collect();
        while body.last().is_some_and(|l| is_blank(l)) {
            body.pop();
        }

        let region = CodeRegion::new(position, body);
        if !region.is_blank() {
            regions.push(region);
        }
    }

    regions
}
