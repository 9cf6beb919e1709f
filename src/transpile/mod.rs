//! Transpiler: ipython blocks in `.rst` documents → runnable scripts
//!
//! Per document the pipeline is
//! extract → rewrite captures (pass 1) → dedent + flush hopper (pass 2) → write.

pub mod assemble;
pub mod driver;
pub mod extract;
pub mod hopper;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::TranspileSettings;
use crate::error::TranspileError;
use crate::types::GeneratedScript;

pub use assemble::AssembleOutcome;
pub use driver::{transpile_dir, transpile_files, TranspileReport};
pub use extract::{extract_regions, TerminatorPolicy};
pub use hopper::{CaptureRewriter, Hopper};

/// Everything one transpile pass needs; nothing is global
#[derive(Debug, Clone)]
pub struct TranspileContext {
    pub to_dir: PathBuf,
    pub script_extension: String,
    pub image_dir: String,
    pub capture_marker: String,
    pub cleanup_call: String,
    pub terminator: TerminatorPolicy,
}

impl TranspileContext {
    /// Context with default settings writing into `to_dir`
    pub fn new(to_dir: impl Into<PathBuf>) -> Self {
        Self::from_settings(&TranspileSettings::default(), to_dir)
    }

    pub fn from_settings(settings: &TranspileSettings, to_dir: impl Into<PathBuf>) -> Self {
        Self {
            to_dir: to_dir.into(),
            script_extension: settings.script_extension.clone(),
            image_dir: settings.image_dir.clone(),
            capture_marker: settings.capture_marker.clone(),
            cleanup_call: settings.cleanup_call.clone(),
            terminator: TerminatorPolicy::from(&settings.terminator),
        }
    }

    /// `<to_dir>/<stem>.<script_extension>`
    pub fn script_path(&self, document: &Path) -> Result<PathBuf, TranspileError> {
        let name = document
            .file_name()
            .ok_or_else(|| TranspileError::NoFileName(document.to_path_buf()))?;
        Ok(self.to_dir.join(name).with_extension(&self.script_extension))
    }

    pub fn image_path(&self) -> PathBuf {
        self.to_dir.join(&self.image_dir)
    }
}

/// Convert document text to script text; `None` when there is no code.
pub fn transpile_text(ctx: &TranspileContext, text: &str) -> Option<String> {
    let regions = extract_regions(text, &ctx.terminator);
    if regions.is_empty() {
        return None;
    }

    let rewriter = CaptureRewriter::new(&ctx.capture_marker, &ctx.to_dir, &ctx.image_dir);
    let mut hopper = Hopper::new();
    let rewritten: Vec<_> = regions
        .iter()
        .enumerate()
        .map(|(index, region)| rewriter.rewrite(index, region, &mut hopper))
        .collect();

    assemble::assemble(&rewritten, &hopper, &ctx.cleanup_call)
}

/// Convert one document and write its script.
pub fn transpile_file(ctx: &TranspileContext, document: &Path) -> Result<AssembleOutcome, TranspileError> {
    info!("Converting {} into {}", document.display(), ctx.to_dir.display());

    let text = fs::read_to_string(document).map_err(|e| TranspileError::read(document, e))?;

    let Some(script) = transpile_text(ctx, &text) else {
        info!("No Python code found in {}", document.display());
        return Ok(AssembleOutcome::NoCode);
    };

    let path = ctx.script_path(document)?;
    debug!("Generated script for {}:\n{}", document.display(), script);
    assemble::write_script(&path, &script)?;
    info!("Wrote {}", path.display());

    Ok(AssembleOutcome::Written(GeneratedScript { path, text: script }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIST_DOC: &str = r#"
Histograms
==========

Set up.

.. ipython:: python
   :suppress:

   import numpy as np
   import matplotlib.pyplot as plt

Draw one.

.. ipython:: python

   x = np.random.randn(100)
   @savefig hist.png width=4in
   plt.hist(x);

Some discussion of the plot.

.. ipython:: python
   :suppress:

   plt.close('all')
"#;

    #[test]
    fn test_hist_scenario() {
        let ctx = TranspileContext::new("out");
        let script = transpile_text(&ctx, HIST_DOC).unwrap();
        let lines: Vec<&str> = script.lines().collect();

        let bind = lines.iter().position(|l| *l == "fig_generated_0 = plt.gcf()").unwrap();
        assert_eq!(lines[bind - 1], "x = np.random.randn(100)");
        assert_eq!(lines[bind + 1], "plt.hist(x);");

        let close = lines.iter().position(|l| *l == "plt.close('all')").unwrap();
        assert_eq!(lines[close - 1], "fig_generated_0.savefig(\"out/img/hist.png\")");
        assert_eq!(script.matches(".savefig(").count(), 1);
    }

    #[test]
    fn test_whole_script_layout() {
        let ctx = TranspileContext::new("out");
        let script = transpile_text(&ctx, HIST_DOC).unwrap();
        assert_eq!(
            script,
            "import numpy as np\nimport matplotlib.pyplot as plt\n\n\
             x = np.random.randn(100)\nfig_generated_0 = plt.gcf()\nplt.hist(x);\n\n\
             fig_generated_0.savefig(\"out/img/hist.png\")\nplt.close('all')\n"
        );
    }

    #[test]
    fn test_no_directive_document() {
        let ctx = TranspileContext::new("out");
        assert!(transpile_text(&ctx, "Title\n=====\n\nNothing to run.\n").is_none());
    }

    #[test]
    fn test_transpile_file_writes_script() {
        let src = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let doc = src.path().join("intro.rst");
        fs::write(&doc, HIST_DOC).unwrap();

        let ctx = TranspileContext::new(out.path());
        let outcome = transpile_file(&ctx, &doc).unwrap();

        let AssembleOutcome::Written(script) = outcome else {
            panic!("expected a script");
        };
        assert_eq!(script.path, out.path().join("intro.py"));
        assert_eq!(fs::read_to_string(&script.path).unwrap(), script.text);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_prose_only_document_logs_no_code() {
        let src = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let doc = src.path().join("prose.rst");
        fs::write(&doc, "Title\n=====\n\nNothing to run.\n").unwrap();

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        let ctx = TranspileContext::new(out.path());
        let outcome = tracing::subscriber::with_default(subscriber, || transpile_file(&ctx, &doc)).unwrap();
        assert_eq!(outcome, AssembleOutcome::NoCode);

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = text
            .lines()
            .find(|l| l.contains("No Python code found"))
            .expect("no-code message logged");
        assert!(line.contains("INFO"));
        assert!(line.contains("prose.rst"));
    }

    #[test]
    fn test_transpile_file_without_code_writes_nothing() {
        let src = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let doc = src.path().join("prose.rst");
        fs::write(&doc, "Only prose.\n").unwrap();

        let ctx = TranspileContext::new(out.path());
        assert_eq!(transpile_file(&ctx, &doc).unwrap(), AssembleOutcome::NoCode);
        assert!(!out.path().join("prose.py").exists());
    }

    #[test]
    fn test_unreadable_document_is_error() {
        let src = tempfile::TempDir::new().unwrap();
        let doc = src.path().join("latin1.rst");
        fs::write(&doc, [0x2e, 0x2e, 0x20, 0xff, 0xfe]).unwrap();

        let ctx = TranspileContext::new(src.path().join("out"));
        assert!(matches!(transpile_file(&ctx, &doc), Err(TranspileError::Read { .. })));
    }
}
