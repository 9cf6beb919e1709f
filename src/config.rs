//! Layered configuration for rstpy
//!
//! Settings are resolved in this order, later sources winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file: the explicit `--config` path, else `RSTPY_CONFIG_PATH`,
//!    else an optional `rstpy.toml` in the working directory
//! 3. Environment variables such as `RSTPY_VALIDATE__WORKERS=4`
//! 4. Command-line overrides applied by the CLI layer

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Component, Path, PathBuf};

use crate::error::ConfigError;

const ENV_PREFIX: &str = "RSTPY";
const CONFIG_PATH_ENV: &str = "RSTPY_CONFIG_PATH";
const DEFAULT_CONFIG_NAME: &str = "rstpy";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transpile: TranspileSettings,
    pub validate: ValidateSettings,
    pub staging: StagingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranspileSettings {
    /// Directory searched recursively for documents
    pub source_dir: PathBuf,
    /// Directory receiving generated scripts (cleared before each run)
    pub dest_dir: PathBuf,
    pub doc_extension: String,
    pub script_extension: String,
    /// Subdirectory of `dest_dir` that saved figures are written to
    pub image_dir: String,
    pub capture_marker: String,
    pub cleanup_call: String,
    pub terminator: TerminatorSettings,
}

impl Default for TranspileSettings {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("doc"),
            dest_dir: PathBuf::from("doctest"),
            doc_extension: "rst".to_string(),
            script_extension: "py".to_string(),
            image_dir: "img".to_string(),
            capture_marker: "@savefig".to_string(),
            cleanup_call: "plt.close('all')".to_string(),
            terminator: TerminatorSettings::default(),
        }
    }
}

/// When a code region hands back to prose
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminatorSettings {
    /// Deepest indentation a prose line may have
    pub max_indent: usize,
    /// Letters and digits start prose
    pub alphanumeric: bool,
    /// Other characters that start prose or markup
    pub punctuation: String,
}

impl Default for TerminatorSettings {
    fn default() -> Self {
        Self {
            max_indent: 2,
            alphanumeric: true,
            punctuation: "$.*`:#=-".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateSettings {
    pub pattern: String,
    pub workers: usize,
    pub interpreter: String,
    pub interpreter_args: Vec<String>,
    /// Kill a script after this many seconds (no limit when unset)
    pub timeout_secs: Option<u64>,
    pub failure_keyword: String,
    /// Characters of stdout kept before the failure keyword
    pub context_chars: usize,
    /// Lines of stderr shown when stdout has no failure keyword
    pub stderr_tail_lines: usize,
}

impl Default for ValidateSettings {
    fn default() -> Self {
        Self {
            pattern: "*.py".to_string(),
            workers: 7,
            interpreter: "python".to_string(),
            interpreter_args: Vec::new(),
            timeout_secs: None,
            failure_keyword: "Error".to_string(),
            context_chars: 100,
            stderr_tail_lines: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingSettings {
    pub staging_dir: PathBuf,
    /// `{staging}` is replaced by the staging directory
    pub builder_command: String,
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("_staging"),
            builder_command: "sphinx-build -b html -d {staging}/_build/doctrees {staging} {staging}/_build/html"
                .to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check settings that would otherwise fail halfway through a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validate.workers == 0 {
            return Err(ConfigError::InvalidWorkerCount(self.validate.workers));
        }
        if self.validate.timeout_secs == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.validate.interpreter.trim().is_empty() {
            return Err(ConfigError::EmptySetting("validate.interpreter"));
        }
        if self.validate.pattern.trim().is_empty() {
            return Err(ConfigError::EmptySetting("validate.pattern"));
        }
        if self.transpile.doc_extension.is_empty() {
            return Err(ConfigError::EmptySetting("transpile.doc_extension"));
        }
        if self.transpile.script_extension.is_empty() {
            return Err(ConfigError::EmptySetting("transpile.script_extension"));
        }
        check_image_dir(&self.transpile.image_dir)?;
        if self.transpile.capture_marker.trim().is_empty() {
            return Err(ConfigError::EmptySetting("transpile.capture_marker"));
        }
        if self.transpile.cleanup_call.trim().is_empty() {
            return Err(ConfigError::EmptySetting("transpile.cleanup_call"));
        }
        Ok(())
    }
}

/// The image folder is emptied on every run, so it must be one plain
/// folder name below the destination.
pub fn check_image_dir(image_dir: &str) -> Result<(), ConfigError> {
    if image_dir.is_empty() {
        return Err(ConfigError::EmptySetting("transpile.image_dir"));
    }
    let mut components = Path::new(image_dir).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ConfigError::InvalidImageDir(image_dir.to_string())),
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    skip_env: bool,
}

impl ConfigBuilder {
    /// Use this file instead of the default search; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Ignore `RSTPY_*` variables (used by tests)
    pub fn skip_env(mut self, skip: bool) -> Self {
        self.skip_env = skip;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let mut builder = ::config::Config::builder();

        let explicit = self
            .config_path
            .or_else(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        builder = match explicit {
            Some(path) => builder.add_source(::config::File::from(path.as_path()).required(true)),
            None => builder.add_source(::config::File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        if !self.skip_env {
            builder = builder.add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
