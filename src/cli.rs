use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::staging;
use crate::transpile::{self, TranspileContext, TranspileReport};
use crate::types::ValidationSummary;
use crate::worker::{self, ValidationContext};

#[derive(Parser)]
#[command(name = "rstpy")]
#[command(about = "rstpy - Turn ipython blocks in reStructuredText into scripts and test them", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG still wins)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert ipython code in every document under a directory into scripts
    Transpile {
        /// Directory searched recursively for documents
        from_dir: Option<PathBuf>,

        /// Directory for generated scripts (cleared first)
        to_dir: Option<PathBuf>,
    },

    /// Convert ipython code in the given documents into scripts
    TranspileFiles {
        /// Documents to convert
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory for generated scripts
        #[arg(long)]
        to_dir: Option<PathBuf>,
    },

    /// Run all matching scripts in a directory and report pass/fail
    Validate {
        /// Directory holding the scripts
        dir: Option<PathBuf>,

        /// File name pattern (default: *.py)
        pattern: Option<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Transpile the documentation, then validate the generated scripts
    Check {
        from_dir: Option<PathBuf>,

        to_dir: Option<PathBuf>,

        /// File name pattern (default: *.py)
        pattern: Option<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Copy one document into the staging project and build it
    Stage {
        /// Document to stage
        file: PathBuf,

        /// Staging project directory (must exist)
        #[arg(long)]
        staging_dir: Option<PathBuf>,

        /// Only copy the document, skip the site builder
        #[arg(long)]
        no_build: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Number of scripts run at once
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Kill a script after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Set up tracing on stderr
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<ExitCode> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<ExitCode> {
    // Load and validate configuration before doing any work
    let mut config = Config::builder()
        .config_path(cli.config.clone())
        .build()
        .context("Invalid configuration")?;

    match cli.command {
        Commands::Transpile { from_dir, to_dir } => {
            let from_dir = from_dir.unwrap_or_else(|| config.transpile.source_dir.clone());
            let to_dir = to_dir.unwrap_or_else(|| config.transpile.dest_dir.clone());
            let report = transpile_tree(&config, &from_dir, &to_dir)?;
            Ok(report_exit_code(&report))
        }

        Commands::TranspileFiles { files, to_dir } => {
            let to_dir = to_dir.unwrap_or_else(|| config.transpile.dest_dir.clone());
            let ctx = TranspileContext::from_settings(&config.transpile, to_dir);
            let report = transpile::transpile_files(&ctx, &files);
            print_transpile_report(&report);
            Ok(report_exit_code(&report))
        }

        Commands::Validate { dir, pattern, run } => {
            apply_run_args(&mut config, pattern, &run)?;
            let dir = dir.unwrap_or_else(|| config.transpile.dest_dir.clone());
            let summary = validate(&config, dir).await?;
            print_summary(&config, &summary, run.json)?;
            Ok(summary_exit_code(&summary))
        }

        Commands::Check {
            from_dir,
            to_dir,
            pattern,
            run,
        } => {
            apply_run_args(&mut config, pattern, &run)?;
            let from_dir = from_dir.unwrap_or_else(|| config.transpile.source_dir.clone());
            let to_dir = to_dir.unwrap_or_else(|| config.transpile.dest_dir.clone());
            println!(
                "Executing check: input {}, files {}, {} workers",
                to_dir.display(),
                config.validate.pattern,
                config.validate.workers
            );

            transpile_tree(&config, &from_dir, &to_dir)?;
            let summary = validate(&config, to_dir).await?;
            print_summary(&config, &summary, run.json)?;
            Ok(summary_exit_code(&summary))
        }

        Commands::Stage {
            file,
            staging_dir,
            no_build,
        } => {
            let staging_dir = staging_dir.unwrap_or_else(|| config.staging.staging_dir.clone());
            let index = staging::stage_document(&file, &staging_dir)?;
            println!("✓ Staged {} as {}", file.display(), index.display());

            if no_build {
                return Ok(ExitCode::SUCCESS);
            }

            let output = staging::build_staged(
                &config.staging,
                &staging_dir,
                &config.validate.failure_keyword,
                config.validate.context_chars,
            )
            .await?;
            info!("Site builder returned {:?}", output.exit_code);

            if output.success {
                println!("✓ Site build succeeded");
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("Site build failed with {:?}", output.exit_code);
                Ok(ExitCode::FAILURE)
            }
        }

        Commands::Config => {
            let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
            print!("{}", rendered);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn apply_run_args(config: &mut Config, pattern: Option<String>, run: &RunArgs) -> Result<()> {
    if let Some(pattern) = pattern {
        config.validate.pattern = pattern;
    }
    if let Some(workers) = run.workers {
        config.validate.workers = workers;
    }
    if let Some(timeout) = run.timeout_secs {
        config.validate.timeout_secs = Some(timeout);
    }
    config.validate().context("Invalid command-line options")?;
    Ok(())
}

fn transpile_tree(config: &Config, from_dir: &Path, to_dir: &Path) -> Result<TranspileReport> {
    let ctx = TranspileContext::from_settings(&config.transpile, to_dir);
    let report = transpile::transpile_dir(&ctx, from_dir, &config.transpile.doc_extension)?;
    print_transpile_report(&report);
    Ok(report)
}

async fn validate(config: &Config, dir: PathBuf) -> Result<ValidationSummary> {
    let ctx = ValidationContext::from_settings(&config.validate, dir);
    let summary = worker::validate_dir(&ctx).await?;
    Ok(summary)
}

fn print_transpile_report(report: &TranspileReport) {
    println!(
        "Transpiled {} document(s): {} script(s) written, {} without code, {} failed",
        report.documents(),
        report.written.len(),
        report.empty.len(),
        report.failed.len()
    );
    for (document, reason) in &report.failed {
        eprintln!("  ✗ {}: {}", document.display(), reason);
    }
}

fn print_summary(config: &Config, summary: &ValidationSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print!("{}", worker::render_summary(summary, config.validate.stderr_tail_lines));
    }
    Ok(())
}

fn report_exit_code(report: &TranspileReport) -> ExitCode {
    if report.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Non-zero when any script failed or crashed
fn summary_exit_code(summary: &ValidationSummary) -> ExitCode {
    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_validate_args() {
        let cli = Cli::try_parse_from(["rstpy", "validate", "out", "test_*.py", "-w", "3", "--json"]).unwrap();
        match cli.command {
            Commands::Validate { dir, pattern, run } => {
                assert_eq!(dir, Some(PathBuf::from("out")));
                assert_eq!(pattern.as_deref(), Some("test_*.py"));
                assert_eq!(run.workers, Some(3));
                assert!(run.json);
            }
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn test_transpile_files_requires_files() {
        assert!(Cli::try_parse_from(["rstpy", "transpile-files"]).is_err());
    }

    #[test]
    fn test_zero_workers_override_rejected() {
        let mut config = Config::default();
        let run = RunArgs {
            workers: Some(0),
            timeout_secs: None,
            json: false,
        };
        assert!(apply_run_args(&mut config, None, &run).is_err());
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = Config::default();
        let run = RunArgs {
            workers: Some(2),
            timeout_secs: Some(30),
            json: false,
        };
        apply_run_args(&mut config, Some("*_test.py".to_string()), &run).unwrap();
        assert_eq!(config.validate.workers, 2);
        assert_eq!(config.validate.timeout_secs, Some(30));
        assert_eq!(config.validate.pattern, "*_test.py");
    }

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn same(a: ExitCode, b: ExitCode) -> bool {
        format!("{:?}", a) == format!("{:?}", b)
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_check_end_to_end() {
        let root = tempfile::TempDir::new().unwrap();
        let docs = root.path().join("doc");
        let out = root.path().join("doctest");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(
            docs.join("intro.rst"),
            "Intro\n=====\n\n.. ipython:: python\n\n   x = 1\n   print(x)\n\nDone.\n",
        )
        .unwrap();

        let passing = root.path().join("pass.toml");
        std::fs::write(&passing, "[validate]\ninterpreter = \"true\"\nworkers = 2\n").unwrap();
        let code = run_cli_from_args(args(&[
            "rstpy",
            "--config",
            passing.to_str().unwrap(),
            "check",
            docs.to_str().unwrap(),
            out.to_str().unwrap(),
        ]))
        .await
        .unwrap();
        assert!(same(code, ExitCode::SUCCESS));
        assert!(out.join("intro.py").is_file());

        let failing = root.path().join("fail.toml");
        std::fs::write(&failing, "[validate]\ninterpreter = \"false\"\n").unwrap();
        let code = run_cli_from_args(args(&[
            "rstpy",
            "--config",
            failing.to_str().unwrap(),
            "validate",
            out.to_str().unwrap(),
        ]))
        .await
        .unwrap();
        assert!(same(code, ExitCode::FAILURE));
    }

    #[tokio::test]
    async fn test_missing_config_file_is_error() {
        let result = run_cli_from_args(args(&["rstpy", "--config", "/no/such/rstpy.toml", "config"])).await;
        assert!(result.is_err());
    }
}
