//! CLI command definitions and handlers

mod analyze;
mod diff;
mod init;
mod scan;
mod validate;

use agentaudit::config::{load_project_config, AuditConfig};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Parse a score threshold in [0, 100]
fn parse_score(s: &str) -> Result<f64, String> {
    let v: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid score", s))?;
    if (0.0..=100.0).contains(&v) {
        Ok(v)
    } else {
        Err("score must be between 0 and 100".to_string())
    }
}

/// agentaudit - health scoring for agent-based codebases
#[derive(Parser, Debug)]
#[command(name = "agentaudit")]
#[command(
    version,
    about = "Self-analysis for agent-based codebases: eight audit dimensions, one composite health score",
    after_help = "\
Examples:
  agentaudit .                              Analyze current directory
  agentaudit . analyze --format json        JSON output for scripting
  agentaudit . analyze --fail-under 70      Exit code 1 below a score (CI mode)
  agentaudit . scan                         Show discovered agents, tests and core modules
  agentaudit . diff                         Structural drift since the last analysis
  agentaudit . validate-name data_loader    Check a new agent name"
)]
pub struct Cli {
    /// Path to project (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of parallel workers (1-64, default: config or CPU count)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Filter for the process-wide subscriber, from `--log-level`
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.log_level).unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every audit and print the health report (default)
    Analyze {
        /// Output format: text, json, markdown (or md)
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json", "markdown", "md"])]
        format: String,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Do not overwrite the stored snapshot
        #[arg(long)]
        no_save: bool,

        /// Exit with code 1 if the composite score is below this value
        #[arg(long, value_parser = parse_score)]
        fail_under: Option<f64>,
    },

    /// Show the discovered project structure without auditing
    Scan {
        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Compare the current structure with the stored snapshot
    Diff {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a proposed agent name against the naming convention
    ValidateName {
        /// Candidate agent name
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write an example agentaudit.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Resolve the project root and load its config with CLI overrides
fn load_config(path: &Path, cli: &Cli) -> Result<(PathBuf, AuditConfig)> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Path is not a directory: {}", root.display());
    }

    let mut config = load_project_config(&root);
    if cli.workers.is_some() {
        config.workers = cli.workers;
    }
    config.logging.install = true;
    config.logging.level = cli.log_level.clone();
    Ok((root, config))
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Init { force }) => init::run(&cli.path, *force),

        Some(Commands::Analyze {
            format,
            output,
            no_save,
            fail_under,
        }) => {
            let (root, config) = load_config(&cli.path, &cli)?;
            analyze::run(root, config, format, output.as_deref(), *no_save, *fail_under)
        }

        Some(Commands::Scan { format }) => {
            let (root, config) = load_config(&cli.path, &cli)?;
            scan::run(root, config, format)
        }

        Some(Commands::Diff { json }) => {
            let (root, config) = load_config(&cli.path, &cli)?;
            diff::run(root, config, *json)
        }

        Some(Commands::ValidateName { name, json }) => {
            let (root, config) = load_config(&cli.path, &cli)?;
            validate::run(root, config, name, *json)
        }

        None => {
            let (root, config) = load_config(&cli.path, &cli)?;
            analyze::run(root, config, "text", None, false, None)
        }
    }
}
