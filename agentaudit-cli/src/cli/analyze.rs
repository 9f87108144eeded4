//! Analyze command - run every audit and render the health report

use agentaudit::config::AuditConfig;
use agentaudit::reporters;
use agentaudit::Orchestrator;
use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Create spinner progress style
fn create_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub(super) fn run(
    root: PathBuf,
    config: AuditConfig,
    format: &str,
    output: Option<&Path>,
    no_save: bool,
    fail_under: Option<f64>,
) -> Result<()> {
    let interactive = format == "text" && output.is_none();

    let spinner = ProgressBar::new_spinner();
    if interactive {
        spinner.set_style(create_spinner_style());
        spinner.set_message(format!("Auditing {}...", root.display()));
        spinner.enable_steady_tick(Duration::from_millis(100));
    } else {
        spinner.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let orchestrator = Orchestrator::new(root, config).save_snapshot(!no_save);
    let report = orchestrator.run();

    spinner.finish_and_clear();

    let rendered = reporters::report(&report, format)?;
    match output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            eprintln!(
                "{} Report written to {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
        None => println!("{rendered}"),
    }

    if let Some(threshold) = fail_under {
        if report.composite_score < threshold {
            eprintln!(
                "Failing: composite score {:.2} is below --fail-under={}",
                report.composite_score, threshold
            );
            std::process::exit(1);
        }
    }
    Ok(())
}
