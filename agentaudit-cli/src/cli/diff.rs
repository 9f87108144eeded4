//! Diff command - structural drift since the stored snapshot
//!
//! Read-only: the snapshot is only overwritten by `analyze`.

use agentaudit::config::AuditConfig;
use agentaudit::tracker::{get_changes, ChangeTracker};
use agentaudit::Orchestrator;
use anyhow::Result;
use console::style;
use std::path::PathBuf;

pub(super) fn run(root: PathBuf, config: AuditConfig, json: bool) -> Result<()> {
    let tracker = ChangeTracker::with_file(config.snapshot_path(&root));
    let scan = Orchestrator::new(root, config).scan_structure();

    let current = tracker.get_current_state(&scan);
    let baseline = tracker.load_previous_state();
    let mut changes = get_changes(&current, &baseline.snapshot);
    changes.first_run = baseline.first_run;

    if json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
        return Ok(());
    }

    if changes.first_run {
        println!(
            "{} No snapshot yet. Run `agentaudit analyze` to record a baseline.",
            style("!").yellow()
        );
        return Ok(());
    }
    if !changes.has_changes() {
        println!("{} No structural changes", style("✓").green());
        return Ok(());
    }

    for (label, names, added) in [
        ("agents", &changes.new_agents, true),
        ("agents", &changes.removed_agents, false),
        ("tests", &changes.new_tests, true),
        ("tests", &changes.removed_tests, false),
        ("core modules", &changes.new_core_systems, true),
        ("core modules", &changes.removed_core_systems, false),
    ] {
        for name in names {
            let sign = if added {
                style("+").green()
            } else {
                style("-").red()
            };
            println!("{sign} {label}: {name}");
        }
    }
    Ok(())
}
