//! Scan command - structure only, no audits

use agentaudit::config::AuditConfig;
use agentaudit::reporters;
use agentaudit::Orchestrator;
use anyhow::Result;
use std::path::PathBuf;

pub(super) fn run(root: PathBuf, config: AuditConfig, format: &str) -> Result<()> {
    let scan = Orchestrator::new(root, config).scan_structure();
    let out = if format == "json" {
        serde_json::to_string_pretty(&scan)?
    } else {
        reporters::render_scan(&scan)?
    };
    println!("{out}");
    Ok(())
}
