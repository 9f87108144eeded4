//! Validate-name command

use agentaudit::config::AuditConfig;
use agentaudit::Orchestrator;
use anyhow::Result;
use console::style;
use std::path::PathBuf;

pub(super) fn run(root: PathBuf, config: AuditConfig, name: &str, json: bool) -> Result<()> {
    let result = Orchestrator::new(root, config).validate_candidate_name(name);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.valid {
        println!("{} '{}' is a valid agent name", style("✓").green(), result.name);
    } else {
        println!("{} '{}' is not a valid agent name", style("✗").red(), result.name);
        for violation in &result.violations {
            println!("  - {violation}");
        }
        if let Some(suggestion) = &result.suggestion {
            println!("  try: {}", style(suggestion).cyan());
        }
    }
    if result.already_exists && !json {
        println!("{} an agent named '{}' already exists", style("!").yellow(), result.name);
    }

    if !result.valid {
        std::process::exit(1);
    }
    Ok(())
}
