//! End-to-end runs over temporary project trees

use agentaudit::config::AuditConfig;
use agentaudit::models::{Dimension, HealthStatus, Snapshot};
use agentaudit::tracker::{JsonFileStore, SnapshotStore};
use agentaudit::Orchestrator;
use std::path::Path;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().expect("parent dir")).expect("mkdir");
    std::fs::write(path, content).expect("write file");
}

fn agent_source(name: &str) -> String {
    let type_name = format!("{}Agent", name[..1].to_uppercase() + &name[1..]);
    format!(
        r#""""The {name} agent."""
import logging
from typing import Any

logger = logging.getLogger(__name__)


class {type_name}:
    """Handles {name} tasks."""

    def execute(self, task: dict) -> dict:
        """Run one task."""
        try:
            return {{"ok": True, "task": task}}
        except Exception as e:
            logger.error("{name} failed: %s", e)
            return {{"ok": False}}
"#
    )
}

fn add_agent(root: &Path, name: &str, tested: bool) {
    write(root, &format!("agents/{name}/{name}.py"), &agent_source(name));
    if tested {
        write(
            root,
            &format!("tests/test_{name}.py"),
            &format!("def test_{name}():\n    assert True\n"),
        );
    }
}

#[test]
fn test_coverage_names_untested_agent() {
    let dir = tempfile::tempdir().expect("tempdir");
    add_agent(dir.path(), "a", true);
    add_agent(dir.path(), "b", true);
    add_agent(dir.path(), "c", false);

    let report = Orchestrator::new(dir.path(), AuditConfig::default()).run();

    assert!(report.stage_errors.is_empty(), "{:?}", report.stage_errors);
    assert_eq!(report.summary.total_agents, 3);
    assert_eq!(report.summary.test_coverage, 66.67);
    assert_eq!(report.summary.untested_agents, vec!["c".to_string()]);
    assert_eq!(report.summary.tested_agents.len(), 2);
    assert!(
        report
            .recommendations
            .iter()
            .any(|line| line.contains("Test coverage") && line.contains(": c")),
        "{:?}",
        report.recommendations
    );
    assert!(report
        .roadmap
        .high
        .iter()
        .chain(&report.roadmap.critical)
        .chain(&report.roadmap.medium)
        .any(|item| item.dimension == Dimension::TestCoverage && item.target == "c"));
}

#[test]
fn test_new_agent_detected_against_stored_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    for name in ["a", "b", "c"] {
        add_agent(dir.path(), name, true);
    }

    let config = AuditConfig::default();
    let store = JsonFileStore::new(config.snapshot_path(dir.path()));
    store
        .save(&Snapshot {
            agent_names: ["a".to_string(), "b".to_string()].into(),
            ..Default::default()
        })
        .expect("seed snapshot");

    let report = Orchestrator::new(dir.path(), config).run();

    assert!(!report.changes.first_run);
    assert_eq!(report.changes.new_agents, vec!["c".to_string()]);
    assert!(report.changes.removed_agents.is_empty());
    assert_eq!(report.changes.unchanged_agents, vec!["a".to_string(), "b".to_string()]);

    // The run overwrote the snapshot with the current structure
    let stored = store.load().expect("load").expect("snapshot");
    assert_eq!(stored.agent_names.len(), 3);
    assert!(stored.test_names.contains("test_c"));
}

#[test]
fn test_second_run_reports_no_changes() {
    let dir = tempfile::tempdir().expect("tempdir");
    add_agent(dir.path(), "planner", true);

    let first = Orchestrator::new(dir.path(), AuditConfig::default()).run();
    assert!(first.changes.first_run);

    let second = Orchestrator::new(dir.path(), AuditConfig::default()).run();
    assert!(!second.changes.first_run);
    assert!(!second.changes.has_changes());
    assert_ne!(first.run_id, second.run_id);
}

#[test]
fn test_no_save_leaves_snapshot_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    add_agent(dir.path(), "a", true);

    let config = AuditConfig::default();
    let snapshot_path = config.snapshot_path(dir.path());
    Orchestrator::new(dir.path(), config).save_snapshot(false).run();

    assert!(!snapshot_path.exists());
}

#[test]
fn test_corrupt_module_is_isolated() {
    let dir = tempfile::tempdir().expect("tempdir");
    add_agent(dir.path(), "a", true);
    add_agent(dir.path(), "b", true);
    write(dir.path(), "agents/broken/broken.py", "def broken(:\n    pass\n");

    let report = Orchestrator::new(dir.path(), AuditConfig::default()).run();

    assert!(report.stage_errors.is_empty());
    assert_eq!(report.summary.total_agents, 3);
    assert_eq!(report.summary.analyzed_agents, 2);
    assert_eq!(report.summary.parse_failures, 1);

    let broken = report
        .entities
        .iter()
        .find(|e| e.name == "broken")
        .expect("broken entity");
    assert!(!broken.parsed);
    assert_eq!(broken.type_hint_coverage, 0.0);
    assert!(report
        .issues
        .iter()
        .any(|i| i.entity.as_deref() == Some("broken") && i.message.starts_with("parse failed")));

    let healthy = report.entities.iter().filter(|e| e.parsed).count();
    assert_eq!(healthy, 2);
}

#[test]
fn test_empty_project_is_critical_but_complete() {
    let dir = tempfile::tempdir().expect("tempdir");
    let report = Orchestrator::new(dir.path(), AuditConfig::default()).run();

    assert_eq!(report.status, HealthStatus::Critical);
    assert_eq!(report.dimensions.len(), Dimension::ALL.len());
    assert_eq!(report.summary.total_agents, 0);
    assert!(!report.recommendations.is_empty());
}

#[test]
fn test_scan_structure_runs_no_audits() {
    let dir = tempfile::tempdir().expect("tempdir");
    add_agent(dir.path(), "a", false);
    write(dir.path(), "core/config.py", "SETTINGS = {}\n");
    write(dir.path(), "README.md", "# project\n");

    let orchestrator = Orchestrator::new(dir.path(), AuditConfig::default());
    let scan = orchestrator.scan_structure();

    assert_eq!(scan.agents.len(), 1);
    assert!(scan.agents["a"].exists);
    assert!(!scan.agents["a"].has_companion_test);
    assert!(scan.core_modules.contains_key("config"));
    assert_eq!(scan.documentation.len(), 1);
    assert!(!AuditConfig::default().snapshot_path(dir.path()).exists());
}
