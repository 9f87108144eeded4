//! Run orchestration
//!
//! Drives one run through `Scanning → Analyzing → Auditing → Diffing →
//! Reporting`. A failing stage is logged and recorded in the report's
//! `stage_errors`; later stages continue with whatever partial data is
//! available, so [`Orchestrator::run`] always returns a report.

use crate::analyzer::ModuleAnalyzer;
use crate::auditors::{AuditContext, AuditEngine};
use crate::config::AuditConfig;
use crate::models::{
    AuditResult, ChangeSet, Dimension, HealthReport, HealthStatus, Issue, ModuleFacts, ScanResult,
    Severity,
};
use crate::scanner::StructureScanner;
use crate::scoring::{HealthScorer, ReportInput};
use crate::tracker::{get_changes, ChangeTracker, SnapshotStore};
use anyhow::Result;
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scanning,
    Analyzing,
    Auditing,
    Diffing,
    Reporting,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Scanning => write!(f, "scanning"),
            Stage::Analyzing => write!(f, "analyzing"),
            Stage::Auditing => write!(f, "auditing"),
            Stage::Diffing => write!(f, "diffing"),
            Stage::Reporting => write!(f, "reporting"),
        }
    }
}

/// Outcome of checking a proposed agent name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameValidation {
    pub name: String,
    pub valid: bool,
    pub violations: Vec<String>,
    /// A conforming alternative when the name is invalid
    pub suggestion: Option<String>,
    /// An agent directory or file with this name is already on disk
    pub already_exists: bool,
}

fn snake_case_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9]*(_[a-z0-9]+)*$").expect("valid regex"))
}

pub struct Orchestrator {
    root: PathBuf,
    config: AuditConfig,
    tracker: ChangeTracker,
    engine: AuditEngine,
    save_snapshot: bool,
}

impl Orchestrator {
    /// Orchestrator persisting snapshots to the configured JSON file
    pub fn new(root: impl Into<PathBuf>, config: AuditConfig) -> Self {
        let root = root.into();
        let tracker = ChangeTracker::with_file(config.snapshot_path(&root));
        let engine = AuditEngine::with_default_auditors(config.effective_workers());
        Self {
            root,
            config,
            tracker,
            engine,
            save_snapshot: true,
        }
    }

    /// Swap the snapshot store
    pub fn with_store(mut self, store: Box<dyn SnapshotStore>) -> Self {
        self.tracker = ChangeTracker::new(store);
        self
    }

    /// Swap the auditor set
    pub fn with_engine(mut self, engine: AuditEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Whether a run overwrites the stored snapshot
    pub fn save_snapshot(mut self, save: bool) -> Self {
        self.save_snapshot = save;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Run the full pipeline. Never fails; problems end up in the report.
    pub fn run(&self) -> HealthReport {
        self.run_with_scanner(|| Ok(self.scan_structure()))
    }

    fn run_with_scanner(&self, scanner: impl FnOnce() -> Result<ScanResult>) -> HealthReport {
        let _logging = self.install_logging();
        let start = Instant::now();
        info!("Auditing {}", self.root.display());

        let mut errors = Vec::new();

        let scanned = self.stage(Stage::Scanning, &mut errors, scanner);
        // A failed scan must not replace the stored snapshot with an empty one
        let persist = self.save_snapshot && scanned.is_some();
        let scan = scanned.unwrap_or_else(|| ScanResult::empty(&self.root));

        let facts = self
            .stage(Stage::Analyzing, &mut errors, || {
                let analyzer = ModuleAnalyzer::new(self.config.layout.language);
                Ok(analyzer.analyze_scan(&scan, self.config.effective_workers()))
            })
            .unwrap_or_else(|| unanalyzed(&scan));

        let results = self
            .stage(Stage::Auditing, &mut errors, || {
                let ctx = AuditContext::new(&scan, &facts, &self.config);
                Ok(self.engine.run(&ctx))
            })
            .unwrap_or_else(|| {
                Dimension::ALL
                    .iter()
                    .map(|d| (*d, AuditResult::unavailable(*d, "auditing stage failed")))
                    .collect()
            });

        let changes = self
            .stage(Stage::Diffing, &mut errors, || Ok(self.diff(&scan, persist)))
            .unwrap_or_else(|| ChangeSet {
                first_run: true,
                ..Default::default()
            });

        let stage_errors = errors.clone();
        let report = self
            .stage(Stage::Reporting, &mut errors, || {
                Ok(HealthScorer::new(&self.config).build_report(ReportInput {
                    root: self.root.clone(),
                    scan: &scan,
                    facts: &facts,
                    results: &results,
                    changes: changes.clone(),
                    stage_errors,
                }))
            })
            .unwrap_or_else(|| fallback_report(&self.root, changes.clone(), errors.clone()));

        info!(
            "Run complete in {}ms: {:.2} ({}), {} stage errors",
            start.elapsed().as_millis(),
            report.composite_score,
            report.status,
            report.stage_errors.len()
        );
        report
    }

    /// A fresh structure scan, no analysis or audits
    pub fn scan_structure(&self) -> ScanResult {
        StructureScanner::new(&self.root, self.config.layout.clone()).scan()
    }

    /// Check a proposed agent name against the naming convention
    ///
    /// Read-only: nothing is created on disk.
    pub fn validate_candidate_name(&self, name: &str) -> NameValidation {
        let language = self.config.layout.language;
        let mut violations = Vec::new();

        if name.is_empty() {
            violations.push("name is empty".to_string());
        } else if !snake_case_pattern().is_match(name) {
            violations.push("name must be snake_case (lowercase letters, digits, single underscores)".to_string());
        }
        if language.reserved_words().iter().any(|w| *w == name) {
            violations.push(format!("'{name}' is a reserved word in {language}"));
        }
        if name.starts_with("test_") {
            violations.push("name must not start with 'test_'".to_string());
        }

        let agents_dir = self.root.join(&self.config.layout.agents_dir);
        let already_exists = !name.is_empty()
            && (agents_dir.join(name).exists()
                || agents_dir.join(format!("{name}.{}", language.extension())).exists());

        let valid = violations.is_empty();
        let suggestion = if valid {
            None
        } else {
            suggest_name(name, language.reserved_words())
        };

        debug!("Validated candidate name '{}': valid={}", name, valid);
        NameValidation {
            name: name.to_string(),
            valid,
            violations,
            suggestion,
            already_exists,
        }
    }

    fn diff(&self, scan: &ScanResult, persist: bool) -> ChangeSet {
        let current = self.tracker.get_current_state(scan);
        let baseline = self.tracker.load_previous_state();
        let mut changes = get_changes(&current, &baseline.snapshot);
        changes.first_run = baseline.first_run;

        if changes.has_changes() && !changes.first_run {
            info!(
                "Structure changed: +{} / -{} agents",
                changes.new_agents.len(),
                changes.removed_agents.len()
            );
        }
        if persist {
            self.tracker.save_state(&current);
        } else {
            debug!("Snapshot left untouched");
        }
        changes
    }

    /// Run one stage, containing both errors and panics
    fn stage<T>(&self, stage: Stage, errors: &mut Vec<String>, f: impl FnOnce() -> Result<T>) -> Option<T> {
        let start = Instant::now();
        debug!("Stage {} started", stage);

        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
            Ok(Ok(value)) => {
                debug!("Stage {} finished in {}ms", stage, start.elapsed().as_millis());
                Some(value)
            }
            Ok(Err(e)) => {
                warn!("Stage {} failed: {:#}", stage, e);
                errors.push(format!("{stage}: {e:#}"));
                None
            }
            Err(panic_info) => {
                let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                error!("Stage {} panicked: {}", stage, msg);
                errors.push(format!("{stage}: panic: {msg}"));
                None
            }
        }
    }

    /// Thread-scoped subscriber for the duration of a run
    fn install_logging(&self) -> Option<tracing::subscriber::DefaultGuard> {
        let logging = &self.config.logging;
        if !logging.install {
            return None;
        }
        let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        Some(tracing::subscriber::set_default(subscriber))
    }
}

/// Every existing entity marked as not analyzed
fn unanalyzed(scan: &ScanResult) -> BTreeMap<String, ModuleFacts> {
    scan.existing_agents()
        .map(|e| (e.name.clone(), ModuleFacts::parse_failed("analysis stage failed")))
        .collect()
}

/// Bare report used only when the reporting stage itself fails
fn fallback_report(root: &Path, changes: ChangeSet, stage_errors: Vec<String>) -> HealthReport {
    let issues = stage_errors
        .iter()
        .map(|e| Issue::new(Severity::Critical, format!("stage failed: {e}")))
        .collect();
    HealthReport {
        run_id: uuid::Uuid::new_v4(),
        generated_at: Utc::now(),
        project_root: root.to_path_buf(),
        composite_score: 0.0,
        status: HealthStatus::Critical,
        summary: Default::default(),
        dimensions: BTreeMap::new(),
        entities: Vec::new(),
        issues,
        changes,
        recommendations: Vec::new(),
        roadmap: Default::default(),
        stage_errors,
    }
}

/// `DataLoader` -> `data_loader`, `test_x` -> `x`, `class` -> `class_agent`
fn suggest_name(name: &str, reserved: &[&str]) -> Option<String> {
    let mut out = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_lower = true;
        } else {
            out.push('_');
            prev_lower = false;
        }
    }

    let mut suggestion = out
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    while let Some(rest) = suggestion.strip_prefix("test_") {
        suggestion = rest.to_string();
    }
    if suggestion == "test" {
        suggestion = "tester".to_string();
    }
    if suggestion.starts_with(|c: char| c.is_ascii_digit()) {
        suggestion = format!("agent_{suggestion}");
    }
    if reserved.iter().any(|w| *w == suggestion) {
        suggestion.push_str("_agent");
    }

    (snake_case_pattern().is_match(&suggestion) && suggestion != name).then_some(suggestion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::MemoryStore;

    fn orchestrator(root: &Path) -> Orchestrator {
        Orchestrator::new(root, AuditConfig::default()).with_store(Box::new(MemoryStore::new()))
    }

    #[test]
    fn test_valid_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = orchestrator(dir.path()).validate_candidate_name("data_loader");
        assert!(result.valid);
        assert!(result.violations.is_empty());
        assert!(result.suggestion.is_none());
        assert!(!result.already_exists);
    }

    #[test]
    fn test_invalid_names_get_suggestions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let o = orchestrator(dir.path());

        let camel = o.validate_candidate_name("DataLoader");
        assert!(!camel.valid);
        assert_eq!(camel.suggestion.as_deref(), Some("data_loader"));

        let prefixed = o.validate_candidate_name("test_router");
        assert!(!prefixed.valid);
        assert_eq!(prefixed.suggestion.as_deref(), Some("router"));

        let reserved = o.validate_candidate_name("class");
        assert!(!reserved.valid);
        assert!(reserved.violations[0].contains("reserved word"));
        assert_eq!(reserved.suggestion.as_deref(), Some("class_agent"));

        let dashed = o.validate_candidate_name("web-scraper");
        assert_eq!(dashed.suggestion.as_deref(), Some("web_scraper"));

        assert!(!o.validate_candidate_name("").valid);
        assert!(!o.validate_candidate_name("double__underscore").valid);
    }

    #[test]
    fn test_existing_name_is_reported_without_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("agents/planner")).expect("mkdir");

        let result = orchestrator(dir.path()).validate_candidate_name("planner");
        assert!(result.valid);
        assert!(result.already_exists);
        assert!(!dir.path().join("agents/planner/planner.py").exists());
    }

    #[test]
    fn test_run_on_empty_project_still_reports() {
        let dir = tempfile::tempdir().expect("tempdir");
        let report = orchestrator(dir.path()).run();

        assert_eq!(report.summary.total_agents, 0);
        assert!(report.stage_errors.is_empty());
        assert_eq!(report.dimensions.len(), Dimension::ALL.len());
        assert!(report.changes.first_run);
        assert_eq!(report.status, HealthStatus::Critical);
    }

    #[test]
    fn test_failed_scan_keeps_stored_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let previous = crate::models::Snapshot {
            agent_names: ["a".to_string(), "b".to_string()].into(),
            ..Default::default()
        };
        let o = Orchestrator::new(dir.path(), AuditConfig::default())
            .with_store(Box::new(MemoryStore::with_snapshot(previous)));

        let report = o.run_with_scanner(|| anyhow::bail!("agents dir unreadable"));

        assert_eq!(report.stage_errors, vec!["scanning: agents dir unreadable"]);
        let stored = o.tracker.load_previous_state();
        assert!(!stored.first_run);
        assert_eq!(stored.snapshot.agent_names.len(), 2);
    }

    #[test]
    fn test_stage_failures_are_recorded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let o = orchestrator(dir.path());
        let mut errors = Vec::new();

        let failed: Option<()> = o.stage(Stage::Analyzing, &mut errors, || anyhow::bail!("disk gone"));
        assert!(failed.is_none());
        let panicked: Option<()> = o.stage(Stage::Auditing, &mut errors, || panic!("boom"));
        assert!(panicked.is_none());

        assert_eq!(errors, vec!["analyzing: disk gone", "auditing: panic: boom"]);
    }
}
