//! Core data models for agentaudit
//!
//! These models flow through every stage of a run: the scanner produces
//! descriptors, the parsers produce module facts, the auditors produce
//! audit results and the scoring layer folds them into a health report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Round a percentage to two decimals for presentation.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / total * 100`, defined as 0 when there is nothing to count.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Severity levels for issues and remediation priorities
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// How an entity is laid out on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A package directory under the agents dir
    Directory,
    /// A single top-level source file under the agents dir
    File,
}

/// One discovered agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    pub kind: EntityKind,
    pub path: PathBuf,
    /// Resolved main file; `None` when resolution found nothing
    pub main_file_path: Option<PathBuf>,
    pub exists: bool,
    pub has_companion_test: bool,
    pub has_package_init: bool,
    pub has_sub_components: bool,
    pub sub_component_count: usize,
    pub has_sub_component_index: bool,
    /// File names (not paths) of the sub-components, sorted
    pub sub_component_files: Vec<String>,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub has_documentation: bool,
}

/// A discovered test file or core module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// File stem, e.g. `test_planner`
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

pub type TestDescriptor = FileDescriptor;

/// Output of one structure scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub root: PathBuf,
    pub agents: BTreeMap<String, EntityDescriptor>,
    pub tests: BTreeMap<String, TestDescriptor>,
    pub core_modules: BTreeMap<String, FileDescriptor>,
    pub documentation: Vec<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

impl ScanResult {
    /// An empty scan rooted at `root`, used when the scan stage itself fails
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            agents: BTreeMap::new(),
            tests: BTreeMap::new(),
            core_modules: BTreeMap::new(),
            documentation: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Entities whose main file was resolved
    pub fn existing_agents(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.agents.values().filter(|e| e.exists)
    }
}

// ============================================================================
// Structural facts
// ============================================================================

/// A declared type (class, struct, enum, trait)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    pub line: u32,
    pub bases: Vec<String>,
    pub decorators: Vec<String>,
    pub has_docstring: bool,
    pub methods: Vec<String>,
}

/// A function or method
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Callable {
    pub name: String,
    /// Enclosing type for methods
    pub owner: Option<String>,
    pub line: u32,
    pub is_async: bool,
    pub decorators: Vec<String>,
    pub return_type: Option<String>,
    /// Parameters excluding the receiver (`self`, `cls`, `&self`)
    pub param_count: usize,
    pub annotated_params: usize,
    pub has_docstring: bool,
    pub branch_count: u32,
    pub has_try: bool,
    /// Textual call targets, e.g. `self.logger.info`, `retry`
    pub calls: Vec<String>,
    /// Calls made on an error path (except clauses, `Err` arms, error combinators)
    pub handler_calls: Vec<String>,
    /// An error path returns a fallback value
    pub handler_returns: bool,
}

impl Callable {
    pub fn has_type_hints(&self) -> bool {
        self.return_type.is_some() || self.annotated_params > 0
    }
}

/// Structural facts for one module, derived purely from its text
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleFacts {
    pub types: Vec<TypeDecl>,
    pub callables: Vec<Callable>,
    pub imports: Vec<String>,
    pub has_module_docstring: bool,
    /// Branch points across the whole module
    pub branch_count: u32,
    pub type_hint_coverage: f64,
    pub docstring_coverage: f64,
    pub complexity_estimate: f64,
    pub detected_issues: Vec<String>,
    /// Set when the module degraded to the empty fact-set
    pub parse_error: Option<String>,
}

impl ModuleFacts {
    /// The defined-empty fact-set for a module that could not be parsed
    pub fn parse_failed(reason: impl std::fmt::Display) -> Self {
        Self {
            detected_issues: vec![format!("parse failed: {reason}")],
            parse_error: Some(reason.to_string()),
            ..Default::default()
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.parse_error.is_none()
    }

    pub fn declared_types(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }

    /// Module-level functions (methods excluded)
    pub fn functions(&self) -> Vec<&str> {
        self.callables
            .iter()
            .filter(|c| c.owner.is_none())
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn methods_by_type(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut map: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for t in &self.types {
            map.entry(t.name.as_str()).or_default();
        }
        for c in &self.callables {
            if let Some(owner) = &c.owner {
                map.entry(owner.as_str()).or_default().push(c.name.as_str());
            }
        }
        map
    }

    pub fn find_type(&self, name: &str) -> Option<&TypeDecl> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Look up a method on a type, or a module-level function when `owner` is `None`
    pub fn find_callable(&self, owner: Option<&str>, name: &str) -> Option<&Callable> {
        self.callables
            .iter()
            .find(|c| c.name == name && c.owner.as_deref() == owner)
    }

    /// True when any import equals `module` or is a submodule of it
    pub fn imports_module(&self, module: &str) -> bool {
        self.imports.iter().any(|i| {
            i == module
                || i.strip_prefix(module)
                    .is_some_and(|rest| rest.starts_with('.') || rest.starts_with("::"))
        })
    }
}

// ============================================================================
// Audits
// ============================================================================

/// The eight audit dimensions
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Architecture,
    Contract,
    DependencyConsistency,
    ErrorHandling,
    ErrorIntelligence,
    RetryInstrumentation,
    Integration,
    TestCoverage,
}

impl Dimension {
    pub const ALL: [Dimension; 8] = [
        Dimension::Architecture,
        Dimension::Contract,
        Dimension::DependencyConsistency,
        Dimension::ErrorHandling,
        Dimension::ErrorIntelligence,
        Dimension::RetryInstrumentation,
        Dimension::Integration,
        Dimension::TestCoverage,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Architecture => "Architecture",
            Dimension::Contract => "Contract compliance",
            Dimension::DependencyConsistency => "Dependency consistency",
            Dimension::ErrorHandling => "Error handling",
            Dimension::ErrorIntelligence => "Error intelligence",
            Dimension::RetryInstrumentation => "Retry instrumentation",
            Dimension::Integration => "Integration",
            Dimension::TestCoverage => "Test coverage",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of a single audit dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Healthy,
    NeedsAttention,
    Failing,
    /// Degenerate input, e.g. no orchestrating entity
    Warning,
    /// The auditor did not produce a result
    Unavailable,
}

impl AuditStatus {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 80.0 => AuditStatus::Healthy,
            s if s >= 50.0 => AuditStatus::NeedsAttention,
            _ => AuditStatus::Failing,
        }
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditStatus::Healthy => write!(f, "healthy"),
            AuditStatus::NeedsAttention => write!(f, "needs attention"),
            AuditStatus::Failing => write!(f, "failing"),
            AuditStatus::Warning => write!(f, "warning"),
            AuditStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// An issue raised by an auditor, the analyzer or a pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    pub message: String,
}

impl Issue {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            dimension: None,
            entity: None,
            message: message.into(),
        }
    }

    pub fn in_dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn for_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

/// A concrete remediation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizedFix {
    pub target: String,
    pub priority: Severity,
    pub action: String,
    pub effort_hours: f64,
}

/// Per-entity score within one dimension
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityScore {
    pub score: f64,
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub detail: BTreeMap<String, serde_json::Value>,
}

impl EntityScore {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            ..Default::default()
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.detail.insert(key.to_string(), value.into());
        self
    }
}

/// Output of one dimension auditor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub dimension: Dimension,
    pub per_entity: BTreeMap<String, EntityScore>,
    pub aggregate_score: f64,
    pub issues: Vec<Issue>,
    pub prioritized_fixes: Vec<PrioritizedFix>,
    pub status: AuditStatus,
    pub available: bool,
}

impl AuditResult {
    /// Build a result whose aggregate is the unweighted mean of the entity scores
    pub fn averaged(dimension: Dimension, per_entity: BTreeMap<String, EntityScore>) -> Self {
        let aggregate_score = if per_entity.is_empty() {
            0.0
        } else {
            per_entity.values().map(|s| s.score).sum::<f64>() / per_entity.len() as f64
        };
        Self::with_score(dimension, per_entity, aggregate_score)
    }

    pub fn with_score(
        dimension: Dimension,
        per_entity: BTreeMap<String, EntityScore>,
        aggregate_score: f64,
    ) -> Self {
        let aggregate_score = aggregate_score.clamp(0.0, 100.0);
        Self {
            dimension,
            per_entity,
            aggregate_score,
            issues: Vec::new(),
            prioritized_fixes: Vec::new(),
            status: AuditStatus::from_score(aggregate_score),
            available: true,
        }
    }

    /// Placeholder for a dimension whose auditor failed or never ran
    pub fn unavailable(dimension: Dimension, reason: impl std::fmt::Display) -> Self {
        Self {
            dimension,
            per_entity: BTreeMap::new(),
            aggregate_score: 0.0,
            issues: vec![Issue::new(
                Severity::High,
                format!("{} unavailable: {reason}", dimension.label()),
            )
            .in_dimension(dimension)],
            prioritized_fixes: Vec::new(),
            status: AuditStatus::Unavailable,
            available: false,
        }
    }

    pub fn push_issue(&mut self, severity: Severity, entity: Option<&str>, message: impl Into<String>) {
        let mut issue = Issue::new(severity, message).in_dimension(self.dimension);
        if let Some(entity) = entity {
            issue = issue.for_entity(entity);
        }
        self.issues.push(issue);
    }

    pub fn push_fix(
        &mut self,
        target: impl Into<String>,
        priority: Severity,
        action: impl Into<String>,
        effort_hours: f64,
    ) {
        self.prioritized_fixes.push(PrioritizedFix {
            target: target.into(),
            priority,
            action: action.into(),
            effort_hours,
        });
    }

    /// Entities scoring below `threshold`, sorted by name
    pub fn entities_below(&self, threshold: f64) -> Vec<&str> {
        self.per_entity
            .iter()
            .filter(|(_, s)| s.score < threshold)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Entities carrying an issue or a fix in this dimension, sorted
    pub fn entities_flagged(&self) -> Vec<&str> {
        let mut names: BTreeSet<&str> = self
            .per_entity
            .iter()
            .filter(|(_, s)| !s.issues.is_empty())
            .map(|(name, _)| name.as_str())
            .collect();
        names.extend(self.issues.iter().filter_map(|i| i.entity.as_deref()));
        names.extend(
            self.prioritized_fixes
                .iter()
                .map(|f| f.target.as_str())
                .filter(|t| self.per_entity.contains_key(*t)),
        );
        names.into_iter().collect()
    }

    /// Why the auditor produced no result, for an unavailable dimension
    pub fn unavailable_reason(&self) -> Option<&str> {
        if self.available {
            return None;
        }
        let prefix = format!("{} unavailable: ", self.dimension.label());
        self.issues
            .iter()
            .find_map(|i| i.message.strip_prefix(prefix.as_str()))
    }
}

// ============================================================================
// Drift tracking
// ============================================================================

/// Persisted set of names used to detect structural drift between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "agents", default)]
    pub agent_names: BTreeSet<String>,
    #[serde(rename = "tests", default)]
    pub test_names: BTreeSet<String>,
    #[serde(rename = "core_systems", default)]
    pub core_module_names: BTreeSet<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` read as UTC. Anything else is `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(serde_json::Value::String(text)) = raw else {
        return Ok(None);
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&text) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    Ok(
        chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc()),
    )
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.agent_names.is_empty()
            && self.test_names.is_empty()
            && self.core_module_names.is_empty()
    }
}

/// Difference between the current scan and the previous snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub new_agents: Vec<String>,
    pub removed_agents: Vec<String>,
    pub unchanged_agents: Vec<String>,
    pub new_tests: Vec<String>,
    pub removed_tests: Vec<String>,
    pub new_core_systems: Vec<String>,
    pub removed_core_systems: Vec<String>,
    /// No previous snapshot could be loaded
    pub first_run: bool,
}

impl ChangeSet {
    pub fn has_changes(&self) -> bool {
        !(self.new_agents.is_empty()
            && self.removed_agents.is_empty()
            && self.new_tests.is_empty()
            && self.removed_tests.is_empty()
            && self.new_core_systems.is_empty()
            && self.removed_core_systems.is_empty())
    }
}

// ============================================================================
// Report
// ============================================================================

/// Overall status label derived from the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthStatus {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 80.0 => HealthStatus::Excellent,
            s if s >= 70.0 => HealthStatus::Good,
            s if s >= 60.0 => HealthStatus::Fair,
            s if s >= 50.0 => HealthStatus::Poor,
            _ => HealthStatus::Critical,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Excellent => write!(f, "Excellent"),
            HealthStatus::Good => write!(f, "Good"),
            HealthStatus::Fair => write!(f, "Fair"),
            HealthStatus::Poor => write!(f, "Poor"),
            HealthStatus::Critical => write!(f, "Critical"),
        }
    }
}

/// Headline numbers of a run; percentages are rounded to two decimals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total_agents: usize,
    pub analyzed_agents: usize,
    pub parse_failures: usize,
    pub total_tests: usize,
    pub total_core_modules: usize,
    pub tested_agents: Vec<String>,
    pub untested_agents: Vec<String>,
    pub test_coverage: f64,
    pub error_intelligence_coverage: f64,
    pub retry_coverage: f64,
    pub error_handling_score: f64,
    pub integration_health: f64,
    pub contract_compliance: f64,
    pub dependency_consistency: f64,
    pub architecture_score: f64,
    pub code_quality: f64,
}

/// Compact per-dimension view kept in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionSummary {
    pub score: f64,
    pub status: AuditStatus,
    pub available: bool,
    pub issue_count: usize,
}

/// Module-analysis outcome for one entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityHealth {
    pub name: String,
    pub parsed: bool,
    pub type_hint_coverage: f64,
    pub docstring_coverage: f64,
    pub complexity_estimate: f64,
    pub issues: Vec<String>,
}

/// One line of the remediation roadmap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapItem {
    pub dimension: Dimension,
    pub target: String,
    pub action: String,
    pub effort_hours: f64,
}

/// Prioritized remediation plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roadmap {
    pub critical: Vec<RoadmapItem>,
    pub high: Vec<RoadmapItem>,
    pub medium: Vec<RoadmapItem>,
    pub estimated_effort_hours: f64,
}

impl Roadmap {
    pub fn is_empty(&self) -> bool {
        self.critical.is_empty() && self.high.is_empty() && self.medium.is_empty()
    }

    pub fn len(&self) -> usize {
        self.critical.len() + self.high.len() + self.medium.len()
    }
}

/// The sole value returned by a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub run_id: uuid::Uuid,
    pub generated_at: DateTime<Utc>,
    pub project_root: PathBuf,
    pub composite_score: f64,
    pub status: HealthStatus,
    pub summary: HealthSummary,
    pub dimensions: BTreeMap<Dimension, DimensionSummary>,
    pub entities: Vec<EntityHealth>,
    pub issues: Vec<Issue>,
    pub changes: ChangeSet,
    pub recommendations: Vec<String>,
    pub roadmap: Roadmap,
    pub stage_errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_zero_total() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(3, 0), 0.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(percentage(2, 3)), 66.67);
        assert_eq!(round2(100.0), 100.0);
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(HealthStatus::from_score(80.0), HealthStatus::Excellent);
        assert_eq!(HealthStatus::from_score(79.99), HealthStatus::Good);
        assert_eq!(HealthStatus::from_score(60.0), HealthStatus::Fair);
        assert_eq!(HealthStatus::from_score(50.0), HealthStatus::Poor);
        assert_eq!(HealthStatus::from_score(49.9), HealthStatus::Critical);
    }

    #[test]
    fn test_parse_failed_facts_are_empty() {
        let facts = ModuleFacts::parse_failed("syntax error at line 3");
        assert!(!facts.is_parsed());
        assert_eq!(facts.type_hint_coverage, 0.0);
        assert_eq!(facts.docstring_coverage, 0.0);
        assert_eq!(
            facts.detected_issues,
            vec!["parse failed: syntax error at line 3".to_string()]
        );
    }

    #[test]
    fn test_imports_module_matches_submodules() {
        let facts = ModuleFacts {
            imports: vec!["typing".into(), "os.path".into(), "tracing::info".into()],
            ..Default::default()
        };
        assert!(facts.imports_module("typing"));
        assert!(facts.imports_module("os"));
        assert!(facts.imports_module("tracing"));
        assert!(!facts.imports_module("typ"));
        assert!(!facts.imports_module("logging"));
    }

    #[test]
    fn test_snapshot_serializes_with_persisted_field_names() {
        let snapshot = Snapshot {
            agent_names: ["a".to_string()].into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&snapshot).expect("serialize snapshot");
        assert_eq!(json["agents"][0], "a");
        assert!(json["tests"].as_array().expect("tests array").is_empty());
        assert!(json.get("core_systems").is_some());
    }

    #[test]
    fn test_unavailable_result() {
        let result = AuditResult::unavailable(Dimension::Integration, "panicked");
        assert!(!result.available);
        assert_eq!(result.aggregate_score, 0.0);
        assert_eq!(result.status, AuditStatus::Unavailable);
        assert!(result.issues[0].message.contains("unavailable"));
    }
}
