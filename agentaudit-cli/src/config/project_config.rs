//! Project-level configuration support
//!
//! Loads per-project configuration from `agentaudit.toml` or
//! `.agentauditrc.json` in the project root.
//!
//! # Configuration Format
//!
//! ```toml
//! # agentaudit.toml
//! workers = 8
//!
//! [layout]
//! language = "python"
//! agents_dir = "agents"
//! tests_dir = "tests"
//!
//! [contract]
//! entry_method = "execute"
//!
//! [scoring.weights]
//! test_coverage = 0.20
//! error_intelligence = 0.20
//!
//! [scoring.thresholds]
//! test_coverage = 80.0
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Source language of the analyzed project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
    Rust,
}

impl Language {
    /// Source file extension
    pub fn extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::Rust => "rs",
        }
    }

    /// File that marks a directory as a package/module
    pub fn package_init(&self) -> &'static str {
        match self {
            Language::Python => "__init__.py",
            Language::Rust => "mod.rs",
        }
    }

    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some(self.extension())
    }

    /// Private files never count as main files or sub-components
    pub fn is_private_file(&self, file_name: &str) -> bool {
        file_name.starts_with('_') || file_name.starts_with('.') || file_name == self.package_init()
    }

    /// Words that cannot be used as module names
    pub fn reserved_words(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &[
                "false", "none", "true", "and", "as", "assert", "async", "await", "break",
                "class", "continue", "def", "del", "elif", "else", "except", "finally", "for",
                "from", "global", "if", "import", "in", "is", "lambda", "nonlocal", "not", "or",
                "pass", "raise", "return", "try", "while", "with", "yield",
            ],
            Language::Rust => &[
                "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else",
                "enum", "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop",
                "match", "mod", "move", "mut", "pub", "ref", "return", "self", "static",
                "struct", "super", "trait", "true", "type", "unsafe", "use", "where", "while",
            ],
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::Rust => write!(f, "rust"),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditConfig {
    /// Worker threads for analysis and auditing (default: CPU count)
    #[serde(default)]
    pub workers: Option<usize>,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub contract: ContractConfig,

    #[serde(default)]
    pub dependencies: DependencyConfig,

    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,

    #[serde(default)]
    pub instrumentation: InstrumentationConfig,

    #[serde(default)]
    pub integration: IntegrationConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Directory conventions of the analyzed project
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub language: Language,
    pub agents_dir: PathBuf,
    pub tests_dir: PathBuf,
    pub core_dir: PathBuf,
    /// Documentation locations besides the project root
    pub docs_dirs: Vec<PathBuf>,
    /// Directory inside an agent that holds its sub-components
    pub sub_component_dir: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            language: Language::Python,
            agents_dir: PathBuf::from("agents"),
            tests_dir: PathBuf::from("tests"),
            core_dir: PathBuf::from("core"),
            docs_dirs: vec![PathBuf::from("docs")],
            sub_component_dir: "components".to_string(),
        }
    }
}

/// Conventions checked by the contract and integration auditors
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Conventional entry method every agent exposes
    pub entry_method: String,
    /// Suffixes tried after the bare PascalCase name, e.g. `PlannerAgent`
    pub main_type_suffixes: Vec<String>,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            entry_method: "execute".to_string(),
            main_type_suffixes: vec!["Agent".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DependencyConfig {
    /// Imports every agent must carry
    pub required_imports: Vec<String>,
    /// Imports whose partial adoption across agents is penalized
    pub standard_imports: Vec<String>,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            required_imports: vec!["logging".to_string(), "typing".to_string()],
            standard_imports: vec![
                "dataclasses".to_string(),
                "pathlib".to_string(),
                "datetime".to_string(),
                "json".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ErrorHandlingConfig {
    /// Call receivers that count as logging, e.g. `logger` in `logger.error(...)`
    pub logging_receivers: Vec<String>,
    /// Call names inside an except/error path that count as recovery
    pub recovery_keywords: Vec<String>,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            logging_receivers: vec![
                "logger".to_string(),
                "logging".to_string(),
                "log".to_string(),
                "self.logger".to_string(),
                "self.log".to_string(),
                "tracing".to_string(),
            ],
            recovery_keywords: vec![
                "retry".to_string(),
                "fallback".to_string(),
                "recover".to_string(),
                "default".to_string(),
                "unwrap_or".to_string(),
                "or_else".to_string(),
            ],
        }
    }
}

/// Markers that identify one kind of instrumentation
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InstrumentationMarkers {
    /// Substrings of an import path that count as importing the facility
    pub import_markers: Vec<String>,
    /// Substrings of a call target that count as a call site
    pub call_markers: Vec<String>,
    /// Decorator/attribute names that count as a call site
    pub decorator_markers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    pub error_intelligence: InstrumentationMarkers,
    pub retry: InstrumentationMarkers,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            error_intelligence: InstrumentationMarkers {
                import_markers: strings(&["error_intelligence", "error_tracking"]),
                call_markers: strings(&[
                    "record_error",
                    "capture_exception",
                    "report_error",
                    "track_error",
                ]),
                decorator_markers: strings(&["track_errors", "capture_errors"]),
            },
            retry: InstrumentationMarkers {
                import_markers: strings(&["retry", "tenacity", "backoff"]),
                call_markers: strings(&["with_retry", "retry_call", "retry"]),
                decorator_markers: strings(&["retry", "with_retry", "backoff.on_exception"]),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Name of the entity that wires the other agents together
    pub orchestrator: String,
    /// Extra edges that are not visible through imports
    pub edges: Vec<String>,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            orchestrator: "orchestrator".to_string(),
            edges: Vec::new(),
        }
    }
}

/// Scoring configuration for the composite health score
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub thresholds: ScoringThresholds,
}

/// Weights of the composite formula (must sum to 1.0)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub test_coverage: f64,
    pub error_intelligence: f64,
    pub error_handling: f64,
    pub integration: f64,
    pub contract: f64,
    pub dependency: f64,
    pub code_quality: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            test_coverage: 0.20,
            error_intelligence: 0.20,
            error_handling: 0.15,
            integration: 0.15,
            contract: 0.15,
            dependency: 0.10,
            code_quality: 0.05,
        }
    }
}

impl ScoringWeights {
    fn sum(&self) -> f64 {
        self.test_coverage
            + self.error_intelligence
            + self.error_handling
            + self.integration
            + self.contract
            + self.dependency
            + self.code_quality
    }

    /// Validate that weights sum to 1.0 (with tolerance)
    pub fn is_valid(&self) -> bool {
        (self.sum() - 1.0).abs() < 0.001
    }

    /// Normalize weights to sum to 1.0
    pub fn normalize(&mut self) {
        let sum = self.sum();
        if sum > 0.0 {
            self.test_coverage /= sum;
            self.error_intelligence /= sum;
            self.error_handling /= sum;
            self.integration /= sum;
            self.contract /= sum;
            self.dependency /= sum;
            self.code_quality /= sum;
        }
    }
}

/// Per-dimension score below which a recommendation is emitted
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringThresholds {
    pub test_coverage: f64,
    pub error_intelligence: f64,
    pub retry: f64,
    pub error_handling: f64,
    pub integration: f64,
    pub contract: f64,
    pub dependency: f64,
    pub architecture: f64,
    pub code_quality: f64,
    /// Scores below this are escalated to critical
    pub critical: f64,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            test_coverage: 80.0,
            error_intelligence: 80.0,
            retry: 70.0,
            error_handling: 70.0,
            integration: 80.0,
            contract: 80.0,
            dependency: 90.0,
            architecture: 80.0,
            code_quality: 60.0,
            critical: 40.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Project-relative path of the persisted snapshot
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".agentaudit").join("snapshot.json"),
        }
    }
}

/// Logging set up around a single run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Install a run-scoped subscriber (off for library callers that bring their own)
    pub install: bool,
    /// EnvFilter directive, e.g. `info` or `agentaudit=debug`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            install: false,
            level: "info".to_string(),
        }
    }
}

impl AuditConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let mut config: AuditConfig = toml::from_str(content)?;
        config.finalize();
        Ok(config)
    }

    /// Effective worker count (explicit config > CPU count)
    pub fn effective_workers(&self) -> usize {
        match self.workers {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4),
        }
    }

    /// Absolute snapshot path for a project root
    pub fn snapshot_path(&self, root: &Path) -> PathBuf {
        if self.snapshot.path.is_absolute() {
            self.snapshot.path.clone()
        } else {
            root.join(&self.snapshot.path)
        }
    }

    fn finalize(&mut self) {
        if !self.scoring.weights.is_valid() {
            warn!("Scoring weights do not sum to 1.0, normalizing");
            self.scoring.weights.normalize();
        }
    }
}

/// Load project configuration from the project root.
///
/// Searches for configuration files in this order:
/// 1. `agentaudit.toml`
/// 2. `.agentauditrc.json`
///
/// Returns default configuration if no config file is found or loadable.
pub fn load_project_config(repo_path: &Path) -> AuditConfig {
    let toml_path = repo_path.join("agentaudit.toml");
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    let json_path = repo_path.join(".agentauditrc.json");
    if json_path.exists() {
        match load_json_config(&json_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", json_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", json_path.display(), e);
            }
        }
    }

    debug!("No project config found, using defaults");
    AuditConfig::default()
}

fn load_toml_config(path: &Path) -> anyhow::Result<AuditConfig> {
    let content = std::fs::read_to_string(path)?;
    AuditConfig::from_toml_str(&content)
}

fn load_json_config(path: &Path) -> anyhow::Result<AuditConfig> {
    let content = std::fs::read_to_string(path)?;
    let mut config: AuditConfig = serde_json::from_str(&content)?;
    config.finalize();
    Ok(config)
}

/// Example file written by `agentaudit init`
pub const EXAMPLE_CONFIG: &str = r#"# agentaudit configuration
# All keys are optional; the values below are the defaults.

# workers = 8

[layout]
language = "python"          # python | rust
agents_dir = "agents"
tests_dir = "tests"
core_dir = "core"
docs_dirs = ["docs"]
sub_component_dir = "components"

[contract]
entry_method = "execute"
main_type_suffixes = ["Agent"]

[dependencies]
required_imports = ["logging", "typing"]
standard_imports = ["dataclasses", "pathlib", "datetime", "json"]

[error_handling]
logging_receivers = ["logger", "logging", "log", "self.logger", "self.log", "tracing"]
recovery_keywords = ["retry", "fallback", "recover", "default", "unwrap_or", "or_else"]

[instrumentation.error_intelligence]
import_markers = ["error_intelligence", "error_tracking"]
call_markers = ["record_error", "capture_exception", "report_error", "track_error"]
decorator_markers = ["track_errors", "capture_errors"]

[instrumentation.retry]
import_markers = ["retry", "tenacity", "backoff"]
call_markers = ["with_retry", "retry_call", "retry"]
decorator_markers = ["retry", "with_retry", "backoff.on_exception"]

[integration]
orchestrator = "orchestrator"
edges = []

[scoring.weights]
test_coverage = 0.20
error_intelligence = 0.20
error_handling = 0.15
integration = 0.15
contract = 0.15
dependency = 0.10
code_quality = 0.05

[scoring.thresholds]
test_coverage = 80.0
error_intelligence = 80.0
retry = 70.0
error_handling = 70.0
integration = 80.0
contract = 80.0
dependency = 90.0
architecture = 80.0
code_quality = 60.0
critical = 40.0

[snapshot]
path = ".agentaudit/snapshot.json"
"#;
