//! Dimension auditors
//!
//! Each auditor scores one quality concern over the read-only scan and
//! module facts. Auditors share no mutable state, so the engine runs them
//! in parallel; a failing or panicking auditor becomes an unavailable
//! dimension instead of aborting the run.

mod architecture;
mod contract;
mod dependency;
mod error_handling;
mod instrumentation;
mod integration;
mod test_coverage;

pub use architecture::ArchitectureAuditor;
pub use contract::ContractAuditor;
pub use dependency::DependencyAuditor;
pub use error_handling::ErrorHandlingAuditor;
pub use instrumentation::{InstrumentationAuditor, InstrumentationLevel};
pub use integration::IntegrationAuditor;
pub use test_coverage::TestCoverageAuditor;

use crate::config::{AuditConfig, ContractConfig};
use crate::models::{AuditResult, Dimension, ModuleFacts, ScanResult, TypeDecl};
use anyhow::Result;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Everything an auditor may look at
pub struct AuditContext<'a> {
    pub scan: &'a ScanResult,
    pub facts: &'a BTreeMap<String, ModuleFacts>,
    pub config: &'a AuditConfig,
}

impl<'a> AuditContext<'a> {
    pub fn new(
        scan: &'a ScanResult,
        facts: &'a BTreeMap<String, ModuleFacts>,
        config: &'a AuditConfig,
    ) -> Self {
        Self { scan, facts, config }
    }

    /// Existing entities with their facts, in name order
    ///
    /// An entity whose facts are missing is paired with the empty fact-set.
    pub fn analyzed_entities(&self) -> Vec<(&'a str, &'a ModuleFacts)> {
        static EMPTY: std::sync::OnceLock<ModuleFacts> = std::sync::OnceLock::new();
        let empty = EMPTY.get_or_init(ModuleFacts::default);
        self.scan
            .existing_agents()
            .map(|e| (e.name.as_str(), self.facts.get(&e.name).unwrap_or(empty)))
            .collect()
    }
}

/// One independent scoring unit
pub trait Auditor: Send + Sync {
    fn dimension(&self) -> Dimension;

    fn audit(&self, ctx: &AuditContext) -> Result<AuditResult>;
}

/// Runs auditors in parallel and contains their failures
pub struct AuditEngine {
    auditors: Vec<Arc<dyn Auditor>>,
    workers: usize,
}

impl AuditEngine {
    pub fn new(workers: usize) -> Self {
        Self {
            auditors: Vec::new(),
            workers: workers.max(1),
        }
    }

    /// Engine with the eight standard dimensions
    pub fn with_default_auditors(workers: usize) -> Self {
        let mut engine = Self::new(workers);
        engine.register(Arc::new(ArchitectureAuditor));
        engine.register(Arc::new(ContractAuditor));
        engine.register(Arc::new(DependencyAuditor));
        engine.register(Arc::new(ErrorHandlingAuditor));
        engine.register(Arc::new(InstrumentationAuditor::error_intelligence()));
        engine.register(Arc::new(InstrumentationAuditor::retry()));
        engine.register(Arc::new(IntegrationAuditor));
        engine.register(Arc::new(TestCoverageAuditor));
        engine
    }

    pub fn register(&mut self, auditor: Arc<dyn Auditor>) {
        self.auditors.push(auditor);
    }

    pub fn auditor_count(&self) -> usize {
        self.auditors.len()
    }

    /// Run every registered auditor; the result holds one entry per dimension
    pub fn run(&self, ctx: &AuditContext) -> BTreeMap<Dimension, AuditResult> {
        info!("Running {} auditors", self.auditors.len());

        let dispatch = tracing::dispatcher::get_default(|d| d.clone());
        let run_one = |auditor: &Arc<dyn Auditor>| {
            tracing::dispatcher::with_default(&dispatch, || run_single_auditor(auditor, ctx))
        };

        let results: Vec<AuditResult> =
            match rayon::ThreadPoolBuilder::new().num_threads(self.workers).build() {
                Ok(pool) => pool.install(|| self.auditors.par_iter().map(run_one).collect()),
                Err(e) => {
                    warn!("Failed to build audit pool, auditing sequentially: {}", e);
                    self.auditors.iter().map(run_one).collect()
                }
            };

        results.into_iter().map(|r| (r.dimension, r)).collect()
    }
}

/// Run a single auditor with error handling and timing
fn run_single_auditor(auditor: &Arc<dyn Auditor>, ctx: &AuditContext) -> AuditResult {
    let dimension = auditor.dimension();
    let start = Instant::now();

    debug!("Running auditor: {}", dimension);

    let audit_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| auditor.audit(ctx)));

    match audit_result {
        Ok(Ok(result)) => {
            debug!(
                "Auditor {} scored {:.1} in {}ms",
                dimension,
                result.aggregate_score,
                start.elapsed().as_millis()
            );
            result
        }
        Ok(Err(e)) => {
            warn!("Auditor {} failed: {:#}", dimension, e);
            AuditResult::unavailable(dimension, format!("{e:#}"))
        }
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            error!("Auditor {} panicked: {}", dimension, panic_msg);
            AuditResult::unavailable(dimension, format!("panic: {panic_msg}"))
        }
    }
}

/// `data_loader` -> `DataLoader`
pub fn pascal_case(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Identify an entity's main type
///
/// Tried in order: `PascalCase(name)`, `PascalCase(name)` + each configured
/// suffix, the first type defining the entry method, the sole declared type.
pub fn find_main_type<'f>(
    name: &str,
    facts: &'f ModuleFacts,
    contract: &ContractConfig,
) -> Option<&'f TypeDecl> {
    let base = pascal_case(name);
    if let Some(decl) = facts.find_type(&base) {
        return Some(decl);
    }
    for suffix in &contract.main_type_suffixes {
        if let Some(decl) = facts.find_type(&format!("{base}{suffix}")) {
            return Some(decl);
        }
    }
    if let Some(decl) = facts
        .types
        .iter()
        .find(|t| t.methods.iter().any(|m| m == &contract.entry_method))
    {
        return Some(decl);
    }
    match facts.types.as_slice() {
        [only] => Some(only),
        _ => None,
    }
}

/// Agents referenced by an import path segment, excluding `own_name`
pub fn referenced_agents<'n>(
    facts: &ModuleFacts,
    own_name: &str,
    agent_names: impl IntoIterator<Item = &'n String>,
) -> Vec<String> {
    let agent_names: Vec<&String> = agent_names.into_iter().collect();
    let mut referenced = Vec::new();
    for import in &facts.imports {
        let segments = import
            .split(['.', ':', '{', '}', ','])
            .filter(|s| !s.is_empty());
        for segment in segments {
            if segment == own_name {
                continue;
            }
            if agent_names.iter().any(|a| a.as_str() == segment)
                && !referenced.iter().any(|r: &String| r == segment)
            {
                referenced.push(segment.to_string());
            }
        }
    }
    referenced.sort();
    referenced
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::{
        Callable, EntityDescriptor, EntityKind, ModuleFacts, ScanResult, TypeDecl,
    };
    use std::path::PathBuf;

    pub fn entity(name: &str) -> EntityDescriptor {
        EntityDescriptor {
            name: name.to_string(),
            kind: EntityKind::Directory,
            path: PathBuf::from("agents").join(name),
            main_file_path: Some(PathBuf::from("agents").join(name).join(format!("{name}.py"))),
            exists: true,
            has_companion_test: false,
            has_package_init: true,
            has_sub_components: false,
            sub_component_count: 0,
            has_sub_component_index: false,
            sub_component_files: Vec::new(),
            size_bytes: 100,
            last_modified: None,
            has_documentation: true,
        }
    }

    pub fn scan_of(entities: Vec<EntityDescriptor>) -> ScanResult {
        let mut scan = ScanResult::empty("/project");
        for e in entities {
            scan.agents.insert(e.name.clone(), e);
        }
        scan
    }

    pub fn agent_type(name: &str, methods: &[&str], documented: bool) -> TypeDecl {
        TypeDecl {
            name: name.to_string(),
            line: 1,
            has_docstring: documented,
            methods: methods.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn method(owner: &str, name: &str, return_type: Option<&str>) -> Callable {
        Callable {
            name: name.to_string(),
            owner: Some(owner.to_string()),
            line: 1,
            return_type: return_type.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn facts_with(types: Vec<TypeDecl>, callables: Vec<Callable>, imports: &[&str]) -> ModuleFacts {
        ModuleFacts {
            types,
            callables,
            imports: imports.iter().map(|i| i.to_string()).collect(),
            has_module_docstring: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::models::{AuditStatus, Severity};

    struct PanickingAuditor;

    impl Auditor for PanickingAuditor {
        fn dimension(&self) -> Dimension {
            Dimension::Integration
        }

        fn audit(&self, _ctx: &AuditContext) -> Result<AuditResult> {
            panic!("boom");
        }
    }

    struct FailingAuditor;

    impl Auditor for FailingAuditor {
        fn dimension(&self) -> Dimension {
            Dimension::Contract
        }

        fn audit(&self, _ctx: &AuditContext) -> Result<AuditResult> {
            anyhow::bail!("facts unavailable")
        }
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("data_loader"), "DataLoader");
        assert_eq!(pascal_case("planner"), "Planner");
        assert_eq!(pascal_case("web-scraper"), "WebScraper");
    }

    #[test]
    fn test_find_main_type_order() {
        let contract = ContractConfig::default();

        let exact = facts_with(
            vec![agent_type("Helper", &["execute"], false), agent_type("Planner", &[], false)],
            vec![],
            &[],
        );
        assert_eq!(find_main_type("planner", &exact, &contract).map(|t| t.name.as_str()), Some("Planner"));

        let suffixed = facts_with(vec![agent_type("PlannerAgent", &[], false)], vec![], &[]);
        assert_eq!(
            find_main_type("planner", &suffixed, &contract).map(|t| t.name.as_str()),
            Some("PlannerAgent")
        );

        let by_entry = facts_with(
            vec![agent_type("Config", &[], false), agent_type("Runner", &["execute"], false)],
            vec![],
            &[],
        );
        assert_eq!(
            find_main_type("planner", &by_entry, &contract).map(|t| t.name.as_str()),
            Some("Runner")
        );

        let ambiguous = facts_with(
            vec![agent_type("A", &[], false), agent_type("B", &[], false)],
            vec![],
            &[],
        );
        assert!(find_main_type("planner", &ambiguous, &contract).is_none());
    }

    #[test]
    fn test_referenced_agents() {
        let names = vec!["planner".to_string(), "router".to_string(), "orchestrator".to_string()];
        let facts = facts_with(
            vec![],
            vec![],
            &[
                "agents.planner.planner.PlannerAgent",
                "crate::agents::router::{Router,Route}",
                "typing.Any",
                "agents.orchestrator.helpers",
            ],
        );
        assert_eq!(
            referenced_agents(&facts, "orchestrator", &names),
            vec!["planner".to_string(), "router".to_string()]
        );
    }

    #[test]
    fn test_engine_contains_failures() {
        let scan = scan_of(vec![entity("a")]);
        let facts = BTreeMap::new();
        let config = AuditConfig::default();
        let ctx = AuditContext::new(&scan, &facts, &config);

        let mut engine = AuditEngine::new(2);
        engine.register(Arc::new(PanickingAuditor));
        engine.register(Arc::new(FailingAuditor));
        engine.register(Arc::new(TestCoverageAuditor));

        let results = engine.run(&ctx);
        assert_eq!(results.len(), 3);

        let integration = &results[&Dimension::Integration];
        assert!(!integration.available);
        assert_eq!(integration.status, AuditStatus::Unavailable);
        assert!(integration.issues[0].message.contains("panic: boom"));

        let contract = &results[&Dimension::Contract];
        assert!(!contract.available);
        assert_eq!(contract.issues[0].severity, Severity::High);

        assert!(results[&Dimension::TestCoverage].available);
    }

    #[test]
    fn test_default_engine_covers_all_dimensions() {
        let scan = scan_of(vec![entity("a"), entity("b")]);
        let facts = BTreeMap::new();
        let config = AuditConfig::default();
        let ctx = AuditContext::new(&scan, &facts, &config);

        let engine = AuditEngine::with_default_auditors(4);
        assert_eq!(engine.auditor_count(), 8);
        let results = engine.run(&ctx);
        for dimension in Dimension::ALL {
            assert!(results.contains_key(&dimension), "missing {dimension}");
        }
    }
}
