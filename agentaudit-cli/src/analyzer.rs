//! Module analyzer
//!
//! Runs the structural parser over every existing entity's main file and
//! derives coverage ratios and a coarse complexity estimate. A file that
//! cannot be read or parsed degrades to the empty fact-set with a
//! `parse failed: <reason>` issue; nothing here ever propagates an error.

use crate::config::Language;
use crate::models::{percentage, ModuleFacts, ScanResult};
use crate::parsers::{parser_for, StructuralParser};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Coverage below this raises an analyzer issue
const LOW_COVERAGE: f64 = 50.0;

/// Complexity estimate at or above this raises an analyzer issue
const HIGH_COMPLEXITY: f64 = 8.0;

pub struct ModuleAnalyzer {
    parser: Box<dyn StructuralParser>,
}

impl ModuleAnalyzer {
    pub fn new(language: Language) -> Self {
        Self {
            parser: parser_for(language),
        }
    }

    pub fn language(&self) -> Language {
        self.parser.language()
    }

    /// Analyze one module's text
    pub fn analyze_source(&self, source: &str) -> ModuleFacts {
        match self.parser.parse(source) {
            Ok(mut facts) => {
                derive_metrics(&mut facts);
                facts
            }
            Err(e) => ModuleFacts::parse_failed(e),
        }
    }

    /// Analyze one file on disk
    pub fn analyze_file(&self, path: &Path) -> ModuleFacts {
        if !self.language().is_source_file(path) {
            return ModuleFacts::parse_failed(format!(
                "no {} parser for {}",
                self.language(),
                path.display()
            ));
        }

        let source = match read_source(path) {
            Ok(source) => source,
            Err(e) => {
                warn!("Failed to read {}: {:#}", path.display(), e);
                return ModuleFacts::parse_failed(format!("{e:#}"));
            }
        };

        let facts = self.analyze_source(&source);
        if let Some(reason) = &facts.parse_error {
            warn!("Failed to parse {}: {}", path.display(), reason);
        }
        facts
    }

    /// Analyze the main file of every existing entity on a bounded pool
    pub fn analyze_scan(&self, scan: &ScanResult, workers: usize) -> BTreeMap<String, ModuleFacts> {
        let targets: Vec<(String, PathBuf)> = scan
            .existing_agents()
            .filter_map(|e| e.main_file_path.clone().map(|p| (e.name.clone(), p)))
            .collect();

        debug!(
            "Analyzing {} modules with {} workers",
            targets.len(),
            workers
        );

        // Worker threads do not inherit a scoped subscriber
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());
        let analyze = |(name, path): &(String, PathBuf)| {
            let facts = tracing::dispatcher::with_default(&dispatch, || self.analyze_guarded(path));
            (name.clone(), facts)
        };

        match rayon::ThreadPoolBuilder::new().num_threads(workers.max(1)).build() {
            Ok(pool) => pool.install(|| targets.par_iter().map(analyze).collect()),
            Err(e) => {
                warn!("Failed to build analysis pool, analyzing sequentially: {}", e);
                targets.iter().map(analyze).collect()
            }
        }
    }

    /// A panicking grammar must not take the rest of the scan down with it
    fn analyze_guarded(&self, path: &Path) -> ModuleFacts {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.analyze_file(path)))
            .unwrap_or_else(|panic_info| {
                let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                warn!("Parser panicked on {}: {}", path.display(), msg);
                ModuleFacts::parse_failed(format!("parser panicked: {msg}"))
            })
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

/// Fill in coverage ratios, complexity and analyzer issues from raw facts
pub fn derive_metrics(facts: &mut ModuleFacts) {
    let total = facts.callables.len();
    let hinted = facts.callables.iter().filter(|c| c.has_type_hints()).count();
    let documented = facts.callables.iter().filter(|c| c.has_docstring).count();

    facts.type_hint_coverage = percentage(hinted, total);
    facts.docstring_coverage = percentage(documented, total);
    facts.complexity_estimate = ((1 + facts.branch_count) as f64 / 2.0).clamp(0.0, 10.0);

    if !facts.has_module_docstring {
        facts.detected_issues.push("missing module docstring".to_string());
    }
    if total > 0 && facts.type_hint_coverage < LOW_COVERAGE {
        facts.detected_issues.push(format!(
            "low type hint coverage ({:.1}%)",
            facts.type_hint_coverage
        ));
    }
    if total > 0 && facts.docstring_coverage < LOW_COVERAGE {
        facts.detected_issues.push(format!(
            "low docstring coverage ({:.1}%)",
            facts.docstring_coverage
        ));
    }
    if facts.complexity_estimate >= HIGH_COMPLEXITY {
        facts.detected_issues.push(format!(
            "high complexity estimate ({:.1})",
            facts.complexity_estimate
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_callables_have_zero_coverage() {
        let analyzer = ModuleAnalyzer::new(Language::Python);
        let facts = analyzer.analyze_source("\"\"\"Constants.\"\"\"\nLIMIT = 3\n");

        assert!(facts.is_parsed());
        assert_eq!(facts.type_hint_coverage, 0.0);
        assert_eq!(facts.docstring_coverage, 0.0);
        assert!(!facts.type_hint_coverage.is_nan());
        assert!(facts.detected_issues.is_empty());
    }

    #[test]
    fn test_coverage_counts_all_callables() {
        let analyzer = ModuleAnalyzer::new(Language::Python);
        let facts = analyzer.analyze_source(
            r#"
class Worker:
    def execute(self, task: str) -> dict:
        """Run."""
        return {}

    def helper(self, x):
        return x

def build():
    return Worker()

def describe() -> str:
    """Describe."""
    return "worker"
"#,
        );

        // execute + describe hinted and documented out of 4 callables
        assert_eq!(facts.type_hint_coverage, 50.0);
        assert_eq!(facts.docstring_coverage, 50.0);
        assert!(facts
            .detected_issues
            .contains(&"missing module docstring".to_string()));
    }

    #[test]
    fn test_complexity_is_halved_and_clamped() {
        let mut facts = ModuleFacts {
            branch_count: 3,
            has_module_docstring: true,
            ..Default::default()
        };
        derive_metrics(&mut facts);
        assert_eq!(facts.complexity_estimate, 2.0);

        let mut busy = ModuleFacts {
            branch_count: 40,
            has_module_docstring: true,
            ..Default::default()
        };
        derive_metrics(&mut busy);
        assert_eq!(busy.complexity_estimate, 10.0);
        assert!(busy.detected_issues[0].starts_with("high complexity"));
    }

    #[test]
    fn test_malformed_source_degrades() {
        let analyzer = ModuleAnalyzer::new(Language::Python);
        let facts = analyzer.analyze_source("def broken(:\n");
        assert!(!facts.is_parsed());
        assert_eq!(facts.detected_issues.len(), 1);
        assert!(facts.detected_issues[0].starts_with("parse failed: syntax error"));
    }

    #[test]
    fn test_unreadable_file_degrades() {
        let dir = tempfile::tempdir().expect("tempdir");
        let analyzer = ModuleAnalyzer::new(Language::Python);
        let facts = analyzer.analyze_file(&dir.path().join("missing.py"));
        assert!(!facts.is_parsed());
        assert!(facts.detected_issues[0].starts_with("parse failed: cannot read"));
    }

    #[test]
    fn test_wrong_extension_degrades() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").expect("write");
        let analyzer = ModuleAnalyzer::new(Language::Python);
        let facts = analyzer.analyze_file(&path);
        assert!(facts.detected_issues[0].contains("no python parser"));
    }
}
