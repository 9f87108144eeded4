//! Architecture auditor
//!
//! Scores every discovered entity (including ones without a main file)
//! against the layout convention, and reports import cycles between agents
//! using Tarjan's SCC algorithm.

use super::{referenced_agents, AuditContext, Auditor};
use crate::models::{AuditResult, Dimension, EntityKind, EntityScore, Severity};
use anyhow::Result;
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use tracing::debug;

const MISSING_MAIN_FILE: f64 = 20.0;
const MISSING_PACKAGE_INIT: f64 = 15.0;
const MISSING_SUB_COMPONENT_INDEX: f64 = 5.0;
const BAD_SUB_COMPONENT_NAMES: f64 = 10.0;
const MISSING_DOCUMENTATION: f64 = 5.0;

const FIX_EFFORT_HOURS: f64 = 0.5;

pub struct ArchitectureAuditor;

impl Auditor for ArchitectureAuditor {
    fn dimension(&self) -> Dimension {
        Dimension::Architecture
    }

    fn audit(&self, ctx: &AuditContext) -> Result<AuditResult> {
        let naming = Regex::new(r"^[a-z][a-z0-9_]*\.[a-z]+$")?;
        let package_init = ctx.config.layout.language.package_init();

        let mut per_entity = BTreeMap::new();
        let mut fixes = Vec::new();

        for entity in ctx.scan.agents.values() {
            let mut score = 100.0;
            let mut issues = Vec::new();

            if !entity.exists {
                score -= MISSING_MAIN_FILE;
                issues.push("main file missing".to_string());
                fixes.push((
                    Severity::High,
                    entity.name.clone(),
                    format!(
                        "Add {}/{}.{}",
                        entity.name,
                        entity.name,
                        ctx.config.layout.language.extension()
                    ),
                ));
            }
            if entity.kind == EntityKind::Directory && !entity.has_package_init {
                score -= MISSING_PACKAGE_INIT;
                issues.push(format!("{package_init} missing"));
                fixes.push((Severity::Medium, entity.name.clone(), format!("Add {package_init}")));
            }
            if entity.has_sub_components && !entity.has_sub_component_index {
                score -= MISSING_SUB_COMPONENT_INDEX;
                issues.push("sub-component index missing".to_string());
                fixes.push((
                    Severity::Medium,
                    entity.name.clone(),
                    format!("Add {}/{package_init}", ctx.config.layout.sub_component_dir),
                ));
            }

            let bad_names: Vec<&str> = entity
                .sub_component_files
                .iter()
                .map(String::as_str)
                .filter(|f| !naming.is_match(f))
                .collect();
            if !bad_names.is_empty() {
                score -= BAD_SUB_COMPONENT_NAMES;
                issues.push(format!("sub-component names not snake_case: {}", bad_names.join(", ")));
                fixes.push((
                    Severity::Medium,
                    entity.name.clone(),
                    "Rename sub-components to snake_case".to_string(),
                ));
            }
            if !entity.has_documentation {
                score -= MISSING_DOCUMENTATION;
                issues.push("no documentation".to_string());
                fixes.push((Severity::Medium, entity.name.clone(), "Add a README.md".to_string()));
            }

            let mut entity_score = EntityScore::new(f64::max(score, 0.0))
                .with_detail("sub_component_count", entity.sub_component_count);
            entity_score.issues = issues;
            per_entity.insert(entity.name.clone(), entity_score);
        }

        let mut result = AuditResult::averaged(Dimension::Architecture, per_entity);

        for entity in ctx.scan.agents.values().filter(|e| !e.exists) {
            result.push_issue(
                Severity::High,
                Some(&entity.name),
                format!("{} has no resolvable main file", entity.name),
            );
        }
        for cycle in import_cycles(ctx) {
            result.push_issue(
                Severity::High,
                None,
                format!("import cycle between agents: {}", cycle.join(" -> ")),
            );
        }
        for (priority, target, action) in fixes {
            result.push_fix(target, priority, action, FIX_EFFORT_HOURS);
        }

        Ok(result)
    }
}

/// Strongly connected groups of agents that import each other, names sorted
fn import_cycles(ctx: &AuditContext) -> Vec<Vec<String>> {
    let entities = ctx.analyzed_entities();
    let names: Vec<String> = entities.iter().map(|(n, _)| n.to_string()).collect();

    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let nodes: FxHashMap<&str, _> = entities
        .iter()
        .map(|(name, _)| (*name, graph.add_node(*name)))
        .collect();

    for (name, facts) in &entities {
        for target in referenced_agents(facts, name, &names) {
            if let (Some(&from), Some(&to)) = (nodes.get(name), nodes.get(target.as_str())) {
                graph.add_edge(from, to, ());
            }
        }
    }

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let mut members: Vec<String> = scc.iter().map(|&idx| graph[idx].to_string()).collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();

    debug!("Found {} import cycles among agents", cycles.len());
    cycles
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::AuditConfig;

    fn audit(scan: &crate::models::ScanResult, facts: &BTreeMap<String, crate::models::ModuleFacts>) -> AuditResult {
        let config = AuditConfig::default();
        let ctx = AuditContext::new(scan, facts, &config);
        ArchitectureAuditor.audit(&ctx).expect("audit")
    }

    #[test]
    fn test_compliant_entity_scores_100() {
        let scan = scan_of(vec![entity("planner")]);
        let result = audit(&scan, &BTreeMap::new());
        assert_eq!(result.aggregate_score, 100.0);
        assert!(result.prioritized_fixes.is_empty());
    }

    #[test]
    fn test_penalties_accumulate() {
        let mut broken = entity("broken");
        broken.exists = false;
        broken.main_file_path = None;
        broken.has_package_init = false;
        broken.has_documentation = false;
        broken.has_sub_components = true;
        broken.sub_component_count = 2;
        broken.sub_component_files = vec!["good_name.py".into(), "BadName.py".into()];

        let scan = scan_of(vec![broken, entity("fine")]);
        let result = audit(&scan, &BTreeMap::new());

        // 100 - 20 - 15 - 5 - 10 - 5
        assert_eq!(result.per_entity["broken"].score, 45.0);
        assert_eq!(result.per_entity["fine"].score, 100.0);
        assert_eq!(result.aggregate_score, 72.5);
        assert_eq!(result.prioritized_fixes.len(), 5);
        assert!(result
            .issues
            .iter()
            .any(|i| i.severity == Severity::High && i.entity.as_deref() == Some("broken")));
    }

    #[test]
    fn test_file_entity_needs_no_package_init() {
        let mut single = entity("router");
        single.kind = EntityKind::File;
        single.has_package_init = false;
        let scan = scan_of(vec![single]);
        let result = audit(&scan, &BTreeMap::new());
        assert_eq!(result.aggregate_score, 100.0);
    }

    #[test]
    fn test_import_cycle_reported() {
        let scan = scan_of(vec![entity("a"), entity("b"), entity("c")]);
        let mut facts = BTreeMap::new();
        facts.insert("a".to_string(), facts_with(vec![], vec![], &["agents.b.b"]));
        facts.insert("b".to_string(), facts_with(vec![], vec![], &["agents.a.a"]));
        facts.insert("c".to_string(), facts_with(vec![], vec![], &["agents.a.a"]));

        let result = audit(&scan, &facts);
        let cycles: Vec<_> = result
            .issues
            .iter()
            .filter(|i| i.message.starts_with("import cycle"))
            .collect();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].message.ends_with("a -> b"));
        // Cycles are reported, not scored
        assert_eq!(result.aggregate_score, 100.0);
    }
}
