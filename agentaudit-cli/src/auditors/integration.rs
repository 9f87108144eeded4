//! Integration auditor
//!
//! Resolves the edges declared by the orchestrating agent (agents it
//! imports plus configured extra edges) and checks every target exposes a
//! main type with the entry method.

use super::{find_main_type, referenced_agents, AuditContext, Auditor};
use crate::models::{percentage, AuditResult, AuditStatus, Dimension, EntityScore, Severity};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

const EDGE_FIX_HOURS: f64 = 1.0;

pub struct IntegrationAuditor;

impl Auditor for IntegrationAuditor {
    fn dimension(&self) -> Dimension {
        Dimension::Integration
    }

    fn audit(&self, ctx: &AuditContext) -> Result<AuditResult> {
        let integration = &ctx.config.integration;
        let entry = ctx.config.contract.entry_method.as_str();
        let orchestrator = integration.orchestrator.as_str();

        let Some(orchestrator_facts) = ctx
            .scan
            .agents
            .get(orchestrator)
            .filter(|e| e.exists)
            .and_then(|e| ctx.facts.get(&e.name))
        else {
            warn!("Orchestrating agent '{}' not found", orchestrator);
            return Ok(degenerate(format!(
                "orchestrating agent '{orchestrator}' not found; no edges to verify"
            )));
        };

        let mut edges: BTreeSet<String> =
            referenced_agents(orchestrator_facts, orchestrator, ctx.scan.agents.keys())
                .into_iter()
                .collect();
        edges.extend(
            integration
                .edges
                .iter()
                .filter(|e| e.as_str() != orchestrator)
                .cloned(),
        );

        if edges.is_empty() {
            return Ok(degenerate(format!(
                "orchestrating agent '{orchestrator}' declares no agent edges"
            )));
        }

        let mut per_entity = BTreeMap::new();
        let mut failures = Vec::new();
        for target in &edges {
            let problem = check_edge(ctx, target, entry);
            let score = match &problem {
                None => EntityScore::new(100.0),
                Some(reason) => {
                    let mut score = EntityScore::new(0.0);
                    score.issues.push(reason.clone());
                    failures.push((target.clone(), reason.clone()));
                    score
                }
            };
            per_entity.insert(
                target.clone(),
                score.with_detail("edge", format!("{orchestrator} -> {target}")),
            );
        }

        let passing = edges.len() - failures.len();
        let health = percentage(passing, edges.len());
        let mut result = AuditResult::with_score(Dimension::Integration, per_entity, health);

        for (target, reason) in failures {
            result.push_issue(
                Severity::High,
                Some(&target),
                format!("edge {orchestrator} -> {target} is broken: {reason}"),
            );
            result.push_fix(
                target,
                Severity::High,
                format!("Expose a main type with {entry}()"),
                EDGE_FIX_HOURS,
            );
        }

        Ok(result)
    }
}

/// `None` when the edge target is callable through the contract
fn check_edge(ctx: &AuditContext, target: &str, entry: &str) -> Option<String> {
    let Some(entity) = ctx.scan.agents.get(target).filter(|e| e.exists) else {
        return Some("target does not exist".to_string());
    };
    let Some(facts) = ctx.facts.get(&entity.name) else {
        return Some("target was not analyzed".to_string());
    };
    let Some(main_type) = find_main_type(target, facts, &ctx.config.contract) else {
        return Some("no identifiable main type".to_string());
    };
    if !main_type.methods.iter().any(|m| m == entry) {
        return Some(format!("{} has no {entry}() method", main_type.name));
    }
    None
}

/// Zero-edge report with an explicit warning status
fn degenerate(message: String) -> AuditResult {
    let mut result = AuditResult::with_score(Dimension::Integration, BTreeMap::new(), 0.0);
    result.status = AuditStatus::Warning;
    result.push_issue(Severity::Medium, None, message);
    result
}
