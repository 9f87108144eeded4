//! Dependency consistency auditor
//!
//! Penalizes agents missing a required import and standard imports that
//! only part of the agents adopted. The aggregate is project-wide rather
//! than an average of the per-entity scores.

use super::{AuditContext, Auditor};
use crate::models::{AuditResult, Dimension, EntityScore, Severity};
use anyhow::Result;
use std::collections::BTreeMap;

const MISSING_REQUIRED_PENALTY: f64 = 5.0;
const PARTIAL_ADOPTION_PENALTY: f64 = 3.0;
const EFFORT_HOURS_PER_IMPORT: f64 = 0.25;

pub struct DependencyAuditor;

impl Auditor for DependencyAuditor {
    fn dimension(&self) -> Dimension {
        Dimension::DependencyConsistency
    }

    fn audit(&self, ctx: &AuditContext) -> Result<AuditResult> {
        let deps = &ctx.config.dependencies;
        let entities = ctx.analyzed_entities();

        let mut per_entity = BTreeMap::new();
        let mut penalty = 0.0;
        let mut missing_pairs = Vec::new();

        for (name, facts) in &entities {
            let missing: Vec<&str> = deps
                .required_imports
                .iter()
                .map(String::as_str)
                .filter(|m| !facts.imports_module(m))
                .collect();

            penalty += MISSING_REQUIRED_PENALTY * missing.len() as f64;

            let mut score = EntityScore::new(f64::max(
                100.0 - MISSING_REQUIRED_PENALTY * missing.len() as f64,
                0.0,
            ))
            .with_detail("missing_required", missing.clone());
            score.issues = missing
                .iter()
                .map(|m| format!("missing required import {m}"))
                .collect();
            per_entity.insert(name.to_string(), score);

            for module in missing {
                missing_pairs.push((name.to_string(), module.to_string()));
            }
        }

        let mut partial = Vec::new();
        for module in &deps.standard_imports {
            let adopters: Vec<&str> = entities
                .iter()
                .filter(|(_, facts)| facts.imports_module(module))
                .map(|(name, _)| *name)
                .collect();
            if !adopters.is_empty() && adopters.len() < entities.len() {
                penalty += PARTIAL_ADOPTION_PENALTY;
                let holdouts: Vec<&str> = entities
                    .iter()
                    .map(|(name, _)| *name)
                    .filter(|name| !adopters.contains(name))
                    .collect();
                partial.push((module.clone(), adopters.len(), holdouts));
            }
        }

        let score = if entities.is_empty() {
            0.0
        } else {
            100.0 - penalty
        };
        let mut result = AuditResult::with_score(Dimension::DependencyConsistency, per_entity, score);

        for (name, module) in missing_pairs {
            result.push_issue(
                Severity::Medium,
                Some(&name),
                format!("{name} does not import {module}"),
            );
            result.push_fix(
                name,
                Severity::Medium,
                format!("Import {module}"),
                EFFORT_HOURS_PER_IMPORT,
            );
        }
        for (module, adopted, holdouts) in partial {
            result.push_issue(
                Severity::Low,
                None,
                format!(
                    "{module} adopted by {adopted} of {} agents (missing: {})",
                    entities.len(),
                    holdouts.join(", ")
                ),
            );
            for holdout in holdouts {
                result.push_fix(
                    holdout,
                    Severity::Medium,
                    format!("Adopt standard import {module}"),
                    EFFORT_HOURS_PER_IMPORT,
                );
            }
        }

        Ok(result)
    }
}
