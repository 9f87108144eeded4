//! Contract compliance auditor

use super::{find_main_type, pascal_case, AuditContext, Auditor};
use crate::models::{AuditResult, Dimension, EntityScore, Severity};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

const MAIN_TYPE_POINTS: f64 = 40.0;
const ENTRY_METHOD_POINTS: f64 = 40.0;
const RETURN_TYPE_BONUS: f64 = 20.0;
const DOCSTRING_POINTS: f64 = 20.0;

pub struct ContractAuditor;

impl Auditor for ContractAuditor {
    fn dimension(&self) -> Dimension {
        Dimension::Contract
    }

    fn audit(&self, ctx: &AuditContext) -> Result<AuditResult> {
        let contract = &ctx.config.contract;
        let entry = contract.entry_method.as_str();

        let mut per_entity = BTreeMap::new();
        let mut fixes = Vec::new();
        let mut return_types: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (name, facts) in ctx.analyzed_entities() {
            let mut score = 0.0;
            let mut issues = Vec::new();
            let main_type = find_main_type(name, facts, contract);

            match main_type {
                Some(_) => score += MAIN_TYPE_POINTS,
                None => {
                    issues.push("no identifiable main type".to_string());
                    fixes.push((
                        Severity::High,
                        name.to_string(),
                        format!("Define a main type named {}", pascal_case(name)),
                        1.0,
                    ));
                }
            }

            let entry_method = main_type
                .and_then(|t| facts.find_callable(Some(&t.name), entry))
                .or_else(|| facts.callables.iter().find(|c| c.name == entry));

            match entry_method {
                Some(method) => {
                    score += ENTRY_METHOD_POINTS;
                    match &method.return_type {
                        Some(return_type) => {
                            score += RETURN_TYPE_BONUS;
                            return_types
                                .entry(return_type.clone())
                                .or_default()
                                .push(name.to_string());
                        }
                        None => {
                            issues.push(format!("{entry}() has no return type"));
                            fixes.push((
                                Severity::Medium,
                                name.to_string(),
                                format!("Annotate the return type of {entry}()"),
                                0.25,
                            ));
                        }
                    }
                }
                None => {
                    issues.push(format!("no {entry}() entry method"));
                    fixes.push((
                        Severity::High,
                        name.to_string(),
                        format!("Implement {entry}()"),
                        1.0,
                    ));
                }
            }

            if let Some(decl) = main_type {
                if decl.has_docstring {
                    score += DOCSTRING_POINTS;
                } else {
                    issues.push(format!("{} has no docstring", decl.name));
                    fixes.push((
                        Severity::Medium,
                        name.to_string(),
                        format!("Document {}", decl.name),
                        0.25,
                    ));
                }
            }

            let mut entity_score = EntityScore::new(f64::min(score, 100.0));
            if let Some(decl) = main_type {
                entity_score = entity_score.with_detail("main_type", decl.name.as_str());
            }
            if let Some(return_type) = entry_method.and_then(|m| m.return_type.as_deref()) {
                entity_score = entity_score.with_detail("entry_return_type", return_type);
            }
            entity_score.issues = issues;
            per_entity.insert(name.to_string(), entity_score);
        }

        let mut result = AuditResult::averaged(Dimension::Contract, per_entity);

        if return_types.len() > 1 {
            let variants: BTreeSet<String> = return_types
                .iter()
                .map(|(ty, names)| format!("{ty} ({})", names.join(", ")))
                .collect();
            result.push_issue(
                Severity::Medium,
                None,
                format!(
                    "{entry}() return types diverge across agents: {}",
                    variants.into_iter().collect::<Vec<_>>().join("; ")
                ),
            );
        }
        for (priority, target, action, hours) in fixes {
            result.push_fix(target, priority, action, hours);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::AuditConfig;
    use crate::models::ModuleFacts;

    fn audit(names: &[&str], facts: BTreeMap<String, ModuleFacts>) -> AuditResult {
        let scan = scan_of(names.iter().map(|n| entity(n)).collect());
        let config = AuditConfig::default();
        let ctx = AuditContext::new(&scan, &facts, &config);
        ContractAuditor.audit(&ctx).expect("audit")
    }

    #[test]
    fn test_full_contract_scores_100() {
        let mut facts = BTreeMap::new();
        facts.insert(
            "planner".to_string(),
            facts_with(
                vec![agent_type("PlannerAgent", &["execute"], true)],
                vec![method("PlannerAgent", "execute", Some("Dict[str,Any]"))],
                &[],
            ),
        );

        let result = audit(&["planner"], facts);
        assert_eq!(result.per_entity["planner"].score, 100.0);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_partial_contract() {
        let mut facts = BTreeMap::new();
        // main type, entry without return type, no docstring
        facts.insert(
            "router".to_string(),
            facts_with(
                vec![agent_type("Router", &["execute"], false)],
                vec![method("Router", "execute", None)],
                &[],
            ),
        );
        // nothing identifiable
        facts.insert(
            "empty".to_string(),
            facts_with(
                vec![agent_type("A", &[], false), agent_type("B", &[], false)],
                vec![],
                &[],
            ),
        );

        let result = audit(&["empty", "router"], facts);
        assert_eq!(result.per_entity["router"].score, 80.0);
        assert_eq!(result.per_entity["empty"].score, 0.0);
        assert_eq!(result.aggregate_score, 40.0);
        assert!(result
            .prioritized_fixes
            .iter()
            .any(|f| f.target == "empty" && f.priority == Severity::High));
    }

    #[test]
    fn test_divergent_return_types_reported_once() {
        let mut facts = BTreeMap::new();
        facts.insert(
            "a".to_string(),
            facts_with(vec![agent_type("A", &["execute"], true)], vec![method("A", "execute", Some("dict"))], &[]),
        );
        facts.insert(
            "b".to_string(),
            facts_with(vec![agent_type("B", &["execute"], true)], vec![method("B", "execute", Some("str"))], &[]),
        );

        let result = audit(&["a", "b"], facts);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Severity::Medium);
        // Consistency is reported, not scored
        assert_eq!(result.aggregate_score, 100.0);
    }

    #[test]
    fn test_missing_facts_score_zero() {
        let result = audit(&["ghost"], BTreeMap::new());
        assert_eq!(result.per_entity["ghost"].score, 0.0);
    }
}
