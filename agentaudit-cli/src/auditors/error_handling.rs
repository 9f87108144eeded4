//! Error handling auditor
//!
//! Per entity: `try × 0.4 + min(100, logging) × 0.35 + recovery × 0.25`,
//! each term a percentage of the entity's callables. The logging term counts
//! call sites, so several logging calls in one function can push it past 100.

use super::{AuditContext, Auditor};
use crate::models::{percentage, AuditResult, Callable, Dimension, EntityScore, Severity};
use anyhow::Result;
use std::collections::BTreeMap;

const TRY_WEIGHT: f64 = 0.4;
const LOGGING_WEIGHT: f64 = 0.35;
const RECOVERY_WEIGHT: f64 = 0.25;

const LOG_METHODS: &[&str] = &[
    "debug", "info", "warning", "warn", "error", "exception", "critical", "trace", "log",
];

pub struct ErrorHandlingAuditor;

impl Auditor for ErrorHandlingAuditor {
    fn dimension(&self) -> Dimension {
        Dimension::ErrorHandling
    }

    fn audit(&self, ctx: &AuditContext) -> Result<AuditResult> {
        let conventions = &ctx.config.error_handling;
        let thresholds = &ctx.config.scoring.thresholds;
        let mut per_entity = BTreeMap::new();
        let mut fixes = Vec::new();

        for (name, facts) in ctx.analyzed_entities() {
            let total = facts.callables.len();
            let with_try = facts.callables.iter().filter(|c| c.has_try).count();
            let logging_calls: usize = facts
                .callables
                .iter()
                .map(|c| {
                    c.calls
                        .iter()
                        .filter(|t| is_logging_call(t, &conventions.logging_receivers))
                        .count()
                })
                .sum();
            let with_recovery = facts
                .callables
                .iter()
                .filter(|c| has_recovery(c, &conventions.recovery_keywords))
                .count();

            let try_coverage = percentage(with_try, total);
            let logging_coverage = percentage(logging_calls, total).min(100.0);
            let recovery_coverage = percentage(with_recovery, total);

            let score = try_coverage * TRY_WEIGHT
                + logging_coverage * LOGGING_WEIGHT
                + recovery_coverage * RECOVERY_WEIGHT;

            let mut entity_score = EntityScore::new(score)
                .with_detail("try_coverage", try_coverage)
                .with_detail("logging_coverage", logging_coverage)
                .with_detail("recovery_coverage", recovery_coverage);
            if total > 0 && with_try < total {
                entity_score
                    .issues
                    .push(format!("{} of {total} functions lack error handling", total - with_try));
            }
            if total > 0 && logging_calls == 0 {
                entity_score.issues.push("no logging calls".to_string());
            }
            if total > 0 && with_recovery == 0 {
                entity_score.issues.push("no recovery patterns".to_string());
            }

            if score < thresholds.error_handling {
                let priority = if score < thresholds.critical {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let hours = if score < 50.0 { 2.0 } else { 1.0 };
                fixes.push((name.to_string(), priority, hours));
            }

            per_entity.insert(name.to_string(), entity_score);
        }

        let mut result = AuditResult::averaged(Dimension::ErrorHandling, per_entity);
        for (name, priority, hours) in fixes {
            result.push_fix(
                name,
                priority,
                "Add try/except with logging and a recovery path",
                hours,
            );
        }

        Ok(result)
    }
}

/// `logger.error`, `self.logger.info`, `tracing::warn!`, `error!`
pub fn is_logging_call(target: &str, receivers: &[String]) -> bool {
    if let Some(mac) = target.strip_suffix('!') {
        let (receiver, method) = match mac.rsplit_once("::") {
            Some((receiver, method)) => (receiver, method),
            None => ("", mac),
        };
        return LOG_METHODS.contains(&method)
            && (receiver.is_empty() || receivers.iter().any(|r| r == receiver));
    }

    match target.rsplit_once('.') {
        Some((receiver, method)) => {
            LOG_METHODS.contains(&method) && receivers.iter().any(|r| r == receiver)
        }
        None => false,
    }
}

/// The error path returns a fallback or calls a recovery routine
fn has_recovery(callable: &Callable, keywords: &[String]) -> bool {
    callable.handler_returns
        || callable.handler_calls.iter().any(|call| {
            let lowered = call.to_lowercase();
            keywords.iter().any(|k| lowered.contains(k.as_str()))
        })
}
