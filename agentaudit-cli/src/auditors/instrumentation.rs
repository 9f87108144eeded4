//! Instrumentation auditors (error intelligence, retry)
//!
//! Both dimensions use the same three-bucket model:
//! - full: the facility is imported and used at one or more call sites
//! - partial: exactly one of the two
//! - none: neither
//!
//! Coverage is `full / total × 100`. Partial entities get a MEDIUM fix,
//! uninstrumented ones a HIGH fix.

use super::{AuditContext, Auditor};
use crate::config::{AuditConfig, InstrumentationMarkers};
use crate::models::{AuditResult, Dimension, EntityScore, ModuleFacts, Severity};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

const PARTIAL_FIX_HOURS: f64 = 0.5;
const MISSING_FIX_HOURS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentationLevel {
    Full,
    Partial,
    None,
}

impl InstrumentationLevel {
    fn score(self) -> f64 {
        match self {
            InstrumentationLevel::Full => 100.0,
            InstrumentationLevel::Partial => 50.0,
            InstrumentationLevel::None => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Facility {
    ErrorIntelligence,
    Retry,
}

pub struct InstrumentationAuditor {
    facility: Facility,
}

impl InstrumentationAuditor {
    pub fn error_intelligence() -> Self {
        Self {
            facility: Facility::ErrorIntelligence,
        }
    }

    pub fn retry() -> Self {
        Self {
            facility: Facility::Retry,
        }
    }

    fn markers<'c>(&self, config: &'c AuditConfig) -> &'c InstrumentationMarkers {
        match self.facility {
            Facility::ErrorIntelligence => &config.instrumentation.error_intelligence,
            Facility::Retry => &config.instrumentation.retry,
        }
    }

    fn facility_name(&self) -> &'static str {
        match self.facility {
            Facility::ErrorIntelligence => "error intelligence",
            Facility::Retry => "retry",
        }
    }
}

impl Auditor for InstrumentationAuditor {
    fn dimension(&self) -> Dimension {
        match self.facility {
            Facility::ErrorIntelligence => Dimension::ErrorIntelligence,
            Facility::Retry => Dimension::RetryInstrumentation,
        }
    }

    fn audit(&self, ctx: &AuditContext) -> Result<AuditResult> {
        let markers = self.markers(ctx.config);
        let facility = self.facility_name();
        let entities = ctx.analyzed_entities();

        let mut per_entity = BTreeMap::new();
        let mut full = 0;
        let mut partial = Vec::new();
        let mut missing = Vec::new();

        for (name, facts) in &entities {
            let imported = has_marker_import(facts, markers);
            let call_sites = count_call_sites(facts, markers);
            let level = classify(imported, call_sites);

            match level {
                InstrumentationLevel::Full => full += 1,
                InstrumentationLevel::Partial => partial.push((name.to_string(), imported)),
                InstrumentationLevel::None => missing.push(name.to_string()),
            }

            per_entity.insert(
                name.to_string(),
                EntityScore::new(level.score())
                    .with_detail("level", serde_json::to_value(level)?)
                    .with_detail("imported", imported)
                    .with_detail("call_sites", call_sites),
            );
        }

        let coverage = crate::models::percentage(full, entities.len());
        let mut result = AuditResult::with_score(self.dimension(), per_entity, coverage);

        if !partial.is_empty() {
            result.push_issue(
                Severity::Medium,
                None,
                format!("{} agents have partial {facility} instrumentation", partial.len()),
            );
        }
        if !missing.is_empty() {
            result.push_issue(
                Severity::High,
                None,
                format!("{} agents have no {facility} instrumentation", missing.len()),
            );
        }

        for (name, imported) in partial {
            let action = if imported {
                format!("Add {facility} call sites")
            } else {
                format!("Import the {facility} facility used by existing call sites")
            };
            result.push_fix(name, Severity::Medium, action, PARTIAL_FIX_HOURS);
        }
        for name in missing {
            result.push_fix(
                name,
                Severity::High,
                format!("Add {facility} instrumentation"),
                MISSING_FIX_HOURS,
            );
        }

        Ok(result)
    }
}

/// Bucket an entity from its import and call-site evidence
pub fn classify(imported: bool, call_sites: usize) -> InstrumentationLevel {
    match (imported, call_sites > 0) {
        (true, true) => InstrumentationLevel::Full,
        (false, false) => InstrumentationLevel::None,
        _ => InstrumentationLevel::Partial,
    }
}

fn has_marker_import(facts: &ModuleFacts, markers: &InstrumentationMarkers) -> bool {
    facts
        .imports
        .iter()
        .any(|i| markers.import_markers.iter().any(|m| i.contains(m.as_str())))
}

/// Call sites plus decorated callables and types
fn count_call_sites(facts: &ModuleFacts, markers: &InstrumentationMarkers) -> usize {
    let calls = facts
        .callables
        .iter()
        .flat_map(|c| c.calls.iter())
        .filter(|t| markers.call_markers.iter().any(|m| matches_marker(t, m)))
        .count();

    let decorators = facts
        .callables
        .iter()
        .flat_map(|c| c.decorators.iter())
        .chain(facts.types.iter().flat_map(|t| t.decorators.iter()))
        .filter(|d| markers.decorator_markers.iter().any(|m| matches_marker(d, m)))
        .count();

    calls + decorators
}

/// `retry`, `tenacity.retry` and `backoff::retry` all match `retry`
fn matches_marker(target: &str, marker: &str) -> bool {
    let target = target.trim_end_matches('!');
    target == marker
        || target
            .strip_suffix(marker)
            .is_some_and(|rest| rest.ends_with('.') || rest.ends_with("::"))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::models::Callable;

    fn with_calls(calls: &[&str], decorators: &[&str]) -> Callable {
        Callable {
            name: "execute".to_string(),
            calls: calls.iter().map(|c| c.to_string()).collect(),
            decorators: decorators.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_buckets() {
        assert_eq!(classify(true, 2), InstrumentationLevel::Full);
        assert_eq!(classify(true, 0), InstrumentationLevel::Partial);
        assert_eq!(classify(false, 1), InstrumentationLevel::Partial);
        assert_eq!(classify(false, 0), InstrumentationLevel::None);
    }

    #[test]
    fn test_matches_marker() {
        assert!(matches_marker("retry", "retry"));
        assert!(matches_marker("tenacity.retry", "retry"));
        assert!(matches_marker("backoff.on_exception", "backoff.on_exception"));
        assert!(matches_marker("self.tracker.record_error", "record_error"));
        assert!(!matches_marker("retry_count", "retry"));
        assert!(!matches_marker("self.no_retry", "retry"));
    }

    #[test]
    fn test_retry_coverage_three_buckets() {
        let scan = scan_of(vec![entity("full"), entity("half"), entity("none")]);
        let mut facts = BTreeMap::new();
        facts.insert(
            "full".to_string(),
            facts_with(vec![], vec![with_calls(&[], &["retry"])], &["tenacity.retry"]),
        );
        facts.insert(
            "half".to_string(),
            facts_with(vec![], vec![with_calls(&["fetch"], &[])], &["tenacity"]),
        );
        facts.insert("none".to_string(), facts_with(vec![], vec![], &["json"]));

        let config = AuditConfig::default();
        let result = InstrumentationAuditor::retry()
            .audit(&AuditContext::new(&scan, &facts, &config))
            .expect("audit");

        assert_eq!(result.dimension, Dimension::RetryInstrumentation);
        assert!((result.aggregate_score - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.per_entity["half"].detail["level"], "partial");

        let half_fix = result
            .prioritized_fixes
            .iter()
            .find(|f| f.target == "half")
            .expect("partial fix");
        assert_eq!(half_fix.priority, Severity::Medium);
        assert_eq!(half_fix.effort_hours, 0.5);

        let none_fix = result
            .prioritized_fixes
            .iter()
            .find(|f| f.target == "none")
            .expect("missing fix");
        assert_eq!(none_fix.priority, Severity::High);
        assert_eq!(none_fix.effort_hours, 1.0);
    }

    #[test]
    fn test_error_intelligence_uses_its_own_markers() {
        let scan = scan_of(vec![entity("a")]);
        let mut facts = BTreeMap::new();
        facts.insert(
            "a".to_string(),
            facts_with(
                vec![],
                vec![with_calls(&["self.error_tracker.record_error"], &[])],
                &["core.error_intelligence.ErrorTracker"],
            ),
        );

        let config = AuditConfig::default();
        let result = InstrumentationAuditor::error_intelligence()
            .audit(&AuditContext::new(&scan, &facts, &config))
            .expect("audit");
        assert_eq!(result.dimension, Dimension::ErrorIntelligence);
        assert_eq!(result.aggregate_score, 100.0);
        assert!(result.prioritized_fixes.is_empty());
    }
}
