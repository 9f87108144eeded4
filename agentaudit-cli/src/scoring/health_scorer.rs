//! Health scorer

use super::roadmap::{build_recommendations, build_roadmap};
use crate::config::{AuditConfig, ScoringWeights};
use crate::models::{
    round2, AuditResult, ChangeSet, Dimension, DimensionSummary, EntityHealth, HealthReport,
    HealthStatus, HealthSummary, Issue, ModuleFacts, ScanResult, Severity,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// The composite inputs, each in [0, 100]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompositeInputs {
    pub test_coverage: f64,
    pub error_intelligence: f64,
    pub error_handling: f64,
    pub integration: f64,
    pub contract: f64,
    pub dependency: f64,
    pub code_quality: f64,
}

impl CompositeInputs {
    /// Every input set to `value`
    pub fn uniform(value: f64) -> Self {
        Self {
            test_coverage: value,
            error_intelligence: value,
            error_handling: value,
            integration: value,
            contract: value,
            dependency: value,
            code_quality: value,
        }
    }
}

/// Weighted sum of the inputs, clamped to [0, 100]
pub fn composite_score(inputs: &CompositeInputs, weights: &ScoringWeights) -> f64 {
    let score = inputs.test_coverage * weights.test_coverage
        + inputs.error_intelligence * weights.error_intelligence
        + inputs.error_handling * weights.error_handling
        + inputs.integration * weights.integration
        + inputs.contract * weights.contract
        + inputs.dependency * weights.dependency
        + inputs.code_quality * weights.code_quality;
    score.clamp(0.0, 100.0)
}

/// Mean of `(type_hint + docstring) / 2` over parsed entities, 0 when none
pub fn code_quality(entities: &[EntityHealth]) -> f64 {
    let parsed: Vec<&EntityHealth> = entities.iter().filter(|e| e.parsed).collect();
    if parsed.is_empty() {
        return 0.0;
    }
    parsed
        .iter()
        .map(|e| (e.type_hint_coverage + e.docstring_coverage) / 2.0)
        .sum::<f64>()
        / parsed.len() as f64
}

/// Everything a run produced before reporting
pub struct ReportInput<'a> {
    pub root: PathBuf,
    pub scan: &'a ScanResult,
    pub facts: &'a BTreeMap<String, ModuleFacts>,
    pub results: &'a BTreeMap<Dimension, AuditResult>,
    pub changes: ChangeSet,
    pub stage_errors: Vec<String>,
}

pub struct HealthScorer<'a> {
    config: &'a AuditConfig,
}

impl<'a> HealthScorer<'a> {
    pub fn new(config: &'a AuditConfig) -> Self {
        Self { config }
    }

    /// Build the immutable report for one run
    pub fn build_report(&self, input: ReportInput) -> HealthReport {
        let weights = &self.config.scoring.weights;
        let thresholds = &self.config.scoring.thresholds;

        // Fill dimensions that produced nothing
        let mut results = input.results.clone();
        for dimension in Dimension::ALL {
            results
                .entry(dimension)
                .or_insert_with(|| AuditResult::unavailable(dimension, "no result produced"));
        }
        let score_of = |d: Dimension| {
            results
                .get(&d)
                .filter(|r| r.available)
                .map(|r| r.aggregate_score)
                .unwrap_or(0.0)
        };

        let entities = entity_health(input.scan, input.facts);
        let quality = code_quality(&entities);

        let inputs = CompositeInputs {
            test_coverage: score_of(Dimension::TestCoverage),
            error_intelligence: score_of(Dimension::ErrorIntelligence),
            error_handling: score_of(Dimension::ErrorHandling),
            integration: score_of(Dimension::Integration),
            contract: score_of(Dimension::Contract),
            dependency: score_of(Dimension::DependencyConsistency),
            code_quality: quality,
        };
        let composite = round2(composite_score(&inputs, weights));
        let status = HealthStatus::from_score(composite);

        debug!(
            "Composite inputs: tests={:.1} ei={:.1} eh={:.1} integration={:.1} contract={:.1} deps={:.1} quality={:.1}",
            inputs.test_coverage,
            inputs.error_intelligence,
            inputs.error_handling,
            inputs.integration,
            inputs.contract,
            inputs.dependency,
            inputs.code_quality
        );
        info!("Composite health score: {:.2} ({})", composite, status);

        let summary = self.summary(input.scan, &entities, &score_of, quality);

        let dimensions = results
            .iter()
            .map(|(dimension, result)| {
                (
                    *dimension,
                    DimensionSummary {
                        score: round2(score_of(*dimension)),
                        status: result.status,
                        available: result.available,
                        issue_count: result.issues.len(),
                    },
                )
            })
            .collect();

        let mut issues: Vec<Issue> = results.values().flat_map(|r| r.issues.iter().cloned()).collect();
        for entity in entities.iter().filter(|e| !e.parsed) {
            for message in &entity.issues {
                issues.push(Issue::new(Severity::Medium, message.clone()).for_entity(&entity.name));
            }
        }

        let recommendations = build_recommendations(&results, quality, thresholds, weights);
        let roadmap = build_roadmap(&results, thresholds);

        HealthReport {
            run_id: uuid::Uuid::new_v4(),
            generated_at: Utc::now(),
            project_root: input.root,
            composite_score: composite,
            status,
            summary,
            dimensions,
            entities,
            issues,
            changes: input.changes,
            recommendations,
            roadmap,
            stage_errors: input.stage_errors,
        }
    }

    fn summary(
        &self,
        scan: &ScanResult,
        entities: &[EntityHealth],
        score_of: &dyn Fn(Dimension) -> f64,
        quality: f64,
    ) -> HealthSummary {
        let (tested, untested): (Vec<_>, Vec<_>) =
            scan.existing_agents().partition(|e| e.has_companion_test);

        HealthSummary {
            total_agents: scan.existing_agents().count(),
            analyzed_agents: entities.iter().filter(|e| e.parsed).count(),
            parse_failures: entities.iter().filter(|e| !e.parsed).count(),
            total_tests: scan.tests.len(),
            total_core_modules: scan.core_modules.len(),
            tested_agents: tested.iter().map(|e| e.name.clone()).collect(),
            untested_agents: untested.iter().map(|e| e.name.clone()).collect(),
            test_coverage: round2(score_of(Dimension::TestCoverage)),
            error_intelligence_coverage: round2(score_of(Dimension::ErrorIntelligence)),
            retry_coverage: round2(score_of(Dimension::RetryInstrumentation)),
            error_handling_score: round2(score_of(Dimension::ErrorHandling)),
            integration_health: round2(score_of(Dimension::Integration)),
            contract_compliance: round2(score_of(Dimension::Contract)),
            dependency_consistency: round2(score_of(Dimension::DependencyConsistency)),
            architecture_score: round2(score_of(Dimension::Architecture)),
            code_quality: round2(quality),
        }
    }
}

/// One entry per existing entity; entities without facts count as unparsed
fn entity_health(scan: &ScanResult, facts: &BTreeMap<String, ModuleFacts>) -> Vec<EntityHealth> {
    scan.existing_agents()
        .map(|entity| {
            let missing;
            let facts = match facts.get(&entity.name) {
                Some(facts) => facts,
                None => {
                    missing = ModuleFacts::parse_failed("module was not analyzed");
                    &missing
                }
            };
            EntityHealth {
                name: entity.name.clone(),
                parsed: facts.is_parsed(),
                type_hint_coverage: round2(facts.type_hint_coverage),
                docstring_coverage: round2(facts.docstring_coverage),
                complexity_estimate: round2(facts.complexity_estimate),
                issues: facts.detected_issues.clone(),
            }
        })
        .collect()
}
