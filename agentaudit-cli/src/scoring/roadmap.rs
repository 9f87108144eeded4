//! Recommendations and the remediation roadmap

use crate::config::{ScoringThresholds, ScoringWeights};
use crate::models::{
    round2, AuditResult, Dimension, PrioritizedFix, Roadmap, RoadmapItem, Severity,
};
use std::collections::BTreeMap;

pub const ALL_HEALTHY: &str = "All systems healthy - no critical issues";

/// Gap below a threshold that escalates a recommendation from medium to high
const HIGH_GAP: f64 = 20.0;

/// Names listed inline before the recommendation is truncated
const MAX_NAMED: usize = 5;

const INVESTIGATE_HOURS: f64 = 1.0;

pub fn dimension_threshold(dimension: Dimension, thresholds: &ScoringThresholds) -> f64 {
    match dimension {
        Dimension::Architecture => thresholds.architecture,
        Dimension::Contract => thresholds.contract,
        Dimension::DependencyConsistency => thresholds.dependency,
        Dimension::ErrorHandling => thresholds.error_handling,
        Dimension::ErrorIntelligence => thresholds.error_intelligence,
        Dimension::RetryInstrumentation => thresholds.retry,
        Dimension::Integration => thresholds.integration,
        Dimension::TestCoverage => thresholds.test_coverage,
    }
}

fn dimension_weight(dimension: Dimension, weights: &ScoringWeights) -> f64 {
    match dimension {
        Dimension::Contract => weights.contract,
        Dimension::DependencyConsistency => weights.dependency,
        Dimension::ErrorHandling => weights.error_handling,
        Dimension::ErrorIntelligence => weights.error_intelligence,
        Dimension::Integration => weights.integration,
        Dimension::TestCoverage => weights.test_coverage,
        Dimension::Architecture | Dimension::RetryInstrumentation => 0.0,
    }
}

fn severity_for(score: f64, threshold: f64, critical: f64) -> Severity {
    if score < critical {
        Severity::Critical
    } else if threshold - score > HIGH_GAP {
        Severity::High
    } else {
        Severity::Medium
    }
}

fn name_list(names: &[&str]) -> String {
    if names.len() <= MAX_NAMED {
        names.join(", ")
    } else {
        format!(
            "{} and {} more",
            names[..MAX_NAMED].join(", "),
            names.len() - MAX_NAMED
        )
    }
}

/// One human-readable line per dimension below its threshold
///
/// Lines are ordered by severity, then by composite weight. An unavailable
/// dimension scores 0 and always gets a critical line.
pub fn build_recommendations(
    results: &BTreeMap<Dimension, AuditResult>,
    code_quality: f64,
    thresholds: &ScoringThresholds,
    weights: &ScoringWeights,
) -> Vec<String> {
    let mut lines: Vec<(Severity, f64, String)> = Vec::new();

    for result in results.values() {
        let weight = dimension_weight(result.dimension, weights);
        if !result.available {
            lines.push((
                Severity::Critical,
                weight,
                format!(
                    "[CRITICAL] {} unavailable ({}), scored 0%",
                    result.dimension.label(),
                    result.unavailable_reason().unwrap_or("no result")
                ),
            ));
            continue;
        }

        let threshold = dimension_threshold(result.dimension, thresholds);
        let score = result.aggregate_score;
        if score >= threshold {
            continue;
        }
        let severity = severity_for(score, threshold, thresholds.critical);
        let head = format!(
            "[{}] {} at {:.2}% (target {:.0}%)",
            severity.to_string().to_uppercase(),
            result.dimension.label(),
            round2(score),
            threshold
        );

        // Project-wide scores can sit below target with every entity above it
        let below = result.entities_below(threshold);
        let line = if !below.is_empty() {
            format!("{head}: {} agents below target: {}", below.len(), name_list(&below))
        } else {
            let flagged = result.entities_flagged();
            if flagged.is_empty() {
                head
            } else {
                format!("{head}: {} agents affected: {}", flagged.len(), name_list(&flagged))
            }
        };
        lines.push((severity, weight, line));
    }

    if code_quality < thresholds.code_quality {
        let severity = severity_for(code_quality, thresholds.code_quality, thresholds.critical);
        lines.push((
            severity,
            weights.code_quality,
            format!(
                "[{}] Code quality at {:.2}% (target {:.0}%): add type hints and docstrings",
                severity.to_string().to_uppercase(),
                round2(code_quality),
                thresholds.code_quality
            ),
        ));
    }

    if lines.is_empty() {
        return vec![ALL_HEALTHY.to_string()];
    }

    lines.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.total_cmp(&a.1)));
    lines.into_iter().map(|(_, _, line)| line).collect()
}

/// Bucket the fixes of dimensions below threshold by priority
///
/// Fixes in a dimension below the critical threshold escalate one level.
pub fn build_roadmap(results: &BTreeMap<Dimension, AuditResult>, thresholds: &ScoringThresholds) -> Roadmap {
    let mut roadmap = Roadmap::default();

    for result in results.values() {
        if !result.available {
            roadmap.high.push(RoadmapItem {
                dimension: result.dimension,
                target: result.dimension.label().to_string(),
                action: format!(
                    "Investigate why the {} auditor failed",
                    result.dimension.label().to_lowercase()
                ),
                effort_hours: INVESTIGATE_HOURS,
            });
            continue;
        }
        let threshold = dimension_threshold(result.dimension, thresholds);
        if result.aggregate_score >= threshold {
            continue;
        }
        let escalate = result.aggregate_score < thresholds.critical;
        for fix in &result.prioritized_fixes {
            place(&mut roadmap, result.dimension, fix, escalate);
        }
    }

    roadmap.estimated_effort_hours = round2(
        roadmap
            .critical
            .iter()
            .chain(&roadmap.high)
            .chain(&roadmap.medium)
            .map(|item| item.effort_hours)
            .sum(),
    );
    roadmap
}

fn place(roadmap: &mut Roadmap, dimension: Dimension, fix: &PrioritizedFix, escalate: bool) {
    let item = RoadmapItem {
        dimension,
        target: fix.target.clone(),
        action: fix.action.clone(),
        effort_hours: fix.effort_hours,
    };
    let priority = match (fix.priority, escalate) {
        (Severity::Critical, _) | (Severity::High, true) => Severity::Critical,
        (Severity::High, false) | (Severity::Medium, true) => Severity::High,
        _ => Severity::Medium,
    };
    match priority {
        Severity::Critical => roadmap.critical.push(item),
        Severity::High => roadmap.high.push(item),
        _ => roadmap.medium.push(item),
    }
}
