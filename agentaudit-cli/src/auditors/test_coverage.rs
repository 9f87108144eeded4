//! Test coverage auditor
//!
//! `tested / total × 100` over existing entities, where tested means a
//! companion `test_<name>` file was found.

use super::{AuditContext, Auditor};
use crate::models::{percentage, AuditResult, Dimension, EntityScore, Severity};
use anyhow::Result;
use std::collections::BTreeMap;

const TEST_FIX_HOURS: f64 = 2.0;

pub struct TestCoverageAuditor;

impl Auditor for TestCoverageAuditor {
    fn dimension(&self) -> Dimension {
        Dimension::TestCoverage
    }

    fn audit(&self, ctx: &AuditContext) -> Result<AuditResult> {
        let extension = ctx.config.layout.language.extension();
        let mut per_entity = BTreeMap::new();
        let mut untested = Vec::new();

        for entity in ctx.scan.existing_agents() {
            let score = if entity.has_companion_test {
                EntityScore::new(100.0)
            } else {
                untested.push(entity.name.clone());
                let mut score = EntityScore::new(0.0);
                score.issues.push(format!("no test_{}.{extension}", entity.name));
                score
            };
            per_entity.insert(
                entity.name.clone(),
                score.with_detail("tested", entity.has_companion_test),
            );
        }

        let total = per_entity.len();
        let coverage = percentage(total - untested.len(), total);
        let mut result = AuditResult::with_score(Dimension::TestCoverage, per_entity, coverage);

        if !untested.is_empty() {
            result.push_issue(
                Severity::Medium,
                None,
                format!("{} agents have no tests: {}", untested.len(), untested.join(", ")),
            );
        }
        for name in untested {
            let action = format!(
                "Add {}/test_{name}.{extension}",
                ctx.config.layout.tests_dir.display()
            );
            result.push_fix(name, Severity::High, action, TEST_FIX_HOURS);
        }

        Ok(result)
    }
}
