//! Markdown reporter for GitHub-flavored Markdown output
//!
//! Suited for pull request comments and checked-in health snapshots.

use crate::models::{HealthReport, HealthStatus, RoadmapItem, Severity};
use anyhow::Result;

/// Render report as GitHub-flavored Markdown
pub fn render(report: &HealthReport) -> Result<String> {
    let mut md = String::new();

    md.push_str(&render_header(report));
    md.push('\n');
    md.push_str(&render_dimensions(report));
    md.push('\n');
    md.push_str(&render_entities(report));
    md.push('\n');
    md.push_str(&render_recommendations(report));
    md.push('\n');
    md.push_str(&render_roadmap(report));

    if !report.stage_errors.is_empty() {
        md.push_str("\n## Stage Errors\n\n");
        for e in &report.stage_errors {
            md.push_str(&format!("- `{e}`\n"));
        }
    }

    Ok(md)
}

fn render_header(report: &HealthReport) -> String {
    let emoji = match report.status {
        HealthStatus::Excellent => "🏆",
        HealthStatus::Good => "⭐",
        HealthStatus::Fair => "⚠️",
        HealthStatus::Poor => "❌",
        HealthStatus::Critical => "💀",
    };
    let s = &report.summary;

    format!(
        r#"# {} Agent Health Report

**Status: {}** | **Score: {:.2}/100**

Generated: {} | Run: `{}`

| Agents | Analyzed | Parse failures | Tests | Core modules |
|-------:|---------:|---------------:|------:|-------------:|
| {} | {} | {} | {} | {} |
"#,
        emoji,
        report.status,
        report.composite_score,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.run_id,
        s.total_agents,
        s.analyzed_agents,
        s.parse_failures,
        s.total_tests,
        s.total_core_modules
    )
}

fn render_dimensions(report: &HealthReport) -> String {
    let mut md = String::from("## Dimensions\n\n| Dimension | Score | Status | Issues |\n|-----------|------:|--------|-------:|\n");
    for (dimension, summary) in &report.dimensions {
        let score = if summary.available {
            format!("{} {:.2}", score_indicator(summary.score), summary.score)
        } else {
            "n/a".to_string()
        };
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            dimension.label(),
            score,
            summary.status,
            summary.issue_count
        ));
    }
    md.push_str(&format!(
        "| Code quality | {} {:.2} | | |\n",
        score_indicator(report.summary.code_quality),
        report.summary.code_quality
    ));
    md
}

fn render_entities(report: &HealthReport) -> String {
    if report.entities.is_empty() {
        return "## Agents\n\nNo agents found.\n".to_string();
    }
    let mut md = String::from(
        "## Agents\n\n| Agent | Parsed | Type hints | Docstrings | Complexity |\n|-------|:------:|-----------:|-----------:|-----------:|\n",
    );
    for e in &report.entities {
        md.push_str(&format!(
            "| {} | {} | {:.1}% | {:.1}% | {:.1} |\n",
            e.name,
            if e.parsed { "✓" } else { "✗" },
            e.type_hint_coverage,
            e.docstring_coverage,
            e.complexity_estimate
        ));
    }
    md
}

fn render_recommendations(report: &HealthReport) -> String {
    let mut md = String::from("## Recommendations\n\n");
    for line in &report.recommendations {
        md.push_str(&format!("- {line}\n"));
    }
    md
}

fn render_roadmap(report: &HealthReport) -> String {
    let roadmap = &report.roadmap;
    if roadmap.is_empty() {
        return "## Roadmap\n\nNothing scheduled.\n".to_string();
    }
    let mut md = format!(
        "## Roadmap\n\nEstimated effort: **{:.1}h**\n",
        roadmap.estimated_effort_hours
    );
    for (severity, items) in [
        (Severity::Critical, &roadmap.critical),
        (Severity::High, &roadmap.high),
        (Severity::Medium, &roadmap.medium),
    ] {
        if items.is_empty() {
            continue;
        }
        md.push_str(&format!("\n### {} {}\n\n", severity_emoji(severity), capitalize(&severity.to_string())));
        for item in items {
            md.push_str(&render_item(item));
        }
    }
    md
}

fn render_item(item: &RoadmapItem) -> String {
    format!(
        "- [ ] **{}** ({}): {} _{:.2}h_\n",
        item.target,
        item.dimension.label(),
        item.action,
        item.effort_hours
    )
}

fn score_indicator(score: f64) -> &'static str {
    if score >= 80.0 {
        "🟢"
    } else if score >= 50.0 {
        "🟡"
    } else {
        "🔴"
    }
}

fn severity_emoji(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🔴",
        Severity::High => "🟠",
        Severity::Medium => "🟡",
        Severity::Low => "🔵",
        Severity::Info => "⚪",
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_markdown_render_has_header() {
        let md = render(&test_report()).expect("render markdown");
        assert!(md.starts_with("# ⭐ Agent Health Report"));
        assert!(md.contains("**Score: 72.50/100**"));
    }

    #[test]
    fn test_markdown_render_has_roadmap() {
        let md = render(&test_report()).expect("render markdown");
        assert!(md.contains("### 🟠 High"));
        assert!(md.contains("- [ ] **c** (Test coverage): Add tests/test_c.py _2.00h_"));
    }

    #[test]
    fn test_markdown_empty_roadmap() {
        let mut report = test_report();
        report.roadmap = Default::default();
        report.entities.clear();
        let md = render(&report).expect("render markdown");
        assert!(md.contains("Nothing scheduled."));
        assert!(md.contains("No agents found."));
    }
}
