//! Text (terminal) reporter with colors and formatting

use crate::models::{HealthReport, HealthStatus, ScanResult, Severity};
use anyhow::Result;
use console::style;
use std::fmt::Write;

/// Issues listed before the rest are summarized
const MAX_ISSUES: usize = 15;

fn status_style(status: HealthStatus, text: String) -> console::StyledObject<String> {
    match status {
        HealthStatus::Excellent => style(text).green().bold(),
        HealthStatus::Good => style(text).green(),
        HealthStatus::Fair => style(text).yellow(),
        HealthStatus::Poor => style(text).red(),
        HealthStatus::Critical => style(text).red().bold(),
    }
}

/// Severity tag
fn severity_tag(severity: Severity) -> console::StyledObject<&'static str> {
    match severity {
        Severity::Critical => style("[C]").red().bold(),
        Severity::High => style("[H]").red(),
        Severity::Medium => style("[M]").yellow(),
        Severity::Low => style("[L]").blue(),
        Severity::Info => style("[I]").dim(),
    }
}

fn format_score(score: f64) -> String {
    let text = format!("{score:>6.2}");
    if score >= 80.0 {
        style(text).green().to_string()
    } else if score >= 50.0 {
        style(text).yellow().to_string()
    } else {
        style(text).red().to_string()
    }
}

fn name_list(names: &[String]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

/// Render report as formatted terminal output
pub fn render(report: &HealthReport) -> Result<String> {
    let mut out = String::new();
    let s = &report.summary;

    writeln!(out, "\n{}", style("agentaudit health report").bold())?;
    writeln!(out, "{}", style("──────────────────────────────────────").dim())?;
    writeln!(
        out,
        "Score: {}  Status: {}",
        style(format!("{:.2}/100", report.composite_score)).bold(),
        status_style(report.status, report.status.to_string())
    )?;
    writeln!(
        out,
        "Agents: {} ({} analyzed, {} parse failures)  Tests: {}  Core modules: {}\n",
        s.total_agents, s.analyzed_agents, s.parse_failures, s.total_tests, s.total_core_modules
    )?;

    writeln!(out, "{}", style("DIMENSIONS").bold())?;
    for (dimension, summary) in &report.dimensions {
        let score = if summary.available {
            format_score(summary.score)
        } else {
            style("   n/a").dim().to_string()
        };
        writeln!(
            out,
            "  {:<24} {}  {}",
            dimension.label(),
            score,
            style(summary.status).dim()
        )?;
    }
    writeln!(out, "  {:<24} {}\n", "Code quality", format_score(s.code_quality))?;

    writeln!(out, "{}", style("TESTS").bold())?;
    writeln!(out, "  tested:   {}", name_list(&s.tested_agents))?;
    writeln!(out, "  untested: {}\n", name_list(&s.untested_agents))?;

    let changes = &report.changes;
    writeln!(out, "{}", style("CHANGES").bold())?;
    if changes.first_run {
        writeln!(out, "  first run, baseline recorded\n")?;
    } else if !changes.has_changes() {
        writeln!(out, "  no structural changes\n")?;
    } else {
        for (label, names) in [
            ("new agents", &changes.new_agents),
            ("removed agents", &changes.removed_agents),
            ("new tests", &changes.new_tests),
            ("removed tests", &changes.removed_tests),
            ("new core modules", &changes.new_core_systems),
            ("removed core modules", &changes.removed_core_systems),
        ] {
            if !names.is_empty() {
                writeln!(out, "  {label}: {}", names.join(", "))?;
            }
        }
        writeln!(out)?;
    }

    if !report.issues.is_empty() {
        writeln!(out, "{} ({} total)", style("ISSUES").bold(), report.issues.len())?;
        let mut issues: Vec<_> = report.issues.iter().collect();
        issues.sort_by(|a, b| b.severity.cmp(&a.severity));
        for issue in issues.iter().take(MAX_ISSUES) {
            let entity = issue
                .entity
                .as_deref()
                .map(|e| format!("{e}: "))
                .unwrap_or_default();
            writeln!(out, "  {} {}{}", severity_tag(issue.severity), entity, issue.message)?;
        }
        if issues.len() > MAX_ISSUES {
            writeln!(
                out,
                "  {}",
                style(format!("... and {} more", issues.len() - MAX_ISSUES)).dim()
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "{}", style("RECOMMENDATIONS").bold())?;
    for line in &report.recommendations {
        writeln!(out, "  {line}")?;
    }

    if !report.roadmap.is_empty() {
        let roadmap = &report.roadmap;
        writeln!(
            out,
            "\n{} (~{:.1}h)",
            style("ROADMAP").bold(),
            roadmap.estimated_effort_hours
        )?;
        for (severity, items) in [
            (Severity::Critical, &roadmap.critical),
            (Severity::High, &roadmap.high),
            (Severity::Medium, &roadmap.medium),
        ] {
            for item in items {
                writeln!(
                    out,
                    "  {} {}: {} ({:.2}h)",
                    severity_tag(severity),
                    item.target,
                    item.action,
                    item.effort_hours
                )?;
            }
        }
    }

    if !report.stage_errors.is_empty() {
        writeln!(out, "\n{}", style("STAGE ERRORS").red().bold())?;
        for e in &report.stage_errors {
            writeln!(out, "  {e}")?;
        }
    }

    Ok(out)
}

/// Render a structure scan without audits
pub fn render_scan(scan: &ScanResult) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "\n{} {}", style("Structure of").bold(), scan.root.display())?;

    writeln!(out, "\n{} ({})", style("AGENTS").bold(), scan.agents.len())?;
    for entity in scan.agents.values() {
        let main = entity
            .main_file_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "no main file".to_string());
        let marker = if !entity.exists {
            style("✗").red()
        } else if entity.has_companion_test {
            style("✓").green()
        } else {
            style("·").yellow()
        };
        write!(out, "  {marker} {:<24} {main}", entity.name)?;
        if entity.has_sub_components {
            write!(out, "  ({} sub-components)", entity.sub_component_count)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "\n{} ({})", style("TESTS").bold(), scan.tests.len())?;
    for name in scan.tests.keys() {
        writeln!(out, "  {name}")?;
    }
    writeln!(out, "\n{} ({})", style("CORE MODULES").bold(), scan.core_modules.len())?;
    for name in scan.core_modules.keys() {
        writeln!(out, "  {name}")?;
    }
    writeln!(out, "\n{} ({})", style("DOCUMENTATION").bold(), scan.documentation.len())?;
    for path in &scan.documentation {
        writeln!(out, "  {}", path.display())?;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_text_render_sections() {
        let out = render(&test_report()).expect("render text");
        assert!(out.contains("72.50/100"));
        assert!(out.contains("RECOMMENDATIONS"));
        assert!(out.contains("untested: c"));
        assert!(out.contains("new agents: c"));
        assert!(out.contains("Add tests/test_c.py"));
    }

    #[test]
    fn test_text_first_run() {
        let mut report = test_report();
        report.changes = Default::default();
        report.changes.first_run = true;
        let out = render(&report).expect("render text");
        assert!(out.contains("first run"));
    }

    #[test]
    fn test_render_empty_scan() {
        let scan = ScanResult::empty("/project");
        let out = render_scan(&scan).expect("render scan");
        assert!(out.contains("AGENTS"));
        assert!(out.contains("(0)"));
    }
}
