//! JSON reporter
//!
//! Outputs the full HealthReport as pretty-printed JSON.

use crate::models::HealthReport;
use anyhow::Result;

/// Render report as JSON
pub fn render(report: &HealthReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_json_render_valid() {
        let report = test_report();
        let json_str = render(&report).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("parse JSON");
        assert_eq!(parsed["status"], "Good");
        assert_eq!(parsed["summary"]["untested_agents"][0], "c");
        assert_eq!(parsed["dimensions"]["test_coverage"]["score"], 75.0);
    }

    #[test]
    fn test_json_round_trip() {
        let report = test_report();
        let json_str = render(&report).expect("render JSON");
        let back: HealthReport = serde_json::from_str(&json_str).expect("deserialize report");
        assert_eq!(back.run_id, report.run_id);
        assert_eq!(back.roadmap.len(), 1);
    }
}
