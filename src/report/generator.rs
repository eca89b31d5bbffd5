//! Survey report generation.

use crate::models::{format_power, SurveyReport};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Render the report as plain text.
pub fn generate_text_report(report: &SurveyReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("Total {} miners on chain\n", report.total_miners));
    output.push('\n');
    output.push_str(&format!(
        "Venus QAP: {}\n",
        format_power(&report.venus_power)
    ));
    output.push_str(&format!(
        "Lotus QAP: {}\n",
        format_power(&report.lotus_power)
    ));
    output.push_str(&format!("Proportion of Venus: {}\n", report.venus_share));

    output
}

/// Render the report as pretty-printed JSON.
///
/// Power values appear both as exact integer strings and in human-scaled
/// units; an undefined share serializes as null.
pub fn generate_json_report(report: &SurveyReport) -> Result<String> {
    let doc = JsonReport {
        generated_at: Utc::now(),
        total_miners: report.total_miners,
        venus_qap: report.venus_power.to_string(),
        lotus_qap: report.lotus_power.to_string(),
        venus_qap_scaled: format_power(&report.venus_power),
        lotus_qap_scaled: format_power(&report.lotus_power),
        venus_percent: report.venus_share.as_percent(),
        duration_seconds: report.duration_seconds,
    };

    serde_json::to_string_pretty(&doc).context("serializing survey report")
}

#[derive(Debug, Serialize)]
struct JsonReport {
    generated_at: DateTime<Utc>,
    total_miners: usize,
    venus_qap: String,
    lotus_qap: String,
    venus_qap_scaled: String,
    lotus_qap_scaled: String,
    venus_percent: Option<f64>,
    duration_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Proportion, StoragePower};

    fn sample_report() -> SurveyReport {
        SurveyReport {
            total_miners: 3,
            venus_power: StoragePower::from(100),
            lotus_power: StoragePower::from(50),
            venus_share: Proportion::Percent(66.667),
            duration_seconds: 1.5,
        }
    }

    #[test]
    fn test_text_report_layout() {
        let text = generate_text_report(&sample_report());
        assert_eq!(
            text,
            "Total 3 miners on chain\n\
             \n\
             Venus QAP: 100 B\n\
             Lotus QAP: 50 B\n\
             Proportion of Venus: 66.667%\n"
        );
    }

    #[test]
    fn test_text_report_degenerate_share() {
        let mut report = sample_report();
        report.venus_power = StoragePower::from(0);
        report.lotus_power = StoragePower::from(0);
        report.venus_share = Proportion::NotApplicable;

        let text = generate_text_report(&report);
        assert!(text.contains("Proportion of Venus: n/a (no classified power)"));
    }

    #[test]
    fn test_json_report_fields() {
        let json = generate_json_report(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["total_miners"], 3);
        assert_eq!(value["venus_qap"], "100");
        assert_eq!(value["venus_qap_scaled"], "100 B");
        assert_eq!(value["venus_percent"], 66.667);
    }

    #[test]
    fn test_json_report_undefined_share_is_null() {
        let mut report = sample_report();
        report.venus_share = Proportion::NotApplicable;

        let json = generate_json_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["venus_percent"].is_null());
    }
}
