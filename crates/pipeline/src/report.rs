//! Report assembly: merges collaborator outputs and parcel metadata into the
//! canonical [`AnalysisResult`].
//!
//! Everything here is pure. Given the same inputs and the same `now`,
//! [`assemble`] produces byte-identical output.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::parcel::LandParcel;
use crate::types::{format_krw, AssessmentScores, Timestamp};

/// Number of policies listed in the Markdown report.
pub const REPORT_POLICY_LIMIT: usize = 5;

/// Longest policy summary, in characters, before it is cut in the report.
const SUMMARY_MAX_CHARS: usize = 300;

/// One candidate support policy returned by the policy collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,
}

impl PolicyRecord {
    /// A record with only the mandatory fields set.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            organization: None,
            application_period: None,
            details_url: None,
        }
    }
}

/// The composite outcome of a completed analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub knowledge_analysis: String,
    pub policies: Vec<PolicyRecord>,
    pub markdown_report: String,
    /// `YYYY-MM-DD HH:MM UTC`.
    pub analysis_date: String,
    /// Calendar quarter of the analysis, e.g. `2026 Q4`.
    pub analysis_quarter: String,
    /// The parcel's unit price with thousands separators.
    pub formatted_unit_price: String,
    pub scores: AssessmentScores,
}

/// Builds the [`AnalysisResult`] for one parcel.
///
/// `policies` are kept in full and in the order given; only the first
/// [`REPORT_POLICY_LIMIT`] appear in the Markdown report.
pub fn assemble(
    knowledge_analysis: impl Into<String>,
    policies: Vec<PolicyRecord>,
    parcel: &LandParcel,
    now: Timestamp,
) -> AnalysisResult {
    let knowledge_analysis = knowledge_analysis.into();
    let formatted_unit_price = format_krw(parcel.unit_price);
    let analysis_date = now.report_date();

    let markdown_report = render_markdown(
        parcel,
        &knowledge_analysis,
        &policies,
        &formatted_unit_price,
        &analysis_date,
    );

    AnalysisResult {
        knowledge_analysis,
        policies,
        markdown_report,
        analysis_date,
        analysis_quarter: now.quarter_label(),
        formatted_unit_price,
        scores: parcel.scores,
    }
}

// ---------------------------------------------------------------------------
// Markdown rendering
// ---------------------------------------------------------------------------

fn render_markdown(
    parcel: &LandParcel,
    knowledge_analysis: &str,
    policies: &[PolicyRecord],
    price: &str,
    date: &str,
) -> String {
    let mut md = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(md, "# Land Analysis Report\n");
    let _ = writeln!(md, "**Date**: {date}\n");

    let _ = writeln!(md, "## 1. Basic Information\n");
    let _ = writeln!(md, "| Item | Value |");
    let _ = writeln!(md, "|------|-------|");
    let rows = [
        ("Address", parcel.address.as_str()),
        ("Land category", parcel.land_category.as_str()),
        ("Zoning", parcel.zoning.as_str()),
        ("Zoning district", parcel.zoning_district.as_str()),
        ("Land use", parcel.land_use.as_str()),
        ("Terrain", parcel.terrain.as_str()),
        ("Shape", parcel.shape.as_str()),
        ("Road frontage", parcel.road_frontage.as_str()),
        ("Official unit price", price),
    ];
    for (label, value) in rows {
        let _ = writeln!(md, "| {label} | {} |", table_cell(value));
    }
    let scores = &parcel.scores;
    let _ = writeln!(
        md,
        "| Scores (location / infrastructure / stability) | {} / {} / {} |\n",
        scores.location, scores.infrastructure, scores.stability
    );

    let _ = writeln!(md, "## 2. Expert Land Analysis\n");
    let _ = writeln!(md, "{}\n", knowledge_analysis.trim());

    let _ = writeln!(md, "## 3. Related Support Policies\n");
    if policies.is_empty() {
        let _ = writeln!(
            md,
            "No support policies related to this region were found.\n"
        );
    }
    for (i, policy) in policies.iter().take(REPORT_POLICY_LIMIT).enumerate() {
        render_policy(&mut md, i + 1, policy);
    }

    let _ = writeln!(md, "## 4. Overall Opinion and Recommendations\n");
    let _ = writeln!(
        md,
        "Taken together, the analysis above shows the following characteristics:\n"
    );
    let _ = writeln!(md, "- **Location**: situated at {}", parcel.address);
    let _ = writeln!(md, "- **Zoning**: classified as {}", parcel.zoning);
    let _ = writeln!(md, "- **Current use**: {}", parcel.land_use);
    let _ = writeln!(md, "- **Valuation basis**: official unit price of {price}\n");

    let _ = writeln!(md, "### Recommendations\n");
    let _ = writeln!(md, "1. Review the related support policies for eligibility");
    let _ = writeln!(md, "2. Plan development to fit the zoning classification");
    let _ = writeln!(md, "3. Monitor regional development trends");
    let _ = writeln!(md, "4. Consult a specialist before committing to an investment\n");

    let _ = writeln!(md, "---");
    let _ = writeln!(
        md,
        "*This report is generated by automated analysis. Investment decisions \
         require additional review by a qualified professional.*"
    );

    md
}

fn render_policy(md: &mut String, number: usize, policy: &PolicyRecord) {
    let _ = writeln!(md, "#### {number}. {}\n", policy.name.trim());
    if let Some(org) = &policy.organization {
        let _ = writeln!(md, "- **Organization**: {org}");
    }
    if let Some(period) = &policy.application_period {
        let _ = writeln!(md, "- **Application period**: {period}");
    }
    let summary = truncate_chars(policy.description.trim(), SUMMARY_MAX_CHARS);
    if !summary.is_empty() {
        let _ = writeln!(md, "- **Summary**: {summary}");
    }
    if let Some(url) = &policy.details_url {
        let _ = writeln!(md, "- **Details**: <{url}>");
    }
    md.push('\n');
}

/// Keeps table rows intact when a value contains a pipe or a line break.
fn table_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let cut: String = single_line.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parcel::ParcelSubmission;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn daegu() -> LandParcel {
        ParcelSubmission {
            address: Some("Dongin-dong 1-ga 2-1, Jung-gu, Daegu".into()),
            zoning: Some("central commercial".into()),
            land_use: Some("business".into()),
            terrain: Some("flat".into()),
            shape: Some("vertical rectangle".into()),
            road_frontage: Some("wide road corner".into()),
            unit_price: Some(3_735_000),
            ..ParcelSubmission::default()
        }
        .validate()
        .unwrap()
    }

    fn at() -> Timestamp {
        Timestamp::from_utc(Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap())
    }

    fn policies(n: usize) -> Vec<PolicyRecord> {
        (1..=n)
            .map(|i| PolicyRecord::new(format!("Policy {i}"), format!("Summary {i}")))
            .collect()
    }

    #[test]
    fn result_carries_metadata() {
        let result = assemble("Prime commercial lot.", policies(2), &daegu(), at());
        assert_eq!(result.analysis_date, "2026-10-16 09:30 UTC");
        assert_eq!(result.analysis_quarter, "2026 Q4");
        assert_eq!(result.formatted_unit_price, "3,735,000 KRW");
        assert_eq!(result.policies.len(), 2);
        assert_eq!(result.scores, AssessmentScores::default());
    }

    #[test]
    fn markdown_contains_every_section() {
        let result = assemble("Prime commercial lot.", policies(1), &daegu(), at());
        let md = &result.markdown_report;
        for heading in [
            "## 1. Basic Information",
            "## 2. Expert Land Analysis",
            "## 3. Related Support Policies",
            "## 4. Overall Opinion and Recommendations",
        ] {
            assert!(md.contains(heading), "missing {heading}");
        }
        assert!(md.contains("Prime commercial lot."));
        assert!(md.contains("| Official unit price | 3,735,000 KRW |"));
        assert!(md.contains("#### 1. Policy 1"));
    }

    #[test]
    fn only_top_five_policies_are_rendered() {
        let result = assemble("text", policies(8), &daegu(), at());
        assert_eq!(result.policies.len(), 8);
        assert!(result.markdown_report.contains("#### 5. Policy 5"));
        assert!(!result.markdown_report.contains("Policy 6"));
    }

    #[test]
    fn empty_policy_list_says_so() {
        let result = assemble("text", Vec::new(), &daegu(), at());
        assert!(result
            .markdown_report
            .contains("No support policies related to this region were found."));
    }

    #[test]
    fn assembly_is_deterministic() {
        let a = assemble("text", policies(3), &daegu(), at());
        let b = assemble("text", policies(3), &daegu(), at());
        assert_eq!(a, b);
    }

    #[test]
    fn pipes_in_values_do_not_break_the_table() {
        let mut parcel = daegu();
        parcel.shape = "odd | shape".into();
        let result = assemble("text", Vec::new(), &parcel, at());
        assert!(result.markdown_report.contains("| Shape | odd \\| shape |"));
    }

    #[test]
    fn long_summaries_are_cut() {
        let long = "word ".repeat(200);
        assert!(truncate_chars(&long, 20).ends_with("..."));
        assert_eq!(truncate_chars("short\n text", 20), "short text");
    }
}
