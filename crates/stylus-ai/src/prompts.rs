//! Prompt text and per-task sampling settings for the three oracle calls.

use serde::Serialize;
use serde_json::json;
use stylus_core::dimension::DIMENSIONS;
use stylus_core::model::{BatchSummary, IndividualReport, Rule};

/// Document text beyond this many characters is cut before prompting.
pub const MAX_DOCUMENT_CHARS: usize = 60_000;

/// The three oracle operations, each with its own sampling profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    IndividualAnalysis,
    BatchSummary,
    GlobalIntegration,
}

impl Task {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IndividualAnalysis => "individual_analysis",
            Self::BatchSummary => "batch_summary",
            Self::GlobalIntegration => "global_integration",
        }
    }

    pub fn temperature(self) -> f32 {
        match self {
            Self::IndividualAnalysis => 0.4,
            Self::BatchSummary => 0.3,
            Self::GlobalIntegration => 0.2,
        }
    }

    /// Token budget for the task, never above the configured ceiling.
    pub fn max_tokens(self, ceiling: u32) -> u32 {
        let budget = match self {
            Self::IndividualAnalysis => 15_000,
            Self::BatchSummary => 20_000,
            Self::GlobalIntegration => 25_000,
        };
        budget.min(ceiling)
    }

    pub fn system_message(self) -> &'static str {
        match self {
            Self::IndividualAnalysis => {
                "You are a detailed academic writing analyst. \
                 Analyze writing patterns creatively and comprehensively. \
                 Respond with valid JSON only."
            }
            Self::BatchSummary => {
                "You are a pattern recognition expert. \
                 Identify common writing patterns across multiple papers. \
                 Respond with valid JSON only."
            }
            Self::GlobalIntegration => {
                "You are a style guide generator. \
                 Create comprehensive, well-structured style guides in valid JSON \
                 format only. No markdown, no code blocks, no explanations."
            }
        }
    }
}

fn dimension_list() -> String {
    DIMENSIONS.join(", ")
}

/// Prompt asking for the rules one document follows.
pub fn individual_analysis(document_id: &str, text: &str) -> String {
    let text: String = text.chars().take(MAX_DOCUMENT_CHARS).collect();
    format!(
        "Analyze the writing style of the academic paper below across these dimensions: {dims}.\n\n\
         For each distinctive, reusable pattern, emit one rule. Rates are fractions in [0, 1].\n\n\
         Output a single JSON object:\n\
         {{\"rules\": [{{\"rule_id\": \"r1\", \"description\": \"...\", \"category\": \"<dimension>\", \
         \"frequency\": 0.0, \"consistency_rate\": 0.0, \"evidence\": \"quoted example\", \
         \"variations\": [\"...\"]}}], \
         \"feature_vector\": {{\"<metric>\": 0.0}}}}\n\n\
         Paper id: {document_id}\n\
         Paper text:\n{text}",
        dims = dimension_list(),
    )
}

#[derive(Serialize)]
struct ReportDigest<'a> {
    document_id: &'a str,
    rules: &'a [Rule],
}

/// Prompt asking which rules recur across a batch of reports.
pub fn batch_summary(batch_id: &str, reports: &[IndividualReport]) -> String {
    let digests: Vec<ReportDigest<'_>> = reports
        .iter()
        .map(|r| ReportDigest {
            document_id: &r.document_id,
            rules: &r.extracted_rules,
        })
        .collect();
    let reports_json = serde_json::to_string_pretty(&digests).unwrap_or_else(|_| "[]".into());
    format!(
        "Below are the style rules extracted from {n} papers of {batch_id}.\n\
         Merge rules that describe the same pattern. For each merged rule, set \"frequency\" to \
         the fraction of these papers that follow it and \"consistency_rate\" to how uniformly \
         they apply it. Assign each rule one of these categories: {dims}.\n\n\
         Output a single JSON object:\n\
         {{\"rules\": [{{\"description\": \"...\", \"category\": \"...\", \"frequency\": 0.0, \
         \"consistency_rate\": 0.0, \"evidence\": \"...\", \"variations\": []}}], \
         \"common_patterns\": {{\"<pattern kind>\": {{}}}}}}\n\n\
         Reports:\n{reports_json}",
        n = reports.len(),
        dims = dimension_list(),
    )
}

/// Prompt asking for a cross-batch style guide narrative.
pub fn global_integration(summaries: &[BatchSummary]) -> String {
    let digests: Vec<serde_json::Value> = summaries
        .iter()
        .map(|s| {
            json!({
                "batch_id": s.batch_id,
                "papers": s.document_ids.len(),
                "rules": s.rules,
            })
        })
        .collect();
    let summaries_json = serde_json::to_string_pretty(&digests).unwrap_or_else(|_| "[]".into());
    format!(
        "Integrate the batch summaries below into one global style guide using a union \
         approach: keep every pattern found in any batch, grouped by dimension ({dims}).\n\n\
         Output a single JSON object:\n\
         {{\"overview\": \"...\", \"<dimension>\": {{\"frequent_patterns\": [], \
         \"common_patterns\": [], \"alternative_patterns\": []}}}}\n\n\
         Batch summaries:\n{summaries_json}",
        dims = dimension_list(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_budget_is_capped() {
        assert_eq!(Task::IndividualAnalysis.max_tokens(100_000), 15_000);
        assert_eq!(Task::GlobalIntegration.max_tokens(4_000), 4_000);
    }

    #[test]
    fn temperatures_decrease_with_scope() {
        assert!(Task::IndividualAnalysis.temperature() > Task::BatchSummary.temperature());
        assert!(Task::BatchSummary.temperature() > Task::GlobalIntegration.temperature());
    }

    #[test]
    fn individual_prompt_truncates_long_text() {
        let text = "x".repeat(MAX_DOCUMENT_CHARS + 500);
        let prompt = individual_analysis("p1", &text);
        assert!(prompt.contains("Paper id: p1"));
        assert!(prompt.len() < MAX_DOCUMENT_CHARS + 2_000);
    }

    #[test]
    fn batch_prompt_embeds_reports() {
        let report = IndividualReport {
            document_id: "p7".into(),
            analysis_timestamp: "2026-02-21T10:00:00Z".into(),
            feature_vector: Default::default(),
            extracted_rules: vec![Rule::new("Hedge claims", 0.8)],
            text_length: 0,
            word_count: 0,
            error: None,
            parse_error: None,
        };
        let prompt = batch_summary("batch_02", &[report]);
        assert!(prompt.contains("batch_02"));
        assert!(prompt.contains("\"p7\""));
        assert!(prompt.contains("Hedge claims"));
    }
}
