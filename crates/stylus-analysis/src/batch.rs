//! One batch: cache-or-analyze each document, then summarize the batch.

use std::time::Instant;

use chrono::Utc;
use futures::{StreamExt, TryStreamExt, stream};
use stylus_ai::{OracleError, RuleOracle};
use stylus_core::dimension::{categorize, normalize_label};
use stylus_core::model::{BatchSummary, IndividualReport, PatternMap, Rule};
use stylus_store::DocumentStore;
use tracing::{debug, info, warn};

use crate::error::AnalysisError;

/// Drives one slice of the corpus through the oracle.
///
/// Oracle failures are recorded on the returned reports and summary; only
/// storage failures are returned as errors.
pub struct BatchProcessor<'a, S: ?Sized, O: ?Sized> {
    store: &'a S,
    oracle: &'a O,
    max_concurrency: usize,
}

impl<'a, S, O> BatchProcessor<'a, S, O>
where
    S: DocumentStore + ?Sized,
    O: RuleOracle + ?Sized,
{
    pub fn new(store: &'a S, oracle: &'a O, max_concurrency: usize) -> Self {
        Self {
            store,
            oracle,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Process `document_ids` as batch `batch_id` and persist its summary.
    pub async fn process_batch(
        &self,
        batch_id: &str,
        document_ids: &[String],
    ) -> Result<BatchSummary, AnalysisError> {
        let start_time = Utc::now();
        let clock = Instant::now();
        info!(batch_id, documents = document_ids.len(), "processing batch");

        let outcomes: Vec<(IndividualReport, bool)> = stream::iter(document_ids)
            .map(|id| self.report_for(id))
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        let skipped_count = outcomes.iter().filter(|(_, hit)| *hit).count();
        let analyzed_count = outcomes.len() - skipped_count;
        let reports: Vec<IndividualReport> = outcomes.into_iter().map(|(r, _)| r).collect();
        let failed_documents: Vec<String> = reports
            .iter()
            .filter(|r| !r.is_valid())
            .map(|r| r.document_id.clone())
            .collect();

        let (rules, common_patterns, error, parse_error) =
            match self.oracle.summarize_batch(batch_id, &reports).await {
                Ok(list) => (
                    finalize_rules(batch_id, list.rules),
                    list.common_patterns,
                    None,
                    None,
                ),
                Err(OracleError::Parse(failure)) => {
                    warn!(batch_id, error = %failure, "batch summary unparseable");
                    (Vec::new(), PatternMap::new(), None, Some(failure.to_string()))
                }
                Err(e) => {
                    warn!(batch_id, error = %e, "batch summary failed");
                    (Vec::new(), PatternMap::new(), Some(e.to_string()), None)
                }
            };
        let success = error.is_none() && parse_error.is_none();

        let summary = BatchSummary {
            batch_id: batch_id.to_string(),
            start_time: start_time.to_rfc3339(),
            end_time: Utc::now().to_rfc3339(),
            duration_seconds: clock.elapsed().as_secs_f64(),
            document_ids: document_ids.to_vec(),
            rules,
            common_patterns,
            skipped_count,
            analyzed_count,
            failed_documents,
            success,
            error,
            parse_error,
        };
        self.store.save_batch_summary(&summary)?;

        info!(
            batch_id,
            skipped = skipped_count,
            analyzed = analyzed_count,
            failed = summary.failed_documents.len(),
            rules = summary.rules.len(),
            success,
            duration_secs = summary.duration_seconds,
            "batch complete"
        );
        Ok(summary)
    }

    /// The document's report and whether it came from cache.
    async fn report_for(&self, id: &str) -> Result<(IndividualReport, bool), AnalysisError> {
        if let Some(report) = self.store.cached_report(id)? {
            debug!(document_id = id, "cache hit");
            return Ok((report, true));
        }

        let document = self.store.read_document(id)?;
        let mut report = IndividualReport {
            document_id: document.id.clone(),
            analysis_timestamp: Utc::now().to_rfc3339(),
            feature_vector: Default::default(),
            extracted_rules: Vec::new(),
            text_length: document.text.chars().count(),
            word_count: document.text.split_whitespace().count(),
            error: None,
            parse_error: None,
        };

        match self.oracle.analyze_document(&document).await {
            Ok(analysis) => {
                report.feature_vector = analysis
                    .feature_vector
                    .into_iter()
                    .filter(|(_, v)| v.is_finite())
                    .collect();
                report.extracted_rules = analysis.rules;
                for rule in &mut report.extracted_rules {
                    normalize_rule(rule);
                }
            }
            Err(OracleError::Parse(failure)) => {
                warn!(document_id = id, error = %failure, "document analysis unparseable");
                report.parse_error = Some(failure.to_string());
            }
            Err(e) => {
                warn!(document_id = id, error = %e, "document analysis failed");
                report.error = Some(e.to_string());
            }
        }

        self.store.save_report(&report)?;
        Ok((report, false))
    }
}

/// Give unnamed rules a batch-scoped id and every rule a canonical category.
fn finalize_rules(batch_id: &str, mut rules: Vec<Rule>) -> Vec<Rule> {
    for (i, rule) in rules.iter_mut().enumerate() {
        if rule.rule_id.trim().is_empty() {
            rule.rule_id = format!("{batch_id}-r{:02}", i + 1);
        }
        normalize_rule(rule);
    }
    rules
}

/// Canonical category, rates in `[0, 1]`.
fn normalize_rule(rule: &mut Rule) {
    rule.category = if rule.category.trim().is_empty() {
        categorize(&rule.description).to_string()
    } else {
        normalize_label(&rule.category)
    };
    rule.frequency = unit_rate(rule.frequency);
    rule.consistency_rate = unit_rate(rule.consistency_rate);
}

/// Non-finite becomes 0; everything else is clamped to `[0, 1]`.
fn unit_rate(x: f64) -> f64 {
    if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.0 }
}
