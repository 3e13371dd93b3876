//! Persisted analysis entities: documents, rules, per-document reports, batch
//! summaries, the resumable run log, and the final style guide.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dimension::normalize_label;
use crate::rule_key::RuleKey;

/// Numeric statistics for one document (sentence lengths, ratios, ...).
pub type FeatureVector = BTreeMap<String, f64>;

/// Oracle-reported recurring patterns: pattern type → field → scalar value.
pub type PatternMap = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

/// A pre-extracted paper from the corpus directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A discovered stylistic pattern.
///
/// Rules are value objects: two rules with the same [`RuleKey`] describe the same
/// pattern regardless of `rule_id`. `frequency` is relative to the scope that
/// produced it (one batch, or the whole run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub rule_id: String,
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub frequency: f64,
    #[serde(default)]
    pub consistency_rate: f64,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub variations: Vec<String>,
}

impl Rule {
    /// Minimal rule with the given description and frequency; consistency
    /// defaults to the frequency.
    pub fn new(description: impl Into<String>, frequency: f64) -> Self {
        Self {
            rule_id: String::new(),
            description: description.into(),
            category: String::new(),
            frequency,
            consistency_rate: frequency,
            evidence: String::new(),
            variations: Vec::new(),
        }
    }

    /// Deduplication identity of this rule.
    pub fn key(&self) -> RuleKey {
        RuleKey::of(&self.description)
    }
}

/// Per-document analysis, cached on disk keyed by `document_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualReport {
    pub document_id: String,
    /// ISO 8601 timestamp string.
    pub analysis_timestamp: String,
    #[serde(default)]
    pub feature_vector: FeatureVector,
    #[serde(default)]
    pub extracted_rules: Vec<Rule>,
    #[serde(default)]
    pub text_length: usize,
    #[serde(default)]
    pub word_count: usize,
    /// Transport or timeout failure while analyzing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The oracle replied but its payload did not parse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl IndividualReport {
    /// A report without any failure marker. Only these are reused from cache.
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && self.parse_error.is_none()
    }
}

/// Cache gate: false for an absent report or one carrying a failure marker.
///
/// A report that failed to deserialize is loaded as absent by the store, so it
/// also fails this check.
pub fn report_is_valid(report: Option<&IndividualReport>) -> bool {
    report.is_some_and(IndividualReport::is_valid)
}

/// Sequential batch identifier for a zero-based slice index: `batch_01`, `batch_02`, ...
pub fn batch_id(index: usize) -> String {
    format!("batch_{:02}", index + 1)
}

/// Outcome of one batch slice. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    /// ISO 8601 timestamp string.
    pub start_time: String,
    /// ISO 8601 timestamp string.
    pub end_time: String,
    #[serde(default)]
    pub duration_seconds: f64,
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub common_patterns: PatternMap,
    pub skipped_count: usize,
    pub analyzed_count: usize,
    /// Documents whose report carries `error` or `parse_error`.
    #[serde(default)]
    pub failed_documents: Vec<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

/// Why a run stopped consuming batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Two consecutive batches were similar enough, or the batch ceiling was hit.
    Converged,
    /// The corpus ran out first.
    Exhausted,
}

/// The resumable analysis log. No `end_time` means the run is still in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    /// ISO 8601 timestamp string.
    pub start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub total_documents: usize,
    pub batch_size: usize,
    #[serde(default)]
    pub batches: Vec<BatchSummary>,
    #[serde(default)]
    pub early_stop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub final_guide: Option<StyleGuide>,
}

impl AnalysisRun {
    pub fn new(start_time: String, total_documents: usize, batch_size: usize) -> Self {
        Self {
            start_time,
            end_time: None,
            total_documents,
            batch_size,
            batches: Vec::new(),
            early_stop: false,
            stop_reason: None,
            final_guide: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }

    /// Number of corpus documents already covered by recorded batches.
    pub fn documents_consumed(&self) -> usize {
        self.batches.iter().map(|b| b.document_ids.len()).sum()
    }

    /// Every document that failed analysis in any batch, in batch order.
    pub fn failed_documents(&self) -> Vec<String> {
        self.batches
            .iter()
            .flat_map(|b| b.failed_documents.iter().cloned())
            .collect()
    }

    /// Ids of batches whose summary call failed.
    pub fn failed_batches(&self) -> Vec<String> {
        self.batches
            .iter()
            .filter(|b| !b.success)
            .map(|b| b.batch_id.clone())
            .collect()
    }
}

/// Distinct rules partitioned by frequency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleBuckets {
    #[serde(default)]
    pub frequent: Vec<Rule>,
    #[serde(default)]
    pub common: Vec<Rule>,
    #[serde(default)]
    pub alternative: Vec<Rule>,
}

impl RuleBuckets {
    pub fn len(&self) -> usize {
        self.frequent.len() + self.common.len() + self.alternative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All bucketed rules, frequent first.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.frequent
            .iter()
            .chain(&self.common)
            .chain(&self.alternative)
    }
}

/// How many rules a batch contributed, and how many of them were new.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEvolution {
    pub batch_id: String,
    pub new_rules_count: usize,
    pub total_rules_count: usize,
}

/// Best-effort cross-batch synthesis returned by the oracle.
///
/// Free-form beyond `overview`; it never adds rules to the buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSynthesis {
    #[serde(default)]
    pub overview: String,
    #[serde(flatten)]
    pub sections: serde_json::Map<String, serde_json::Value>,
}

/// Summary statistics over the rules a guide keeps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub avg_frequency: f64,
    pub avg_consistency: f64,
    /// Rules with consistency above [`HIGH_CONSISTENCY`].
    pub high_consistency_rules: usize,
    pub reliability_score: f64,
}

pub const HIGH_CONSISTENCY: f64 = 0.8;

impl QualityMetrics {
    /// `None` for an empty rule set.
    pub fn of<'a>(rules: impl IntoIterator<Item = &'a Rule>) -> Option<Self> {
        let mut count = 0usize;
        let mut frequency = 0.0;
        let mut consistency = 0.0;
        let mut high = 0usize;
        for rule in rules {
            count += 1;
            frequency += rule.frequency;
            consistency += rule.consistency_rate;
            if rule.consistency_rate > HIGH_CONSISTENCY {
                high += 1;
            }
        }
        if count == 0 {
            return None;
        }
        let n = count as f64;
        Some(Self {
            avg_frequency: frequency / n,
            avg_consistency: consistency / n,
            high_consistency_rules: high,
            reliability_score: consistency / n,
        })
    }
}

/// The deduplicated, frequency-bucketed result of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleGuide {
    /// ISO 8601 timestamp string.
    pub generated_at: String,
    pub total_documents_analyzed: usize,
    pub total_batches: usize,
    pub rule_buckets: RuleBuckets,
    /// One entry per batch, in batch order.
    pub rule_evolution: Vec<BatchEvolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_metrics: Option<QualityMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<GlobalSynthesis>,
}

impl StyleGuide {
    pub fn evolution_for(&self, batch_id: &str) -> Option<&BatchEvolution> {
        self.rule_evolution.iter().find(|e| e.batch_id == batch_id)
    }

    /// Bucketed rules of one dimension, frequent first. The label is folded
    /// the same way oracle-supplied categories are.
    pub fn rules_in_category(&self, category: &str) -> Vec<&Rule> {
        let wanted = normalize_label(category);
        self.rule_buckets
            .iter()
            .filter(|r| r.category == wanted)
            .collect()
    }

    /// Rules followed widely enough to apply by default.
    pub fn core_rules(&self) -> &[Rule] {
        &self.rule_buckets.frequent
    }
}
