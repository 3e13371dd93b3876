//! Early-stopping decision over the ordered batch history.

use serde_json::Value;
use stylus_ai::tfidf;
use stylus_core::config::AnalysisConfig;
use stylus_core::model::BatchSummary;

/// Why the evaluator asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// The two most recent batches reached the similarity threshold.
    Similar,
    /// The batch ceiling was reached without convergence.
    MaxBatches,
}

impl StopCause {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Similar => "similar",
            Self::MaxBatches => "max_batches",
        }
    }
}

/// Outcome of one evaluation. `similarity` is set whenever two batches were
/// actually compared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceDecision {
    pub stop: Option<StopCause>,
    pub similarity: Option<f64>,
}

impl ConvergenceDecision {
    fn carry_on(similarity: Option<f64>) -> Self {
        Self {
            stop: None,
            similarity,
        }
    }

    pub fn should_stop(&self) -> bool {
        self.stop.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceEvaluator {
    min_batches: usize,
    max_batches: usize,
    similarity_threshold: f64,
}

impl ConvergenceEvaluator {
    pub fn new(min_batches: usize, max_batches: usize, similarity_threshold: f64) -> Self {
        Self {
            min_batches,
            max_batches,
            similarity_threshold,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.min_batches,
            config.max_batches,
            config.similarity_threshold,
        )
    }

    /// Rules, first match wins:
    /// a failed last batch never stops; fewer than two batches, or fewer than
    /// `min_batches`, never stop; then stop when the last two batches are similar
    /// enough, or when `max_batches` is reached.
    pub fn evaluate(&self, history: &[BatchSummary]) -> ConvergenceDecision {
        let Some(last) = history.last() else {
            return ConvergenceDecision::carry_on(None);
        };
        if !last.success || history.len() < 2 || history.len() < self.min_batches {
            return ConvergenceDecision::carry_on(None);
        }

        let previous = &history[history.len() - 2];
        let similarity = tfidf::similarity(&feature_text(previous), &feature_text(last));
        let stop = if similarity >= self.similarity_threshold {
            Some(StopCause::Similar)
        } else if history.len() >= self.max_batches {
            Some(StopCause::MaxBatches)
        } else {
            None
        };
        ConvergenceDecision {
            stop,
            similarity: Some(similarity),
        }
    }
}

/// Convenience form of [`ConvergenceEvaluator::evaluate`].
pub fn should_stop(
    history: &[BatchSummary],
    min_batches: usize,
    max_batches: usize,
    similarity_threshold: f64,
) -> bool {
    ConvergenceEvaluator::new(min_batches, max_batches, similarity_threshold)
        .evaluate(history)
        .should_stop()
}

/// Text fingerprint of a batch: `{type}_{key}_{value}` for each scalar pattern
/// field, then every rule description, space-joined. Empty for a failed batch.
pub fn feature_text(summary: &BatchSummary) -> String {
    if !summary.success {
        return String::new();
    }

    let mut parts = Vec::new();
    for (kind, fields) in &summary.common_patterns {
        for (key, value) in fields {
            let scalar = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            parts.push(format!("{kind}_{key}_{scalar}"));
        }
    }
    parts.extend(summary.rules.iter().map(|r| r.description.clone()));
    parts.join(" ")
}
