//! Cross-batch deduplication and frequency bucketing of rules.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use stylus_ai::RuleOracle;
use stylus_core::config::FrequencyThresholds;
use stylus_core::model::{
    BatchEvolution, BatchSummary, QualityMetrics, Rule, RuleBuckets, StyleGuide,
};
use stylus_core::rule_key::RuleKey;
use tracing::{info, warn};

/// Frequency band a rule falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Frequent,
    Common,
    Alternative,
}

/// Builds a [`StyleGuide`] from the ordered batch history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleAggregator {
    thresholds: FrequencyThresholds,
}

impl RuleAggregator {
    pub fn new(thresholds: FrequencyThresholds) -> Self {
        Self { thresholds }
    }

    /// `None` below the alternative threshold.
    pub fn bucket(&self, frequency: f64) -> Option<Bucket> {
        let t = &self.thresholds;
        if frequency >= t.frequent {
            Some(Bucket::Frequent)
        } else if frequency >= t.common {
            Some(Bucket::Common)
        } else if frequency >= t.alternative {
            Some(Bucket::Alternative)
        } else {
            None
        }
    }

    /// Deterministic guide for `history`, without synthesis.
    pub fn aggregate(&self, history: &[BatchSummary]) -> StyleGuide {
        let mut index: HashMap<RuleKey, usize> = HashMap::new();
        let mut distinct: Vec<Rule> = Vec::new();
        let mut evolution = Vec::with_capacity(history.len());

        for batch in history {
            if !batch.success {
                evolution.push(BatchEvolution {
                    batch_id: batch.batch_id.clone(),
                    new_rules_count: 0,
                    total_rules_count: 0,
                });
                continue;
            }

            let mut new_keys: HashSet<RuleKey> = HashSet::new();
            for rule in &batch.rules {
                let key = rule.key();
                if key.is_empty() {
                    continue;
                }
                match index.get(&key) {
                    Some(&i) => {
                        if rule.consistency_rate > distinct[i].consistency_rate {
                            distinct[i] = rule.clone();
                        }
                    }
                    None => {
                        index.insert(key.clone(), distinct.len());
                        distinct.push(rule.clone());
                        new_keys.insert(key);
                    }
                }
            }

            evolution.push(BatchEvolution {
                batch_id: batch.batch_id.clone(),
                new_rules_count: new_keys.len(),
                total_rules_count: batch.rules.len(),
            });
        }

        let mut buckets = RuleBuckets::default();
        for rule in distinct {
            match self.bucket(rule.frequency) {
                Some(Bucket::Frequent) => buckets.frequent.push(rule),
                Some(Bucket::Common) => buckets.common.push(rule),
                Some(Bucket::Alternative) => buckets.alternative.push(rule),
                None => {}
            }
        }
        // Stable sort keeps first-seen order among equal frequencies.
        for bucket in [
            &mut buckets.frequent,
            &mut buckets.common,
            &mut buckets.alternative,
        ] {
            bucket.sort_by(|a, b| b.frequency.total_cmp(&a.frequency));
        }

        info!(
            batches = history.len(),
            distinct_rules = index.len(),
            frequent = buckets.frequent.len(),
            common = buckets.common.len(),
            alternative = buckets.alternative.len(),
            "rules aggregated"
        );

        StyleGuide {
            generated_at: Utc::now().to_rfc3339(),
            total_documents_analyzed: history.iter().map(|b| b.document_ids.len()).sum(),
            total_batches: history.len(),
            quality_metrics: QualityMetrics::of(buckets.iter()),
            rule_buckets: buckets,
            rule_evolution: evolution,
            synthesis: None,
        }
    }

    /// [`aggregate`](Self::aggregate), then attach the oracle's cross-batch
    /// synthesis over the successful summaries. A synthesis failure is logged
    /// and leaves `synthesis` empty.
    pub async fn aggregate_with_synthesis<O>(
        &self,
        history: &[BatchSummary],
        oracle: &O,
    ) -> StyleGuide
    where
        O: RuleOracle + ?Sized,
    {
        let mut guide = self.aggregate(history);
        let successful: Vec<BatchSummary> =
            history.iter().filter(|b| b.success).cloned().collect();
        if successful.is_empty() {
            return guide;
        }
        match oracle.integrate_global(&successful).await {
            Ok(synthesis) => guide.synthesis = Some(synthesis),
            Err(e) => warn!(error = %e, "global synthesis failed; guide kept without it"),
        }
        guide
    }
}
