#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use stylus_ai::{BatchRuleList, DocumentAnalysis, OracleError, ParseFailure, RuleOracle};
use stylus_analysis::CancelFlag;
use stylus_core::config::{AnalysisConfig, RetryPolicy};
use stylus_core::model::{
    BatchSummary, Document, FeatureVector, GlobalSynthesis, IndividualReport, PatternMap, Rule,
};
use stylus_store::FsStore;
use tempfile::TempDir;

pub const RULES: [&str; 3] = [
    "Use hedged claims when reporting effects",
    "Open each section with the research gap",
    "Prefer first person plural for author actions",
];

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Timeout,
    Unparseable,
}

impl Failure {
    fn error(self) -> OracleError {
        match self {
            Self::Timeout => OracleError::Timeout {
                after: Duration::from_secs(120),
            },
            Self::Unparseable => {
                OracleError::Parse(ParseFailure::new("no JSON object", "I cannot do that."))
            }
        }
    }
}

/// In-memory oracle: every document follows [`RULES`]; a batch summary reports
/// each rule found in its valid reports with its share of those reports.
#[derive(Default)]
pub struct ScriptedOracle {
    pub failing_documents: HashMap<String, Failure>,
    pub failing_batches: HashMap<String, Failure>,
    pub failing_synthesis: bool,
    /// Report NaN and infinite numbers in every analysis and summary.
    pub non_finite: bool,
    /// Extra pattern fields per batch id, to steer similarity.
    pub patterns: HashMap<String, PatternMap>,
    /// Set the flag once this batch has been summarized.
    pub cancel_after: Option<(String, CancelFlag)>,

    pub analyze_calls: AtomicUsize,
    pub summarize_calls: AtomicUsize,
    pub integrate_calls: AtomicUsize,
    /// `(batch_id, report count)` per summarize call, in call order.
    pub summarized: Mutex<Vec<(String, usize)>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze_count(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn summarize_count(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    pub fn integrate_count(&self) -> usize {
        self.integrate_calls.load(Ordering::SeqCst)
    }

    pub fn summarized_batches(&self) -> Vec<String> {
        self.summarized
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[async_trait]
impl RuleOracle for ScriptedOracle {
    async fn analyze_document(
        &self,
        document: &Document,
    ) -> Result<DocumentAnalysis, OracleError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.failing_documents.get(&document.id) {
            return Err(failure.error());
        }
        let mut feature_vector = FeatureVector::new();
        feature_vector.insert("total_words".into(), document.text.split_whitespace().count() as f64);
        let mut rules: Vec<Rule> = RULES.iter().map(|d| Rule::new(*d, 1.0)).collect();
        if self.non_finite {
            feature_vector.insert("hedge_ratio".into(), f64::NAN);
            for rule in &mut rules {
                rule.consistency_rate = f64::NAN;
            }
        }
        Ok(DocumentAnalysis {
            feature_vector,
            rules,
        })
    }

    async fn summarize_batch(
        &self,
        batch_id: &str,
        reports: &[IndividualReport],
    ) -> Result<BatchRuleList, OracleError> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        self.summarized
            .lock()
            .unwrap()
            .push((batch_id.to_string(), reports.len()));
        if let Some((after, flag)) = &self.cancel_after
            && after == batch_id
        {
            flag.cancel();
        }
        if let Some(failure) = self.failing_batches.get(batch_id) {
            return Err(failure.error());
        }

        let valid: Vec<&IndividualReport> = reports.iter().filter(|r| r.is_valid()).collect();
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for report in &valid {
            for rule in &report.extracted_rules {
                *counts.entry(rule.description.as_str()).or_insert(0) += 1;
            }
        }
        let mut rules: Vec<Rule> = RULES
            .iter()
            .filter_map(|d| counts.get(d).map(|n| Rule::new(*d, *n as f64 / valid.len() as f64)))
            .collect();
        if self.non_finite {
            for rule in &mut rules {
                rule.frequency = f64::INFINITY;
                rule.consistency_rate = f64::NAN;
            }
        }
        Ok(BatchRuleList {
            rules,
            common_patterns: self.patterns.get(batch_id).cloned().unwrap_or_default(),
        })
    }

    async fn integrate_global(
        &self,
        summaries: &[BatchSummary],
    ) -> Result<GlobalSynthesis, OracleError> {
        self.integrate_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_synthesis {
            return Err(OracleError::Transport("connection reset".into()));
        }
        Ok(GlobalSynthesis {
            overview: format!("{} batches integrated", summaries.len()),
            sections: Default::default(),
        })
    }
}

/// Pattern map with one `opening` pattern carrying the given fields.
pub fn opening_pattern(fields: &[(&str, &str)]) -> PatternMap {
    PatternMap::from([(
        "opening".to_string(),
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
            .collect(),
    )])
}

/// A data dir with `n` documents `doc_01.txt` .. `doc_{n}.txt`.
pub fn corpus(n: usize) -> (TempDir, FsStore) {
    let dir = TempDir::new().unwrap();
    let extracted = dir.path().join("extracted");
    std::fs::create_dir_all(&extracted).unwrap();
    for i in 1..=n {
        std::fs::write(
            extracted.join(format!("doc_{i:02}.txt")),
            format!("Paper {i}. We examine the effect of treatment {i} on outcomes."),
        )
        .unwrap();
    }
    let store = FsStore::open(dir.path()).unwrap();
    (dir, store)
}

pub fn reopen(dir: &Path) -> FsStore {
    FsStore::open(dir).unwrap()
}

pub fn config(batch_size: usize, min_batches: usize, max_batches: usize) -> AnalysisConfig {
    AnalysisConfig {
        batch_size,
        min_batches,
        max_batches,
        similarity_threshold: 0.9,
        max_concurrency: 3,
        retry: RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            call_timeout: Duration::from_secs(5),
        },
        ..AnalysisConfig::default()
    }
}
