//! Read-side views over the persisted run: progress, the style guide, and
//! offline regeneration of the guide.

use stylus_core::config::FrequencyThresholds;
use stylus_core::model::StyleGuide;
use stylus_store::DocumentStore;
use tracing::info;

use crate::aggregate::RuleAggregator;
use crate::error::AnalysisError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressInfo {
    pub total_documents: usize,
    pub batches_completed: usize,
    pub early_stop: bool,
    pub start_time: String,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    NotStarted,
    InProgress(ProgressInfo),
    Completed(ProgressInfo),
}

/// Summarize the persisted run log.
pub fn progress<S: DocumentStore + ?Sized>(store: &S) -> Result<Progress, AnalysisError> {
    let Some(run) = store.load_run_log()? else {
        return Ok(Progress::NotStarted);
    };
    let info = ProgressInfo {
        total_documents: run.total_documents,
        batches_completed: run.batches.len(),
        early_stop: run.early_stop,
        start_time: run.start_time.clone(),
        end_time: run.end_time.clone(),
    };
    Ok(if run.is_complete() {
        Progress::Completed(info)
    } else {
        Progress::InProgress(info)
    })
}

/// The current style guide: `style_guide.json`, else the completed run log's
/// final guide.
pub fn get_style_guide<S: DocumentStore + ?Sized>(
    store: &S,
) -> Result<Option<StyleGuide>, AnalysisError> {
    if let Some(guide) = store.load_style_guide()? {
        return Ok(Some(guide));
    }
    Ok(store
        .load_run_log()?
        .filter(|run| run.is_complete())
        .and_then(|run| run.final_guide))
}

/// Rebuild and persist the style guide from the logged batch summaries without
/// calling the oracle. A synthesis already on the log's final guide is kept.
///
/// `None` when there is no run log.
pub fn regenerate_style_guide<S: DocumentStore + ?Sized>(
    store: &S,
    thresholds: FrequencyThresholds,
) -> Result<Option<StyleGuide>, AnalysisError> {
    let Some(run) = store.load_run_log()? else {
        return Ok(None);
    };
    let mut guide = RuleAggregator::new(thresholds).aggregate(&run.batches);
    guide.synthesis = run.final_guide.and_then(|g| g.synthesis);
    store.save_style_guide(&guide)?;
    info!(
        batches = guide.total_batches,
        rules = guide.rule_buckets.len(),
        "style guide regenerated"
    );
    Ok(Some(guide))
}
