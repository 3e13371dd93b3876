//! The resumable batch loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use stylus_ai::RuleOracle;
use stylus_core::config::AnalysisConfig;
use stylus_core::model::{AnalysisRun, StopReason, batch_id};
use stylus_store::DocumentStore;
use tracing::{info, warn};

use crate::aggregate::RuleAggregator;
use crate::batch::BatchProcessor;
use crate::convergence::ConvergenceEvaluator;
use crate::error::AnalysisError;

/// Shared request to stop at the next batch boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a run, as reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Converged,
    Exhausted,
    Cancelled,
    Completed,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Converged => "converged",
            Self::Exhausted => "exhausted",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

/// How a run that returned `Ok` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// Completed, but some documents or batch summaries failed at the oracle.
    CompletedWithFailures {
        failed_documents: Vec<String>,
        failed_batches: Vec<String>,
    },
    /// Stopped at a batch boundary; the log stays in progress and can be resumed.
    Cancelled { batches_completed: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run: AnalysisRun,
    pub status: RunStatus,
}

impl RunReport {
    fn finished(run: AnalysisRun) -> Self {
        let failed_documents = run.failed_documents();
        let failed_batches = run.failed_batches();
        let status = if failed_documents.is_empty() && failed_batches.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithFailures {
                failed_documents,
                failed_batches,
            }
        };
        Self { run, status }
    }

    fn cancelled(run: AnalysisRun) -> Self {
        let batches_completed = run.batches.len();
        Self {
            run,
            status: RunStatus::Cancelled { batches_completed },
        }
    }
}

/// Runs the corpus through the oracle batch by batch until convergence or
/// exhaustion, persisting the run log after every batch.
pub struct AnalysisDriver<S, O> {
    store: S,
    oracle: O,
    config: AnalysisConfig,
    cancel: CancelFlag,
}

impl<S: DocumentStore, O: RuleOracle> AnalysisDriver<S, O> {
    pub fn new(store: S, oracle: O, config: AnalysisConfig) -> Self {
        Self {
            store,
            oracle,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Share an externally owned cancel flag (e.g. one set by a signal handler).
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Start a fresh run, replacing any existing run log.
    pub async fn run(&self) -> Result<RunReport, AnalysisError> {
        self.config.validate()?;
        let ids = self.corpus()?;
        let run = AnalysisRun::new(Utc::now().to_rfc3339(), ids.len(), self.config.batch_size);
        self.store.save_run_log(&run)?;
        info!(
            state = RunState::Running.as_str(),
            total_documents = ids.len(),
            batch_size = run.batch_size,
            "analysis started"
        );
        self.drive(run, &ids).await
    }

    /// Continue the persisted run.
    ///
    /// A completed log is returned unchanged; no log starts a fresh run.
    pub async fn resume(&self) -> Result<RunReport, AnalysisError> {
        self.config.validate()?;
        let Some(run) = self.store.load_run_log()? else {
            info!(
                state = RunState::NotStarted.as_str(),
                "no run log found; starting a fresh run"
            );
            return self.run().await;
        };
        if run.is_complete() {
            info!(
                state = RunState::Completed.as_str(),
                batches = run.batches.len(),
                "run already complete"
            );
            return Ok(RunReport::finished(run));
        }

        self.store.verify_run_consistency(&run)?;
        let mut ids = self.corpus()?;
        ids.truncate(run.total_documents);
        info!(
            state = RunState::Running.as_str(),
            batches_recorded = run.batches.len(),
            batch_size = run.batch_size,
            "resuming analysis"
        );
        self.drive(run, &ids).await
    }

    /// Sorted corpus ids, capped at `max_documents`.
    fn corpus(&self) -> Result<Vec<String>, AnalysisError> {
        let mut ids = self.store.list_documents()?;
        if let Some(cap) = self.config.max_documents {
            ids.truncate(cap);
        }
        if ids.is_empty() {
            return Err(AnalysisError::CorpusEmpty);
        }
        Ok(ids)
    }

    async fn drive(
        &self,
        mut run: AnalysisRun,
        ids: &[String],
    ) -> Result<RunReport, AnalysisError> {
        let evaluator = ConvergenceEvaluator::from_config(&self.config);
        let processor = BatchProcessor::new(&self.store, &self.oracle, self.config.max_concurrency);
        // Logged batch size wins over configuration so slices line up on resume.
        let batch_size = run.batch_size.max(1);

        let mut stop = evaluator.evaluate(&run.batches).stop;
        while stop.is_none() {
            let offset = run.batches.len() * batch_size;
            if offset >= ids.len() {
                break;
            }
            if self.cancel.is_cancelled() {
                warn!(
                    state = RunState::Cancelled.as_str(),
                    batches_completed = run.batches.len(),
                    "analysis cancelled"
                );
                return Ok(RunReport::cancelled(run));
            }

            let id = batch_id(run.batches.len());
            let end = (offset + batch_size).min(ids.len());
            let summary = processor.process_batch(&id, &ids[offset..end]).await?;
            run.batches.push(summary);
            self.store.save_run_log(&run)?;

            let decision = evaluator.evaluate(&run.batches);
            info!(
                batch_id = %id,
                similarity = ?decision.similarity,
                stop = decision.stop.map(|c| c.as_str()),
                "convergence evaluated"
            );
            stop = decision.stop;
        }

        let (state, reason) = match stop {
            Some(_) => (RunState::Converged, StopReason::Converged),
            None => (RunState::Exhausted, StopReason::Exhausted),
        };
        run.early_stop = stop.is_some();
        info!(
            state = state.as_str(),
            batches = run.batches.len(),
            "batch loop finished"
        );
        self.complete(run, reason).await
    }

    async fn complete(
        &self,
        mut run: AnalysisRun,
        reason: StopReason,
    ) -> Result<RunReport, AnalysisError> {
        let guide = RuleAggregator::new(self.config.thresholds)
            .aggregate_with_synthesis(&run.batches, &self.oracle)
            .await;
        self.store.save_style_guide(&guide)?;

        run.final_guide = Some(guide);
        run.stop_reason = Some(reason);
        run.end_time = Some(Utc::now().to_rfc3339());
        self.store.save_run_log(&run)?;

        let report = RunReport::finished(run);
        info!(
            state = RunState::Completed.as_str(),
            early_stop = report.run.early_stop,
            failed_documents = report.run.failed_documents().len(),
            failed_batches = report.run.failed_batches().len(),
            "analysis complete"
        );
        Ok(report)
    }
}
