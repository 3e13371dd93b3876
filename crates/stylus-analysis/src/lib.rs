//! Batched incremental corpus analysis with convergence detection.
//!
//! The [`AnalysisDriver`] slices the corpus into fixed-size batches, runs each
//! through a [`BatchProcessor`], asks the [`ConvergenceEvaluator`] whether the
//! last two batches still differ, and finally folds every batch summary into a
//! style guide with the [`RuleAggregator`].

pub mod aggregate;
pub mod batch;
pub mod convergence;
pub mod driver;
mod error;
pub mod progress;

pub use aggregate::{Bucket, RuleAggregator};
pub use batch::BatchProcessor;
pub use convergence::{ConvergenceDecision, ConvergenceEvaluator, StopCause, feature_text, should_stop};
pub use driver::{AnalysisDriver, CancelFlag, RunReport, RunState, RunStatus};
pub use error::AnalysisError;
pub use progress::{Progress, ProgressInfo, get_style_guide, progress, regenerate_style_guide};
