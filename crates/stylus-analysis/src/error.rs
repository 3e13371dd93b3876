use stylus_core::ConfigError;
use stylus_store::StoreError;
use thiserror::Error;

/// Fatal run failures. Oracle failures never surface here; they are recorded
/// on reports and batch summaries instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("corpus is empty: no documents to analyze")]
    CorpusEmpty,

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}
