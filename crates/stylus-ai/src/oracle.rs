use async_trait::async_trait;
use stylus_core::model::{
    BatchSummary, Document, FeatureVector, GlobalSynthesis, IndividualReport, PatternMap, Rule,
};

use crate::error::OracleError;

/// Result of analyzing one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentAnalysis {
    pub feature_vector: FeatureVector,
    pub rules: Vec<Rule>,
}

/// Result of summarizing one batch of reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchRuleList {
    pub rules: Vec<Rule>,
    pub common_patterns: PatternMap,
}

/// The external text-generation service that discovers style rules.
///
/// Implementations are opaque to the pipeline; every failure is reported as a
/// typed [`OracleError`] and never panics.
#[async_trait]
pub trait RuleOracle: Send + Sync {
    async fn analyze_document(&self, document: &Document)
    -> Result<DocumentAnalysis, OracleError>;

    async fn summarize_batch(
        &self,
        batch_id: &str,
        reports: &[IndividualReport],
    ) -> Result<BatchRuleList, OracleError>;

    /// Best-effort cross-batch synthesis; never feeds the rule buckets.
    async fn integrate_global(
        &self,
        summaries: &[BatchSummary],
    ) -> Result<GlobalSynthesis, OracleError>;
}

#[async_trait]
impl<T: RuleOracle + ?Sized> RuleOracle for std::sync::Arc<T> {
    async fn analyze_document(
        &self,
        document: &Document,
    ) -> Result<DocumentAnalysis, OracleError> {
        (**self).analyze_document(document).await
    }

    async fn summarize_batch(
        &self,
        batch_id: &str,
        reports: &[IndividualReport],
    ) -> Result<BatchRuleList, OracleError> {
        (**self).summarize_batch(batch_id, reports).await
    }

    async fn integrate_global(
        &self,
        summaries: &[BatchSummary],
    ) -> Result<GlobalSynthesis, OracleError> {
        (**self).integrate_global(summaries).await
    }
}
