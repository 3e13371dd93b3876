//! Retry with exponential backoff and a per-attempt timeout, applied once at
//! the oracle boundary.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use stylus_core::config::RetryPolicy;
use stylus_core::model::{BatchSummary, Document, GlobalSynthesis, IndividualReport};
use tracing::warn;

use crate::error::OracleError;
use crate::oracle::{BatchRuleList, DocumentAnalysis, RuleOracle};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Wraps any [`RuleOracle`] so each call is bounded by `call_timeout` and
/// transient failures are retried up to `max_attempts` in total.
///
/// Parse failures and 4xx responses are returned immediately.
pub struct ResilientOracle<O> {
    inner: O,
    policy: RetryPolicy,
}

impl<O: RuleOracle> ResilientOracle<O> {
    pub fn new(inner: O, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    async fn call<T, F, Fut>(
        &self,
        op: &'static str,
        mut attempt_fn: F,
    ) -> Result<T, OracleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OracleError>>,
    {
        let mut attempt = 1;
        loop {
            let backoff = self.policy.delay_before(attempt).min(MAX_BACKOFF);
            if !backoff.is_zero() {
                warn!(
                    op,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
            }

            let result = match tokio::time::timeout(self.policy.call_timeout, attempt_fn()).await {
                Ok(result) => result,
                Err(_) => Err(OracleError::Timeout {
                    after: self.policy.call_timeout,
                }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    warn!(op, attempt, error = %e, "transient oracle failure");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<O: RuleOracle> RuleOracle for ResilientOracle<O> {
    async fn analyze_document(
        &self,
        document: &Document,
    ) -> Result<DocumentAnalysis, OracleError> {
        self.call("analyze_document", move || self.inner.analyze_document(document))
            .await
    }

    async fn summarize_batch(
        &self,
        batch_id: &str,
        reports: &[IndividualReport],
    ) -> Result<BatchRuleList, OracleError> {
        self.call("summarize_batch", move || {
            self.inner.summarize_batch(batch_id, reports)
        })
        .await
    }

    async fn integrate_global(
        &self,
        summaries: &[BatchSummary],
    ) -> Result<GlobalSynthesis, OracleError> {
        self.call("integrate_global", move || self.inner.integrate_global(summaries))
            .await
    }
}
