//! Chat-completions oracle for OpenAI-compatible endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stylus_core::config::OracleConfig;
use stylus_core::model::{BatchSummary, Document, GlobalSynthesis, IndividualReport};
use tracing::{debug, info};

use crate::error::{OracleError, ParseFailure};
use crate::features::extract_features;
use crate::oracle::{BatchRuleList, DocumentAnalysis, RuleOracle};
use crate::parse::parse_payload;
use crate::prompts::{self, Task};
use crate::response::{BatchRuleListResponse, RuleListResponse, StyleGuidePayload};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`RuleOracle`] backed by a `POST {base_url}/chat/completions` endpoint.
///
/// Performs one attempt per call; wrap it in
/// [`ResilientOracle`](crate::retry::ResilientOracle) for retries and timeouts.
pub struct LlmOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

impl LlmOracle {
    /// Fails with [`OracleError::Misconfigured`] when no API key is set.
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        if config.api_key.is_none() {
            return Err(OracleError::Misconfigured(format!(
                "no API key configured for provider '{}'",
                config.provider.as_str()
            )));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| OracleError::Misconfigured(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Send one completion request and return the assistant text.
    async fn complete(&self, task: Task, prompt: &str) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: task.system_message(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature.unwrap_or(task.temperature()),
            max_tokens: task.max_tokens(self.config.max_tokens),
        };

        debug!(task = task.as_str(), prompt_chars = prompt.len(), "sending completion request");
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(OracleError::Server {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ParseFailure::new(format!("malformed completion envelope: {e}"), &text))?;
        let content = envelope
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ParseFailure::new("completion has no message content", &text))?;

        info!(
            task = task.as_str(),
            response_chars = content.len(),
            "completion received"
        );
        Ok(content)
    }
}

#[async_trait]
impl RuleOracle for LlmOracle {
    async fn analyze_document(
        &self,
        document: &Document,
    ) -> Result<DocumentAnalysis, OracleError> {
        let prompt = prompts::individual_analysis(&document.id, &document.text);
        let raw = self.complete(Task::IndividualAnalysis, &prompt).await?;
        let payload: RuleListResponse = parse_payload(&raw)?;

        let mut feature_vector = extract_features(&document.text);
        for (name, value) in payload.numeric_features() {
            feature_vector.entry(name).or_insert(value);
        }
        let rules = payload.rules();
        info!(document_id = %document.id, rules = rules.len(), "document analyzed");
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
        let prompt = prompts::batch_summary(batch_id, reports);
        let raw = self.complete(Task::BatchSummary, &prompt).await?;
        let (rules, common_patterns) = parse_payload::<BatchRuleListResponse>(&raw)?.into_parts();
        info!(batch_id, rules = rules.len(), "batch summarized");
        Ok(BatchRuleList {
            rules,
            common_patterns,
        })
    }

    async fn integrate_global(
        &self,
        summaries: &[BatchSummary],
    ) -> Result<GlobalSynthesis, OracleError> {
        let prompt = prompts::global_integration(summaries);
        let raw = self.complete(Task::GlobalIntegration, &prompt).await?;
        let synthesis: StyleGuidePayload = parse_payload(&raw)?;
        info!(
            batches = summaries.len(),
            sections = synthesis.sections.len(),
            "global synthesis received"
        );
        Ok(synthesis)
    }
}
