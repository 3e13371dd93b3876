//! Immutable run configuration, loaded once from the environment.
//!
//! Every component receives its configuration by value or reference at
//! construction; nothing reads the environment after startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

/// Frequency cut-offs for the three style-guide buckets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyThresholds {
    pub frequent: f64,
    pub common: f64,
    pub alternative: f64,
}

impl Default for FrequencyThresholds {
    fn default() -> Self {
        Self {
            frequent: 0.6,
            common: 0.3,
            alternative: 0.1,
        }
    }
}

/// Retry and timeout policy applied at the oracle boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub base_delay: Duration,
    /// Upper bound for a single attempt.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(1000),
            call_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt` (1-based; attempt 1 has no delay).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u32 << (attempt - 2).min(16);
        self.base_delay.saturating_mul(factor)
    }
}

/// Batching, convergence, and bucketing parameters for one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub batch_size: usize,
    /// Never stop before this many batches.
    pub min_batches: usize,
    /// Always stop once this many batches exist.
    pub max_batches: usize,
    pub similarity_threshold: f64,
    pub thresholds: FrequencyThresholds,
    /// Concurrent per-document oracle calls within one batch.
    pub max_concurrency: usize,
    /// Only the first N corpus documents (by id) are considered.
    pub max_documents: Option<usize>,
    pub retry: RetryPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            min_batches: 8,
            max_batches: 15,
            similarity_threshold: 0.9,
            thresholds: FrequencyThresholds::default(),
            max_concurrency: 4,
            max_documents: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load from environment variables, loading `.env` first if present.
    ///
    /// Unset variables fall back to [`Default`]; set-but-malformed ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let config = Self {
            batch_size: parse_var("BATCH_SIZE", defaults.batch_size)?,
            min_batches: parse_var("MIN_BATCHES_FOR_DIVERSITY", defaults.min_batches)?,
            max_batches: parse_var("MAX_BATCHES_FOR_DIVERSITY", defaults.max_batches)?,
            similarity_threshold: parse_var(
                "RULE_DIVERSITY_THRESHOLD",
                defaults.similarity_threshold,
            )?,
            thresholds: FrequencyThresholds {
                frequent: parse_var("FREQUENT_RULE_THRESHOLD", defaults.thresholds.frequent)?,
                common: parse_var("COMMON_RULE_THRESHOLD", defaults.thresholds.common)?,
                alternative: parse_var(
                    "ALTERNATIVE_RULE_THRESHOLD",
                    defaults.thresholds.alternative,
                )?,
            },
            max_concurrency: parse_var("ANALYSIS_CONCURRENCY", defaults.max_concurrency)?,
            max_documents: match env::var("MAX_PAPERS") {
                Ok(v) => Some(
                    v.trim()
                        .parse()
                        .map_err(|e| invalid("MAX_PAPERS", format!("{e}")))?,
                ),
                Err(_) => None,
            },
            retry: RetryPolicy {
                max_attempts: parse_var::<u32>("AI_MAX_RETRIES", defaults.retry.max_attempts - 1)?
                    .saturating_add(1),
                base_delay: Duration::from_millis(parse_var(
                    "AI_RETRY_DELAY_MS",
                    defaults.retry.base_delay.as_millis() as u64,
                )?),
                call_timeout: Duration::from_secs(parse_var(
                    "AI_TIMEOUT_SECS",
                    defaults.retry.call_timeout.as_secs(),
                )?),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if self.min_batches == 0 {
            return Err(invalid("min_batches", "must be at least 1"));
        }
        if self.max_batches < self.min_batches {
            return Err(invalid(
                "max_batches",
                format!(
                    "{} is below min_batches {}",
                    self.max_batches, self.min_batches
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(invalid(
                "similarity_threshold",
                format!("{} is outside [0, 1]", self.similarity_threshold),
            ));
        }
        let t = self.thresholds;
        if !(t.frequent >= t.common && t.common >= t.alternative && t.alternative >= 0.0) {
            return Err(invalid(
                "thresholds",
                format!(
                    "expected frequent >= common >= alternative >= 0, got {} / {} / {}",
                    t.frequent, t.common, t.alternative
                ),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(invalid("max_concurrency", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        Ok(())
    }
}

/// Which chat-completion vendor the oracle talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    DeepSeek,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::DeepSeek => "deepseek",
        }
    }
}

/// Connection settings for the text-generation oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    pub provider: Provider,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    /// `AI_TEMPERATURE`; when set it replaces every per-task temperature.
    pub temperature: Option<f32>,
}

impl OracleConfig {
    /// Load from `AI_PROVIDER` and the matching `OPENAI_*` / `DEEPSEEK_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let provider = match get_var_or("AI_PROVIDER", "openai").to_lowercase().as_str() {
            "deepseek" => Provider::DeepSeek,
            "openai" => Provider::OpenAi,
            other => {
                return Err(invalid(
                    "AI_PROVIDER",
                    format!("unknown provider '{other}'"),
                ));
            }
        };

        let (base_url, api_key, model) = match provider {
            Provider::OpenAi => (
                get_var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                env::var("OPENAI_API_KEY").ok(),
                get_var_or("OPENAI_MODEL", "gpt-4"),
            ),
            Provider::DeepSeek => (
                get_var_or("DEEPSEEK_BASE_URL", "https://api.deepseek.com/v1"),
                env::var("DEEPSEEK_API_KEY").ok(),
                get_var_or("DEEPSEEK_MODEL", "deepseek-chat"),
            ),
        };

        Ok(Self {
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model,
            max_tokens: parse_var("AI_MAX_TOKENS", 4000)?,
            temperature: env::var("AI_TEMPERATURE")
                .ok()
                .map(|_| parse_var("AI_TEMPERATURE", 0.0))
                .transpose()?,
        })
    }
}

/// Root of the persisted state (`DATA_DIR`, default `data`).
pub fn data_dir_from_env() -> PathBuf {
    let _ = dotenvy::dotenv();
    PathBuf::from(get_var_or("DATA_DIR", "data"))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| invalid(key, format!("'{raw}': {e}"))),
        Err(_) => Ok(default),
    }
}
