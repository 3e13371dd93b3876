pub mod config;
pub mod dimension;
pub mod model;
pub mod rule_key;

pub use config::{AnalysisConfig, ConfigError, FrequencyThresholds, OracleConfig, Provider, RetryPolicy};
pub use model::{
    AnalysisRun, BatchEvolution, BatchSummary, Document, FeatureVector, GlobalSynthesis,
    IndividualReport, PatternMap, Rule, RuleBuckets, StopReason, StyleGuide, batch_id,
    report_is_valid,
};
pub use rule_key::RuleKey;
