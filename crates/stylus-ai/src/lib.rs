//! Rule-extraction oracle: the trait the pipeline calls, tolerant parsing of
//! model output, a retry decorator, TF-IDF similarity, and local text features.

pub mod error;
pub mod features;
pub mod oracle;
pub mod parse;
pub mod prompts;
pub mod response;
pub mod retry;
pub mod tfidf;

#[cfg(feature = "http")]
pub mod http;

pub use error::{OracleError, ParseFailure};
pub use features::extract_features;
pub use oracle::{BatchRuleList, DocumentAnalysis, RuleOracle};
pub use parse::{extract_json, parse_payload};
pub use retry::ResilientOracle;
pub use tfidf::similarity;

#[cfg(feature = "http")]
pub use http::LlmOracle;
