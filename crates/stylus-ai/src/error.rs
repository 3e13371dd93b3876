use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Longest raw-response excerpt kept in a [`ParseFailure`].
pub const EXCERPT_CHARS: usize = 500;

/// The oracle replied, but no usable JSON payload could be recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub reason: String,
    /// Start of the raw response, truncated to [`EXCERPT_CHARS`].
    pub excerpt: String,
    pub response_len: usize,
}

impl ParseFailure {
    pub fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            excerpt: raw.chars().take(EXCERPT_CHARS).collect(),
            response_len: raw.len(),
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes, starts: {:?})",
            self.reason, self.response_len, self.excerpt
        )
    }
}

impl std::error::Error for ParseFailure {}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle call timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("unparseable oracle response: {0}")]
    Parse(#[from] ParseFailure),

    #[error("oracle misconfigured: {0}")]
    Misconfigured(String),
}

impl OracleError {
    /// Worth retrying: timeouts, transport failures, 5xx and 429.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport(_) => true,
            Self::Server { status, .. } => *status >= 500 || *status == 429,
            Self::Parse(_) | Self::Misconfigured(_) => false,
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}
