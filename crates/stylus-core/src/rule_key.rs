//! Deduplication identity for style rules.
//!
//! Two descriptions are the same rule when they differ only in whitespace or
//! letter case. Matching is otherwise exact.
//!
//! # Normalisation
//!
//! - Leading and trailing whitespace removed
//! - Internal whitespace runs (spaces, tabs, newlines) collapsed to one space
//! - Unicode lowercase
//!
//! Punctuation, word order, and wording are preserved.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalised rule description used as a map key during aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleKey(String);

impl RuleKey {
    /// Compute the key for a rule description.
    pub fn of(description: &str) -> Self {
        Self(normalize_description(description))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A description that is empty after trimming cannot identify a rule.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalise a rule description into its comparison form.
///
/// "  Prefer  the Passive\tvoice " → "prefer the passive voice"
pub fn normalize_description(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    out
}
