//! Recovery of a JSON object from free-form model output.
//!
//! Strategies, in order:
//! 1. strip a leading ```` ```json ```` / ```` ``` ```` and a trailing ```` ``` ````, parse directly
//! 2. extract the first fenced block anywhere in the text
//! 3. balanced-brace scan (string-aware) from each `{`
//! 4. the largest `{...}` span
//!
//! Only JSON objects are accepted; a bare array or scalar is a failure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ParseFailure;

static OBJECT_SPAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Upper bound on `{` start positions tried by the balanced scan.
const MAX_SCAN_STARTS: usize = 64;

/// Recover the JSON object embedded in `raw`.
pub fn extract_json(raw: &str) -> Result<Value, ParseFailure> {
    let cleaned = strip_fences(raw);
    if cleaned.is_empty() {
        return Err(ParseFailure::new("empty response", raw));
    }

    if let Some(v) = parse_object(cleaned) {
        return Ok(v);
    }

    if let Some(block) = fenced_block(cleaned)
        && let Some(v) = parse_object(block)
    {
        debug!("recovered JSON from fenced block");
        return Ok(v);
    }

    for candidate in balanced_objects(cleaned, MAX_SCAN_STARTS) {
        if let Some(v) = parse_object(candidate) {
            debug!("recovered JSON by brace matching");
            return Ok(v);
        }
    }

    if let Some(m) = OBJECT_SPAN_RE.find(raw)
        && let Some(v) = parse_object(m.as_str())
    {
        debug!("recovered JSON from widest brace span");
        return Ok(v);
    }

    Err(ParseFailure::new("no JSON object could be recovered", raw))
}

/// Recover and decode a typed payload.
pub fn parse_payload<T: DeserializeOwned>(raw: &str) -> Result<T, ParseFailure> {
    let value = extract_json(raw)?;
    serde_json::from_value(value)
        .map_err(|e| ParseFailure::new(format!("unexpected payload shape: {e}"), raw))
}

fn parse_object(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

fn strip_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Body of the first ```` ```json ```` (or bare ```` ``` ````) block; an unclosed
/// fence runs to the end of the text.
fn fenced_block(text: &str) -> Option<&str> {
    let (start, fence_len) = match text.find("```json") {
        Some(i) => (i, "```json".len()),
        None => (text.find("```")?, "```".len()),
    };
    let body = &text[start + fence_len..];
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    let body = body.trim();
    (!body.is_empty()).then_some(body)
}

/// Brace-balanced `{...}` slices from the first `max_starts` `{` positions,
/// ignoring braces inside JSON strings.
fn balanced_objects(text: &str, max_starts: usize) -> impl Iterator<Item = &str> {
    text.match_indices('{')
        .take(max_starts)
        .filter_map(move |(start, _)| balanced_from(text, start))
}

fn balanced_from(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
