//! Typed oracle payloads.
//!
//! Models drift on field names and number formats, so the wire structs accept
//! aliases and loosely typed values and are converted into [`Rule`]s with
//! clamped rates.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use stylus_core::model::{FeatureVector, GlobalSynthesis, PatternMap, Rule};

/// A rule as a model writes it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireRule {
    #[serde(default)]
    pub rule_id: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub category: Option<Value>,
    #[serde(default)]
    pub frequency: Option<Value>,
    #[serde(default)]
    pub consistency_rate: Option<Value>,
    #[serde(default)]
    pub evidence: Option<Value>,
    #[serde(default)]
    pub variations: Option<Value>,
}

impl WireRule {
    /// `None` when the description is missing, blank, or not a string.
    pub fn into_rule(self) -> Option<Rule> {
        let description = match self.description {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => return None,
        };
        let frequency = self.frequency.as_ref().and_then(as_rate);
        let consistency = self.consistency_rate.as_ref().and_then(as_rate);

        Some(Rule {
            rule_id: self.rule_id.map(|v| as_text(&v)).unwrap_or_default(),
            description,
            category: self
                .category
                .map(|c| as_text(&c).trim().to_string())
                .unwrap_or_default(),
            frequency: frequency.or(consistency).unwrap_or(0.0),
            consistency_rate: consistency.or(frequency).unwrap_or(0.0),
            evidence: self.evidence.map(|v| as_text(&v)).unwrap_or_default(),
            variations: match self.variations {
                Some(Value::Array(items)) => items.iter().map(as_text).collect(),
                Some(Value::Null) | None => Vec::new(),
                Some(other) => vec![as_text(&other)],
            },
        })
    }
}

/// Payload of `analyze_document`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleListResponse {
    #[serde(default, alias = "extracted_rules", alias = "style_rules")]
    pub rules: Vec<WireRule>,
    #[serde(default, alias = "features")]
    pub feature_vector: BTreeMap<String, Value>,
}

impl RuleListResponse {
    pub fn rules(self) -> Vec<Rule> {
        into_rules(self.rules)
    }

    /// Numeric entries of the model-reported features; others are dropped.
    pub fn numeric_features(&self) -> FeatureVector {
        self.feature_vector
            .iter()
            .filter_map(|(k, v)| as_number(v).map(|n| (k.clone(), n)))
            .collect()
    }
}

/// Payload of `summarize_batch`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRuleListResponse {
    #[serde(
        default,
        alias = "comprehensive_rules",
        alias = "preliminary_rules"
    )]
    pub rules: Vec<WireRule>,
    #[serde(default)]
    pub common_patterns: BTreeMap<String, Value>,
}

impl BatchRuleListResponse {
    pub fn into_parts(self) -> (Vec<Rule>, PatternMap) {
        let patterns = self
            .common_patterns
            .into_iter()
            .map(|(kind, value)| {
                let fields = match value {
                    Value::Object(map) => map.into_iter().collect(),
                    other => BTreeMap::from([("value".to_string(), other)]),
                };
                (kind, fields)
            })
            .collect();
        (into_rules(self.rules), patterns)
    }
}

/// Payload of `integrate_global`.
pub type StyleGuidePayload = GlobalSynthesis;

fn into_rules(wire: Vec<WireRule>) -> Vec<Rule> {
    wire.into_iter().filter_map(WireRule::into_rule).collect()
}

fn as_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(pct) => pct.trim().parse::<f64>().ok()? / 100.0,
                None => s.parse().ok()?,
            }
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// A rate clamped into `[0, 1]`; NaN and non-numbers are absent.
fn as_rate(v: &Value) -> Option<f64> {
    as_number(v).map(|n| n.clamp(0.0, 1.0))
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_payload;

    #[test]
    fn batch_rules_accept_legacy_key() {
        let raw = r#"{"preliminary_rules": [{"description": "Hedge claims", "consistency_rate": 0.7}]}"#;
        let (rules, patterns) = parse_payload::<BatchRuleListResponse>(raw)
            .unwrap()
            .into_parts();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].frequency, 0.7);
        assert!(patterns.is_empty());
    }

    #[test]
    fn rates_are_clamped_and_coerced() {
        let raw = r#"{"comprehensive_rules": [
            {"description": "a", "frequency": 1.7, "consistency_rate": -0.2},
            {"description": "b", "frequency": "85%"},
            {"description": "c", "frequency": "0.4", "consistency_rate": "often"}
        ]}"#;
        let (rules, _) = parse_payload::<BatchRuleListResponse>(raw)
            .unwrap()
            .into_parts();
        assert_eq!(rules[0].frequency, 1.0);
        assert_eq!(rules[0].consistency_rate, 0.0);
        assert!((rules[1].frequency - 0.85).abs() < 1e-9);
        assert!((rules[1].consistency_rate - 0.85).abs() < 1e-9);
        assert_eq!(rules[2].frequency, 0.4);
        assert_eq!(rules[2].consistency_rate, 0.4);
    }

    #[test]
    fn blank_descriptions_dropped() {
        let raw = r#"{"rules": [{"description": "  "}, {"frequency": 0.5}, {"description": "kept"}]}"#;
        let rules = parse_payload::<RuleListResponse>(raw).unwrap().rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].description, "kept");
    }

    #[test]
    fn malformed_description_skips_only_that_rule() {
        let raw = r#"{"comprehensive_rules": [
            {"description": "Hedge claims", "frequency": 0.8},
            {"description": null, "frequency": 0.5},
            {"description": 12, "frequency": 0.4},
            {"description": ["list"], "category": null}
        ]}"#;
        let (rules, _) = parse_payload::<BatchRuleListResponse>(raw)
            .unwrap()
            .into_parts();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].description, "Hedge claims");
        assert_eq!(rules[0].frequency, 0.8);
    }

    #[test]
    fn loose_field_types() {
        let raw = r#"{"rules": [{"rule_id": 7, "description": "x", "variations": "one", "evidence": null}]}"#;
        let rules = parse_payload::<RuleListResponse>(raw).unwrap().rules();
        assert_eq!(rules[0].rule_id, "7");
        assert_eq!(rules[0].variations, vec!["one".to_string()]);
        assert_eq!(rules[0].evidence, "");
    }

    #[test]
    fn common_patterns_keep_objects_and_wrap_scalars() {
        let raw = r#"{"rules": [], "common_patterns": {
            "sentence": {"avg_length": 22, "style": "long"},
            "tone": "formal"
        }}"#;
        let (_, patterns) = parse_payload::<BatchRuleListResponse>(raw)
            .unwrap()
            .into_parts();
        assert_eq!(patterns["sentence"]["style"], "long");
        assert_eq!(patterns["tone"]["value"], "formal");
    }

    #[test]
    fn numeric_features_filtered() {
        let raw = r#"{"rules": [], "feature_vector": {"avg": 1.5, "label": "x", "pct": "50%"}}"#;
        let features = parse_payload::<RuleListResponse>(raw)
            .unwrap()
            .numeric_features();
        assert_eq!(features.len(), 2);
        assert_eq!(features["pct"], 0.5);
    }
}
