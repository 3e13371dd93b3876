//! Deterministic local text statistics for a document's feature vector.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use stylus_core::model::FeatureVector;

static SENTENCE_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+(\s+|$)").unwrap());
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z'-]*").unwrap());
static PASSIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(is|are|was|were|be|been|being)\s+(\w+ly\s+)?\w+(ed|en)\b").unwrap()
});
static ACADEMIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\w*(tion|sion|ment)|analy\w*|investig\w*|examin\w*|signific\w*|substantial\w*|considerable\w*)$",
    )
    .unwrap()
});

const COORDINATORS: &[&str] = &["and", "but", "or", "so", "yet", "for", "nor"];
const SUBORDINATORS: &[&str] = &[
    "because", "although", "while", "since", "if", "when", "where", "which", "that", "who",
];
const FIRST_PERSON: &[&str] = &["i", "we", "my", "our", "me", "us"];
const HEDGES: &[&str] = &[
    "may", "might", "could", "possibly", "perhaps", "likely", "suggest", "suggests", "appear",
    "appears", "seem", "seems", "somewhat", "relatively", "approximately",
];

/// Compute sentence, vocabulary, paragraph, and voice statistics.
///
/// Empty or whitespace-only text yields an empty vector.
pub fn extract_features(text: &str) -> FeatureVector {
    let mut fv = FeatureVector::new();
    if text.trim().is_empty() {
        return fv;
    }

    let sentences = split_sentences(text);
    let sentence_lengths: Vec<f64> = sentences.iter().map(|s| words(s).len() as f64).collect();
    if !sentence_lengths.is_empty() {
        let lowered: Vec<String> = sentences.iter().map(|s| s.to_lowercase()).collect();
        let share = |list: &[&str]| {
            lowered
                .iter()
                .filter(|s| words(s).iter().any(|w| list.contains(w)))
                .count() as f64
                / lowered.len() as f64
        };
        fv.insert("total_sentences".into(), sentences.len() as f64);
        fv.insert("avg_sentence_length".into(), mean(&sentence_lengths));
        fv.insert("sentence_length_variance".into(), variance(&sentence_lengths));
        fv.insert("max_sentence_length".into(), max(&sentence_lengths));
        fv.insert("min_sentence_length".into(), min(&sentence_lengths));
        fv.insert("compound_sentence_ratio".into(), share(COORDINATORS));
        fv.insert("complex_sentence_ratio".into(), share(SUBORDINATORS));
        let passive = sentences.iter().filter(|s| PASSIVE_RE.is_match(s)).count();
        fv.insert(
            "passive_voice_ratio".into(),
            passive as f64 / sentences.len() as f64,
        );
    }

    let lower = text.to_lowercase();
    let all_words = words(&lower);
    if !all_words.is_empty() {
        let total = all_words.len() as f64;
        let unique: HashSet<&str> = all_words.iter().copied().collect();
        let count_in =
            |list: &[&str]| all_words.iter().filter(|w| list.contains(*w)).count() as f64;
        let academic = all_words.iter().filter(|w| ACADEMIC_RE.is_match(w)).count() as f64;
        let letters: usize = all_words.iter().map(|w| w.chars().count()).sum();

        fv.insert("total_words".into(), total);
        fv.insert("unique_words".into(), unique.len() as f64);
        fv.insert("vocabulary_richness".into(), unique.len() as f64 / total);
        fv.insert("avg_word_length".into(), letters as f64 / total);
        fv.insert("academic_word_ratio".into(), academic / total);
        fv.insert("first_person_ratio".into(), count_in(FIRST_PERSON) / total);
        fv.insert("hedge_word_ratio".into(), count_in(HEDGES) / total);
    }

    let paragraph_lengths: Vec<f64> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| words(p).len() as f64)
        .collect();
    if !paragraph_lengths.is_empty() {
        fv.insert("total_paragraphs".into(), paragraph_lengths.len() as f64);
        fv.insert("avg_paragraph_length".into(), mean(&paragraph_lengths));
    }

    fv
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END_RE.find_iter(text) {
        push_sentence(&mut out, &text[start..m.end()]);
        start = m.end();
    }
    push_sentence(&mut out, &text[start..]);
    out
}

fn push_sentence<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if WORD_RE.is_match(s) {
        out.push(s);
    }
}

fn words(text: &str) -> Vec<&str> {
    WORD_RE.find_iter(text).map(|m| m.as_str()).collect()
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population variance.
fn variance(xs: &[f64]) -> f64 {
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64
}

fn max(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::MIN, f64::max)
}

fn min(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::MAX, f64::min)
}
