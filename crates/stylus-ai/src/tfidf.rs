//! TF-IDF cosine similarity between two texts.
//!
//! The vectorizer is fitted on exactly the two inputs: lowercased tokens of at
//! least two word characters, English stop words removed, the 1000 most frequent
//! terms kept, raw counts weighted by smoothed idf `ln((1+n)/(1+df)) + 1`, then
//! L2-normalized.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").unwrap());

static STOP_WORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

/// Vocabulary cap.
pub const MAX_FEATURES: usize = 1000;

/// Cosine similarity of the TF-IDF vectors of `a` and `b`, in `[0, 1]`.
///
/// Either text empty, or no term surviving stop-word removal, gives 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }

    let counts = [term_counts(a), term_counts(b)];
    let vocabulary = vocabulary(&counts);
    if vocabulary.is_empty() {
        return 0.0;
    }

    let n = counts.len() as f64;
    let idf: Vec<f64> = vocabulary
        .iter()
        .map(|term| {
            let df = counts.iter().filter(|c| c.contains_key(term)).count() as f64;
            ((1.0 + n) / (1.0 + df)).ln() + 1.0
        })
        .collect();

    let vectors: Vec<Vec<f64>> = counts
        .iter()
        .map(|c| {
            let mut v: Vec<f64> = vocabulary
                .iter()
                .zip(&idf)
                .map(|(term, w)| c.get(term).copied().unwrap_or(0) as f64 * w)
                .collect();
            normalize(&mut v);
            v
        })
        .collect();

    cosine_sim(&vectors[0], &vectors[1]).clamp(0.0, 1.0)
}

fn term_counts(text: &str) -> BTreeMap<String, usize> {
    let lower = text.to_lowercase();
    let mut counts = BTreeMap::new();
    for m in TOKEN_RE.find_iter(&lower) {
        let token = m.as_str();
        if !STOP_WORDS.contains(token) {
            *counts.entry(token.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Terms by descending corpus frequency, alphabetical on ties, capped at
/// [`MAX_FEATURES`].
fn vocabulary(counts: &[BTreeMap<String, usize>]) -> Vec<String> {
    let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
    for c in counts {
        for (term, n) in c {
            *totals.entry(term.as_str()).or_insert(0) += n;
        }
    }
    let mut terms: Vec<(&str, usize)> = totals.into_iter().collect();
    // Stable sort keeps alphabetical order among equal totals.
    terms.sort_by(|a, b| b.1.cmp(&a.1));
    terms.truncate(MAX_FEATURES);
    let mut vocab: Vec<String> = terms.into_iter().map(|(t, _)| t.to_string()).collect();
    vocab.sort();
    vocab
}

/// Dot product; inputs are already L2-normalized.
fn cosine_sim(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// L2-normalize a vector in place.
fn normalize(v: &mut [f64]) {
    let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can",
    "cannot", "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail", "do",
    "done", "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five",
    "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here", "hereafter",
    "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his", "how", "however",
    "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into", "is", "it", "its",
    "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd", "made", "many", "may",
    "me", "meanwhile", "might", "mill", "mine", "more", "moreover", "most", "mostly", "move",
    "much", "must", "my", "myself", "name", "namely", "neither", "never", "nevertheless", "next",
    "nine", "no", "nobody", "none", "noone", "nor", "not", "nothing", "now", "nowhere", "of",
    "off", "often", "on", "once", "one", "only", "onto", "or", "other", "others", "otherwise",
    "our", "ours", "ourselves", "out", "over", "own", "part", "per", "perhaps", "please", "put",
    "rather", "re", "same", "see", "seem", "seemed", "seeming", "seems", "serious", "several",
    "she", "should", "show", "side", "since", "sincere", "six", "sixty", "so", "some", "somehow",
    "someone", "something", "sometime", "sometimes", "somewhere", "still", "such", "system",
    "take", "ten", "than", "that", "the", "their", "them", "themselves", "then", "thence",
    "there", "thereafter", "thereby", "therefore", "therein", "thereupon", "these", "they",
    "thick", "thin", "third", "this", "those", "though", "three", "through", "throughout", "thru",
    "thus", "to", "together", "too", "top", "toward", "towards", "twelve", "twenty", "two", "un",
    "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were", "what",
    "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas", "whereby",
    "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who", "whoever",
    "whole", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet", "you",
    "your", "yours", "yourself", "yourselves",
];
