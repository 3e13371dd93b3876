//! Writing dimensions used to categorise style rules.
//!
//! Oracles usually tag each rule with a category, but the label vocabulary drifts
//! (legacy names, mixed case, Chinese aliases). Labels are folded onto eight
//! canonical dimensions; rules arriving without any label are assigned one by
//! keyword scoring of their description.

/// The eight canonical writing dimensions.
pub const DIMENSIONS: &[&str] = &[
    "Narrative Strategies",
    "Argumentation Patterns",
    "Rhetorical Devices",
    "Rhythm & Flow",
    "Voice & Tone",
    "Terminology Management",
    "Section Patterns",
    "Citation Artistry",
];

/// Fallback when nothing matches.
pub const DEFAULT_DIMENSION: &str = "General Patterns";

/// Legacy or alias label → canonical dimension. Keys are lowercase.
///
/// Order matters for [`categorize`]: the first alias found inside a description wins.
const ALIASES: &[(&str, &str)] = &[
    ("叙事策略", "Narrative Strategies"),
    ("论证模式", "Argumentation Patterns"),
    ("修辞手法", "Rhetorical Devices"),
    ("节奏流畅度", "Rhythm & Flow"),
    ("语态语气", "Voice & Tone"),
    ("术语管理", "Terminology Management"),
    ("章节模式", "Section Patterns"),
    ("引用艺术", "Citation Artistry"),
    ("sentence structure", "Rhythm & Flow"),
    ("句式结构", "Rhythm & Flow"),
    ("paragraph organization", "Section Patterns"),
    ("段落组织", "Section Patterns"),
    ("段落衔接", "Rhythm & Flow"),
    ("vocabulary", "Terminology Management"),
    ("词汇选择", "Terminology Management"),
    ("academic expression", "Voice & Tone"),
    ("学术表达", "Voice & Tone"),
    ("transitions", "Rhythm & Flow"),
    ("flow", "Rhythm & Flow"),
    ("引用论证", "Citation Artistry"),
    ("citation", "Citation Artistry"),
    ("references", "Citation Artistry"),
    ("逻辑论证", "Argumentation Patterns"),
    ("general", DEFAULT_DIMENSION),
    ("general rules", DEFAULT_DIMENSION),
    ("general patterns", DEFAULT_DIMENSION),
    ("其他", DEFAULT_DIMENSION),
];

/// Keyword hints per dimension, matched as lowercase substrings.
const KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Narrative Strategies",
        &[
            "narrative", "story", "opening", "hook", "arc", "context", "plot", "motivate",
            "背景", "叙事", "引入", "故事",
        ],
    ),
    (
        "Argumentation Patterns",
        &[
            "argument", "logic", "reasoning", "evidence", "claim", "hypothesis", "theor",
            "论证", "推理", "假设", "证据",
        ],
    ),
    (
        "Rhetorical Devices",
        &[
            "rhetoric", "metaphor", "analogy", "contrast", "emphasis", "parallel", "hedge",
            "强化", "修辞", "强调",
        ],
    ),
    (
        "Rhythm & Flow",
        &[
            "sentence", "length", "structure", "transition", "cohesion", "flow", "节奏",
            "过渡", "衔接", "句式",
        ],
    ),
    (
        "Voice & Tone",
        &[
            "voice", "tone", "first person", "we ", "our ", "assertive", "confidence",
            "态度", "语态", "语气",
        ],
    ),
    (
        "Terminology Management",
        &[
            "terminology", "term", "definition", "define", "jargon", "glossary", "术语",
            "定义", "名词",
        ],
    ),
    (
        "Section Patterns",
        &[
            "section", "introduction", "methods", "results", "discussion", "paragraph",
            "章节", "段落", "结构",
        ],
    ),
    (
        "Citation Artistry",
        &[
            "cite", "citation", "reference", "et al", "footnote", "bibliography", "引用",
            "文献", "参考",
        ],
    ),
];

/// Fold an oracle-supplied category label onto a canonical dimension.
///
/// Unknown non-empty labels are kept as given (trimmed); empty labels map to
/// [`DEFAULT_DIMENSION`].
pub fn normalize_label(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return DEFAULT_DIMENSION.to_string();
    }
    if DIMENSIONS.contains(&trimmed) {
        return trimmed.to_string();
    }

    let lower = trimmed.to_lowercase();
    if let Some((_, dim)) = ALIASES.iter().find(|(alias, _)| *alias == lower) {
        return (*dim).to_string();
    }
    if let Some(dim) = DIMENSIONS.iter().find(|d| d.to_lowercase() == lower) {
        return (*dim).to_string();
    }

    trimmed.to_string()
}

/// Assign a dimension to a rule description.
///
/// An alias phrase appearing in the description wins outright; otherwise the
/// dimension with the most keyword occurrences wins, first listed on ties.
pub fn categorize(description: &str) -> &'static str {
    let text = description.to_lowercase();
    if text.trim().is_empty() {
        return DEFAULT_DIMENSION;
    }

    if let Some((_, dim)) = ALIASES.iter().find(|(alias, _)| text.contains(alias)) {
        return dim;
    }

    let mut best = DEFAULT_DIMENSION;
    let mut best_score = 0usize;
    for (dim, keywords) in KEYWORDS {
        let score: usize = keywords.iter().map(|kw| text.matches(kw).count()).sum();
        if score > best_score {
            best_score = score;
            best = dim;
        }
    }
    best
}
