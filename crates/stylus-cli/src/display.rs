//! Human-readable rendering of run reports, progress, and style guides.
//!
//! Plain text goes to the terminal as aligned cards; Markdown is meant for
//! sharing the guide as a document.

use std::fmt::Write;

use stylus_analysis::{Progress, ProgressInfo, RunReport, RunStatus};
use stylus_core::model::{Rule, StyleGuide};

const MAX_LIST_ITEMS: usize = 10;

// ── Run and progress ──

pub fn print_run_report(report: &RunReport) {
    let run = &report.run;
    let headline = match &report.status {
        RunStatus::Completed => "Analysis complete",
        RunStatus::CompletedWithFailures { .. } => "Analysis complete (with failures)",
        RunStatus::Cancelled { .. } => "Analysis cancelled; resume with `stylus resume`",
    };
    println!("=== {headline} ===");
    print_field("documents", run.total_documents);
    print_field("batch size", run.batch_size);
    print_field("batches", run.batches.len());
    print_field("documents consumed", run.documents_consumed());
    print_field("early stop", yes_no(run.early_stop));
    if let Some(reason) = run.stop_reason {
        print_field("stop reason", format!("{reason:?}").to_lowercase());
    }

    if let RunStatus::CompletedWithFailures {
        failed_documents,
        failed_batches,
    } = &report.status
    {
        println!();
        println!("Failures");
        print_list("documents", failed_documents);
        print_list("batch summaries", failed_batches);
    }

    if let Some(guide) = &run.final_guide {
        println!();
        print!("{}", render_text(guide));
    }
}

pub fn print_progress(progress: &Progress) {
    match progress {
        Progress::NotStarted => println!("No analysis has been started."),
        Progress::InProgress(info) => print_progress_info("In progress", info),
        Progress::Completed(info) => print_progress_info("Completed", info),
    }
}

fn print_progress_info(status: &str, info: &ProgressInfo) {
    println!("=== {status} ===");
    print_field("documents", info.total_documents);
    print_field("batches completed", info.batches_completed);
    print_field("early stop", yes_no(info.early_stop));
    print_field("started", &info.start_time);
    if let Some(end) = &info.end_time {
        print_field("finished", end);
    }
}

fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<22} {}", label, value);
}

fn print_list(label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let shown = items.iter().take(MAX_LIST_ITEMS).cloned().collect::<Vec<_>>();
    let more = items.len().saturating_sub(MAX_LIST_ITEMS);
    if more > 0 {
        print_field(label, format!("{} (+{more} more)", shown.join(", ")));
    } else {
        print_field(label, shown.join(", "));
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

// ── Style guide ──

/// Terminal card: counts, then each bucket's rules one per line.
pub fn render_text(guide: &StyleGuide) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Style Guide ===");
    let _ = writeln!(out, "  {:<22} {}", "generated", guide.generated_at);
    let _ = writeln!(out, "  {:<22} {}", "documents analyzed", guide.total_documents_analyzed);
    let _ = writeln!(out, "  {:<22} {}", "batches", guide.total_batches);
    if let Some(m) = &guide.quality_metrics {
        let _ = writeln!(out, "  {:<22} {}", "avg frequency", percent(m.avg_frequency));
        let _ = writeln!(out, "  {:<22} {}", "avg consistency", percent(m.avg_consistency));
        let _ = writeln!(out, "  {:<22} {}", "high consistency", m.high_consistency_rules);
        let _ = writeln!(out, "  {:<22} {}", "reliability", percent(m.reliability_score));
    }

    for (title, rules) in buckets(guide) {
        if rules.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{title} ({})", rules.len());
        for rule in rules {
            let _ = writeln!(
                out,
                "  {:>4}  {}  [{}]",
                percent(rule.frequency),
                rule.description,
                rule.category
            );
        }
    }

    if !guide.rule_evolution.is_empty() {
        let _ = writeln!(out, "\nRule evolution");
        for evo in &guide.rule_evolution {
            let _ = writeln!(
                out,
                "  {:<12} +{} new of {}",
                evo.batch_id, evo.new_rules_count, evo.total_rules_count
            );
        }
    }
    out
}

/// Markdown document: overview, buckets grouped by category, evolution table.
pub fn render_markdown(guide: &StyleGuide) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Journal Style Guide\n");
    let _ = writeln!(
        out,
        "Generated {} from {} documents in {} batches.\n",
        guide.generated_at, guide.total_documents_analyzed, guide.total_batches
    );

    if let Some(overview) = guide
        .synthesis
        .as_ref()
        .map(|s| s.overview.trim())
        .filter(|s| !s.is_empty())
    {
        let _ = writeln!(out, "## Overview\n\n{overview}\n");
    }

    if let Some(m) = &guide.quality_metrics {
        let _ = writeln!(out, "## Quality\n");
        let _ = writeln!(out, "| Metric | Value |");
        let _ = writeln!(out, "|---|---:|");
        let _ = writeln!(out, "| Average frequency | {} |", percent(m.avg_frequency));
        let _ = writeln!(out, "| Average consistency | {} |", percent(m.avg_consistency));
        let _ = writeln!(out, "| Rules above 80% consistency | {} |", m.high_consistency_rules);
        let _ = writeln!(out, "| Reliability | {} |\n", percent(m.reliability_score));
    }

    for (title, rules) in buckets(guide) {
        if rules.is_empty() {
            continue;
        }
        let _ = writeln!(out, "## {title}\n");
        for (category, group) in by_category(rules) {
            let _ = writeln!(out, "### {category}\n");
            for rule in group {
                write_rule_markdown(&mut out, rule);
            }
            out.push('\n');
        }
    }

    if !guide.rule_evolution.is_empty() {
        let _ = writeln!(out, "## Rule Evolution\n");
        let _ = writeln!(out, "| Batch | New rules | Rules in batch |");
        let _ = writeln!(out, "|---|---:|---:|");
        for evo in &guide.rule_evolution {
            let _ = writeln!(
                out,
                "| {} | {} | {} |",
                evo.batch_id, evo.new_rules_count, evo.total_rules_count
            );
        }
    }
    out
}

fn write_rule_markdown(out: &mut String, rule: &Rule) {
    let _ = writeln!(
        out,
        "- **{}** (frequency {}, consistency {})",
        rule.description,
        percent(rule.frequency),
        percent(rule.consistency_rate)
    );
    if !rule.evidence.trim().is_empty() {
        let _ = writeln!(out, "  - Evidence: {}", rule.evidence.trim());
    }
    if !rule.variations.is_empty() {
        let _ = writeln!(out, "  - Variations: {}", rule.variations.join("; "));
    }
}

fn buckets(guide: &StyleGuide) -> [(&'static str, &[Rule]); 3] {
    [
        ("Frequent Patterns", guide.rule_buckets.frequent.as_slice()),
        ("Common Patterns", guide.rule_buckets.common.as_slice()),
        ("Alternative Patterns", guide.rule_buckets.alternative.as_slice()),
    ]
}

/// Groups in first-seen category order; rule order within a group is kept.
fn by_category(rules: &[Rule]) -> Vec<(&str, Vec<&Rule>)> {
    let mut groups: Vec<(&str, Vec<&Rule>)> = Vec::new();
    for rule in rules {
        let category = rule.category.as_str();
        match groups.iter_mut().find(|(c, _)| *c == category) {
            Some((_, group)) => group.push(rule),
            None => groups.push((category, vec![rule])),
        }
    }
    groups
}

fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stylus_core::model::{BatchEvolution, GlobalSynthesis, QualityMetrics, RuleBuckets};

    fn rule(description: &str, category: &str, frequency: f64) -> Rule {
        Rule {
            category: category.into(),
            ..Rule::new(description, frequency)
        }
    }

    fn guide() -> StyleGuide {
        StyleGuide {
            generated_at: "2026-02-21T10:00:00+00:00".into(),
            total_documents_analyzed: 12,
            total_batches: 3,
            rule_buckets: RuleBuckets {
                frequent: vec![
                    rule("Hedge claims", "Voice & Tone", 1.0),
                    rule("Open with the gap", "Narrative Strategies", 0.9),
                    rule("Use we for actions", "Voice & Tone", 0.7),
                ],
                common: vec![],
                alternative: vec![rule("Pose a rhetorical question", "Rhetorical Devices", 0.15)],
            },
            rule_evolution: vec![BatchEvolution {
                batch_id: "batch_01".into(),
                new_rules_count: 4,
                total_rules_count: 4,
            }],
            quality_metrics: Some(QualityMetrics {
                avg_frequency: 0.6875,
                avg_consistency: 0.6875,
                high_consistency_rules: 2,
                reliability_score: 0.6875,
            }),
            synthesis: Some(GlobalSynthesis {
                overview: "Measured, hedged prose.".into(),
                sections: Default::default(),
            }),
        }
    }

    #[test]
    fn markdown_groups_rules_by_category_in_first_seen_order() {
        let md = render_markdown(&guide());
        let voice = md.find("### Voice & Tone").unwrap();
        let narrative = md.find("### Narrative Strategies").unwrap();
        assert!(voice < narrative);
        assert_eq!(md.matches("### Voice & Tone").count(), 1);
        assert!(md.contains("- **Hedge claims** (frequency 100%, consistency 100%)"));
    }

    #[test]
    fn markdown_skips_empty_buckets_and_includes_overview() {
        let md = render_markdown(&guide());
        assert!(md.contains("## Overview\n\nMeasured, hedged prose."));
        assert!(md.contains("## Frequent Patterns"));
        assert!(!md.contains("## Common Patterns"));
        assert!(md.contains("| batch_01 | 4 | 4 |"));
        assert!(md.contains("| Rules above 80% consistency | 2 |"));
        assert!(md.find("## Quality").unwrap() < md.find("## Frequent Patterns").unwrap());
    }

    #[test]
    fn text_lists_bucket_sizes() {
        let text = render_text(&guide());
        assert!(text.contains("Frequent Patterns (3)"));
        assert!(text.contains("Alternative Patterns (1)"));
        assert!(text.contains(" 15%  Pose a rhetorical question  [Rhetorical Devices]"));
        assert!(text.contains("  avg consistency        69%"));
    }
}
