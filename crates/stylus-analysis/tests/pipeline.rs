mod common;

use std::sync::Arc;

use common::{Failure, RULES, ScriptedOracle, config, corpus, opening_pattern, reopen};
use stylus_analysis::{AnalysisDriver, AnalysisError, RunStatus, get_style_guide};
use stylus_core::model::StopReason;
use stylus_store::DocumentStore;

/// Batch 1 differs from batches 2 and 3 only in its reported patterns.
fn converging_oracle() -> ScriptedOracle {
    let mut oracle = ScriptedOracle::new();
    oracle.patterns.insert(
        "batch_01".into(),
        opening_pattern(&[("style", "anecdote narrative vignette")]),
    );
    for id in ["batch_02", "batch_03", "batch_04", "batch_05"] {
        oracle
            .patterns
            .insert(id.into(), opening_pattern(&[("style", "gap")]));
    }
    oracle
}

#[tokio::test]
async fn twelve_documents_converge_at_third_batch() {
    let (dir, store) = corpus(12);
    let oracle = Arc::new(converging_oracle());
    let driver = AnalysisDriver::new(store, oracle.clone(), config(5, 2, 5));

    let report = driver.run().await.unwrap();
    let run = &report.run;

    let ids: Vec<&str> = run.batches.iter().map(|b| b.batch_id.as_str()).collect();
    assert_eq!(ids, ["batch_01", "batch_02", "batch_03"]);
    assert!(run.early_stop);
    assert_eq!(run.stop_reason, Some(StopReason::Converged));
    assert!(run.is_complete());
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(run.batches[2].document_ids, ["doc_11", "doc_12"]);

    let guide = run.final_guide.as_ref().unwrap();
    assert_eq!(guide.total_batches, 3);
    assert_eq!(guide.total_documents_analyzed, 12);
    assert_eq!(guide.rule_buckets.frequent.len(), 3);
    assert!(guide.rule_buckets.common.is_empty());
    assert!(guide.rule_buckets.alternative.is_empty());
    for rule in &guide.rule_buckets.frequent {
        assert!(RULES.contains(&rule.description.as_str()));
        assert_eq!(rule.frequency, 1.0);
    }
    assert_eq!(guide.evolution_for("batch_01").unwrap().new_rules_count, 3);
    assert_eq!(guide.evolution_for("batch_02").unwrap().new_rules_count, 0);
    assert_eq!(
        guide.synthesis.as_ref().unwrap().overview,
        "3 batches integrated"
    );

    let persisted = get_style_guide(&reopen(dir.path())).unwrap().unwrap();
    assert_eq!(&persisted, guide);
    assert_eq!(oracle.analyze_count(), 12);
    assert_eq!(oracle.integrate_count(), 1);
}

#[tokio::test]
async fn failing_document_is_isolated() {
    let (dir, store) = corpus(6);
    let mut oracle = ScriptedOracle::new();
    oracle
        .failing_documents
        .insert("doc_03".into(), Failure::Timeout);
    let oracle = Arc::new(oracle);
    let driver = AnalysisDriver::new(store, oracle.clone(), config(6, 1, 5));

    let report = driver.run().await.unwrap();

    let batch = &report.run.batches[0];
    assert!(batch.success);
    assert_eq!(batch.failed_documents, ["doc_03"]);
    assert_eq!(batch.analyzed_count, 6);
    assert_eq!(batch.rules.len(), 3);
    // The summary saw the errored report too.
    assert_eq!(*oracle.summarized.lock().unwrap(), [("batch_01".to_string(), 6)]);

    let stored = reopen(dir.path()).load_report("doc_03").unwrap().unwrap();
    assert!(stored.error.as_deref().unwrap().contains("timed out"));
    assert!(stored.parse_error.is_none());

    assert_eq!(
        report.status,
        RunStatus::CompletedWithFailures {
            failed_documents: vec!["doc_03".into()],
            failed_batches: vec![],
        }
    );
    assert!(!report.run.early_stop);
    assert_eq!(report.run.stop_reason, Some(StopReason::Exhausted));
}

#[tokio::test]
async fn second_run_reuses_every_cached_report() {
    let (dir, store) = corpus(12);
    let first = Arc::new(converging_oracle());
    AnalysisDriver::new(store, first.clone(), config(5, 2, 5))
        .run()
        .await
        .unwrap();

    let second = Arc::new(converging_oracle());
    let report = AnalysisDriver::new(reopen(dir.path()), second.clone(), config(5, 2, 5))
        .run()
        .await
        .unwrap();

    assert_eq!(second.analyze_count(), 0);
    assert_eq!(second.summarize_count(), 3);
    for batch in &report.run.batches {
        assert_eq!(batch.analyzed_count, 0);
        assert_eq!(batch.skipped_count, batch.document_ids.len());
    }
}

#[tokio::test]
async fn failed_reports_are_regenerated() {
    let (dir, store) = corpus(6);
    let mut flaky = ScriptedOracle::new();
    flaky
        .failing_documents
        .insert("doc_02".into(), Failure::Unparseable);
    AnalysisDriver::new(store, flaky, config(6, 1, 5))
        .run()
        .await
        .unwrap();
    let stored = reopen(dir.path()).load_report("doc_02").unwrap().unwrap();
    assert!(stored.parse_error.is_some());

    let healthy = Arc::new(ScriptedOracle::new());
    let report = AnalysisDriver::new(reopen(dir.path()), healthy.clone(), config(6, 1, 5))
        .run()
        .await
        .unwrap();

    assert_eq!(healthy.analyze_count(), 1);
    assert_eq!(report.status, RunStatus::Completed);
    assert!(reopen(dir.path()).load_report("doc_02").unwrap().unwrap().is_valid());
}

#[tokio::test]
async fn unparseable_batch_summary_does_not_fail_the_run() {
    let (_dir, store) = corpus(6);
    let mut oracle = ScriptedOracle::new();
    oracle
        .failing_batches
        .insert("batch_01".into(), Failure::Unparseable);
    let report = AnalysisDriver::new(store, oracle, config(3, 2, 5))
        .run()
        .await
        .unwrap();

    let first = &report.run.batches[0];
    assert!(!first.success);
    assert!(first.rules.is_empty());
    assert!(first.parse_error.is_some());
    assert!(first.error.is_none());
    // A failed predecessor compares as empty text, so the run keeps going.
    assert_eq!(report.run.batches.len(), 2);
    assert!(!report.run.early_stop);

    assert_eq!(
        report.status,
        RunStatus::CompletedWithFailures {
            failed_documents: vec![],
            failed_batches: vec!["batch_01".into()],
        }
    );
    let guide = report.run.final_guide.unwrap();
    let evo = guide.evolution_for("batch_01").unwrap();
    assert_eq!((evo.new_rules_count, evo.total_rules_count), (0, 0));
    assert_eq!(guide.rule_buckets.frequent.len(), 3);
}

#[tokio::test]
async fn synthesis_failure_leaves_guide_without_it() {
    let (_dir, store) = corpus(4);
    let mut oracle = ScriptedOracle::new();
    oracle.failing_synthesis = true;
    let oracle = Arc::new(oracle);
    let report = AnalysisDriver::new(store, oracle.clone(), config(2, 2, 5))
        .run()
        .await
        .unwrap();

    let guide = report.run.final_guide.unwrap();
    assert!(guide.synthesis.is_none());
    assert_eq!(guide.rule_buckets.frequent.len(), 3);
    assert_eq!(oracle.integrate_count(), 1);
}

#[tokio::test]
async fn max_documents_caps_the_corpus() {
    let (_dir, store) = corpus(12);
    let mut cfg = config(2, 5, 5);
    cfg.max_documents = Some(4);
    let report = AnalysisDriver::new(store, ScriptedOracle::new(), cfg)
        .run()
        .await
        .unwrap();

    assert_eq!(report.run.total_documents, 4);
    assert_eq!(report.run.batches.len(), 2);
    assert_eq!(report.run.documents_consumed(), 4);
}

#[tokio::test]
async fn empty_corpus_is_an_error() {
    let (_dir, store) = corpus(0);
    let err = AnalysisDriver::new(store, ScriptedOracle::new(), config(5, 2, 5))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::CorpusEmpty));
}

#[tokio::test]
async fn invalid_config_is_rejected_before_running() {
    let (dir, store) = corpus(3);
    let err = AnalysisDriver::new(store, ScriptedOracle::new(), config(0, 2, 5))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    assert!(reopen(dir.path()).load_run_log().unwrap().is_none());
}
