mod common;

use std::sync::Arc;

use common::{ScriptedOracle, config, corpus, reopen};
use stylus_analysis::{AnalysisDriver, AnalysisError, CancelFlag, Progress, RunStatus, progress};
use stylus_core::model::StopReason;
use stylus_store::{DocumentStore, Layout, StoreError};

/// 12 documents in batches of 3; identical batches never converge before
/// `min_batches = 5`, so the corpus is exhausted after 4 batches.
async fn cancelled_after(batch: &str) -> (tempfile::TempDir, RunStatus) {
    let (dir, store) = corpus(12);
    let flag = CancelFlag::new();
    let mut oracle = ScriptedOracle::new();
    oracle.cancel_after = Some((batch.to_string(), flag.clone()));

    let report = AnalysisDriver::new(store, oracle, config(3, 5, 5))
        .with_cancel_flag(flag)
        .run()
        .await
        .unwrap();
    (dir, report.status)
}

#[tokio::test]
async fn cancellation_stops_at_batch_boundary() {
    let (dir, status) = cancelled_after("batch_02").await;
    assert_eq!(status, RunStatus::Cancelled { batches_completed: 2 });

    match progress(&reopen(dir.path())).unwrap() {
        Progress::InProgress(info) => {
            assert_eq!(info.batches_completed, 2);
            assert_eq!(info.total_documents, 12);
        }
        other => panic!("expected in-progress log, got {other:?}"),
    }
}

#[tokio::test]
async fn resume_continues_after_recorded_batches() {
    let (dir, _) = cancelled_after("batch_02").await;
    let layout = Layout::new(dir.path());
    let before: Vec<Vec<u8>> = ["batch_01", "batch_02"]
        .iter()
        .map(|id| std::fs::read(layout.summary_path(id)).unwrap())
        .collect();
    let recorded = reopen(dir.path()).load_run_log().unwrap().unwrap().batches;

    let oracle = Arc::new(ScriptedOracle::new());
    let report = AnalysisDriver::new(reopen(dir.path()), oracle.clone(), config(3, 5, 5))
        .resume()
        .await
        .unwrap();

    assert_eq!(oracle.summarized_batches(), ["batch_03", "batch_04"]);
    assert_eq!(oracle.analyze_count(), 6);
    assert_eq!(report.run.batches.len(), 4);
    assert_eq!(&report.run.batches[..2], &recorded[..]);
    assert_eq!(report.run.stop_reason, Some(StopReason::Exhausted));
    assert_eq!(report.status, RunStatus::Completed);

    for (id, bytes) in ["batch_01", "batch_02"].iter().zip(&before) {
        assert_eq!(&std::fs::read(layout.summary_path(id)).unwrap(), bytes);
    }
}

#[tokio::test]
async fn resume_uses_the_logged_batch_size() {
    let (dir, _) = cancelled_after("batch_01").await;

    // Configuration now says 5 per batch; the log says 3.
    let report = AnalysisDriver::new(reopen(dir.path()), ScriptedOracle::new(), config(5, 5, 5))
        .resume()
        .await
        .unwrap();

    let sizes: Vec<usize> = report
        .run
        .batches
        .iter()
        .map(|b| b.document_ids.len())
        .collect();
    assert_eq!(sizes, [3, 3, 3, 3]);
    assert_eq!(report.run.batches[1].document_ids, ["doc_04", "doc_05", "doc_06"]);
}

#[tokio::test]
async fn completed_log_is_returned_unchanged() {
    let (dir, store) = corpus(4);
    let first = AnalysisDriver::new(store, ScriptedOracle::new(), config(2, 2, 5))
        .run()
        .await
        .unwrap();

    let oracle = Arc::new(ScriptedOracle::new());
    let again = AnalysisDriver::new(reopen(dir.path()), oracle.clone(), config(2, 2, 5))
        .resume()
        .await
        .unwrap();

    assert_eq!(again.run, first.run);
    assert_eq!(oracle.analyze_count() + oracle.summarize_count() + oracle.integrate_count(), 0);
}

#[tokio::test]
async fn crash_before_stop_decision_completes_without_new_batches() {
    let (dir, store) = corpus(4);
    AnalysisDriver::new(store, ScriptedOracle::new(), config(2, 2, 5))
        .run()
        .await
        .unwrap();

    // Rewind the log to the state right after the last batch was persisted.
    let store = reopen(dir.path());
    let mut run = store.load_run_log().unwrap().unwrap();
    run.end_time = None;
    run.final_guide = None;
    run.stop_reason = None;
    run.early_stop = false;
    store.save_run_log(&run).unwrap();
    std::fs::remove_file(Layout::new(dir.path()).style_guide_path()).unwrap();

    let oracle = Arc::new(ScriptedOracle::new());
    let report = AnalysisDriver::new(store, oracle.clone(), config(2, 2, 5))
        .resume()
        .await
        .unwrap();

    assert_eq!(oracle.analyze_count(), 0);
    assert_eq!(oracle.summarize_count(), 0);
    assert_eq!(report.run.batches.len(), 2);
    assert!(report.run.early_stop);
    assert!(reopen(dir.path()).load_style_guide().unwrap().is_some());
}

#[tokio::test]
async fn missing_report_on_resume_is_inconsistent() {
    let (dir, _) = cancelled_after("batch_01").await;
    std::fs::remove_file(Layout::new(dir.path()).report_path("doc_02")).unwrap();

    let err = AnalysisDriver::new(reopen(dir.path()), ScriptedOracle::new(), config(3, 5, 5))
        .resume()
        .await
        .unwrap_err();

    match err {
        AnalysisError::Persistence(StoreError::Inconsistent {
            batch_id,
            document_id,
        }) => {
            assert_eq!(batch_id, "batch_01");
            assert_eq!(document_id, "doc_02");
        }
        other => panic!("expected inconsistency, got {other:?}"),
    }
}

#[tokio::test]
async fn resume_without_log_starts_fresh() {
    let (_dir, store) = corpus(4);
    let report = AnalysisDriver::new(store, ScriptedOracle::new(), config(2, 2, 5))
        .resume()
        .await
        .unwrap();
    assert!(report.run.is_complete());
    assert_eq!(report.run.batches.len(), 2);
}

#[tokio::test]
async fn non_finite_oracle_numbers_do_not_break_resume() {
    let (dir, store) = corpus(6);
    let flag = CancelFlag::new();
    let mut oracle = ScriptedOracle::new();
    oracle.non_finite = true;
    oracle.cancel_after = Some(("batch_01".to_string(), flag.clone()));
    let first = AnalysisDriver::new(store, oracle, config(3, 2, 5))
        .with_cancel_flag(flag)
        .run()
        .await
        .unwrap();
    assert_eq!(first.status, RunStatus::Cancelled { batches_completed: 1 });

    let store = reopen(dir.path());
    let logged = store.load_run_log().unwrap().unwrap();
    assert_eq!(logged.batches[0].rules.len(), 3);
    for rule in &logged.batches[0].rules {
        assert_eq!((rule.frequency, rule.consistency_rate), (0.0, 0.0));
    }
    let cached = store.load_report("doc_01").unwrap().unwrap();
    assert!(cached.is_valid());
    assert!(!cached.feature_vector.contains_key("hedge_ratio"));
    assert!(cached.extracted_rules.iter().all(|r| r.consistency_rate == 0.0));

    let mut oracle = ScriptedOracle::new();
    oracle.non_finite = true;
    let report = AnalysisDriver::new(store, oracle, config(3, 2, 5))
        .resume()
        .await
        .unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.run.batches.len(), 2);
    assert!(matches!(progress(&reopen(dir.path())).unwrap(), Progress::Completed(_)));
}
