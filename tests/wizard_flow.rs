//! End-to-end wizard flows against a scripted compute backend.

use async_trait::async_trait;
use guided_stats_cli::analyses::{Analysis, Autocorrelation};
use guided_stats_cli::coordinator::Completion;
use guided_stats_cli::error::AnalysisError;
use guided_stats_cli::export::ExportPipeline;
use guided_stats_cli::model::{AnalysisConfig, AnalysisResult, Column, Dataset};
use guided_stats_cli::remote::{ComputeBackend, DocumentRenderer};
use guided_stats_cli::session::{NextAction, WizardSession};
use guided_stats_cli::wizard::StepId;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Backend that replays a queue of canned responses and counts calls.
struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<serde_json::Value, AnalysisError>>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(responses: Vec<Result<serde_json::Value, AnalysisError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComputeBackend for ScriptedBackend {
    async fn analyze(
        &self,
        _kind: &str,
        _config: &AnalysisConfig,
        _dataset: &Dataset,
    ) -> Result<serde_json::Value, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AnalysisError::network("script exhausted")))
    }
}

fn acf_payload() -> serde_json::Value {
    json!({
        "acf": [1.0, 0.62, 0.31, 0.12],
        "recommended_lag": 2,
        "summary": "Autocorrelation decays quickly.",
        "reasoning": "The series is consistent with a short-memory process.",
        "statistics": { "ljung_box_p": 0.04 }
    })
}

fn dataset(rows: usize) -> Dataset {
    let series = |offset: f64| (0..rows).map(|i| offset + i as f64).collect();
    Dataset {
        name: "demo.csv".into(),
        columns: vec![
            Column { name: "y".into(), values: series(0.0) },
            Column { name: "x1".into(), values: series(10.0) },
        ],
    }
}

fn session_with(
    rows: usize,
    backend: Arc<ScriptedBackend>,
) -> WizardSession {
    WizardSession::new(Arc::new(Autocorrelation), backend, dataset(rows))
}

/// Walk Variables -> Settings -> Validation with the given lag.
fn walk_to_validation(session: &mut WizardSession, lags: usize) {
    session.set_target(Some("y".into()));
    assert_eq!(session.next().unwrap(), NextAction::Moved);
    session.set_lags(Some(lags));
    assert_eq!(session.next().unwrap(), NextAction::Moved);
    assert_eq!(session.current_step(), StepId::Validation);
}

#[tokio::test]
async fn lag_over_bound_blocks_then_corrected_run_succeeds() {
    // 45 rows bound the lag at 45/2 - 1 = 21.
    let backend = ScriptedBackend::new(vec![Ok(acf_payload())]);
    let mut session = session_with(45, Arc::clone(&backend));
    walk_to_validation(&mut session, 40);

    assert_eq!(session.max_lag(), 21);
    assert!(!session.gate().all_passed());
    let err = session.next().unwrap_err();
    assert!(matches!(err, AnalysisError::Validation { .. }));
    assert_eq!(backend.calls(), 0);
    assert_eq!(session.current_step(), StepId::Validation);

    session.set_lags(Some(21));
    assert!(session.gate().all_passed());
    assert_eq!(session.next().unwrap(), NextAction::Submitted);
    let completion = session.run_pending_analysis().await.unwrap();
    assert!(matches!(completion, Completion::Cached));
    assert_eq!(session.current_step(), StepId::Summary);
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn network_failure_keeps_user_on_validation_and_retry_works() {
    let backend = ScriptedBackend::new(vec![
        Err(AnalysisError::network("connection refused")),
        Ok(acf_payload()),
    ]);
    let mut session = session_with(60, Arc::clone(&backend));
    walk_to_validation(&mut session, 5);

    assert_eq!(session.next().unwrap(), NextAction::Submitted);
    let completion = session.run_pending_analysis().await.unwrap();
    assert!(matches!(completion, Completion::Failed(AnalysisError::Network { .. })));
    assert_eq!(session.current_step(), StepId::Validation);
    assert!(!session.has_cached_result());

    assert_eq!(session.next().unwrap(), NextAction::Submitted);
    let completion = session.run_pending_analysis().await.unwrap();
    assert!(matches!(completion, Completion::Cached));
    assert_eq!(session.current_step(), StepId::Summary);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn malformed_response_leaves_user_on_validation_without_auto_advance() {
    let backend = ScriptedBackend::new(vec![Ok(json!({"summary": "only this"}))]);
    let mut session = session_with(60, backend);
    walk_to_validation(&mut session, 5);

    assert_eq!(session.next().unwrap(), NextAction::Submitted);
    let completion = session.run_pending_analysis().await.unwrap();
    assert!(matches!(completion, Completion::Failed(AnalysisError::Schema { .. })));
    assert_eq!(session.current_step(), StepId::Validation);
    assert!(session.current_result().is_none());
}

#[tokio::test]
async fn variable_change_resets_progress_and_seals_result_steps() {
    let backend = ScriptedBackend::new(vec![Ok(acf_payload())]);
    let mut session = session_with(60, backend);
    walk_to_validation(&mut session, 5);
    session.next().unwrap();
    session.run_pending_analysis().await.unwrap();
    assert!(session.go_to(StepId::FullStatistics));

    session.set_target(Some("x1".into()));

    assert_eq!(session.current_step(), StepId::Variables);
    assert!(!session.has_cached_result());
    assert!(!session.go_to(StepId::FullStatistics));
    assert_eq!(session.current_step(), StepId::Variables);
}

#[tokio::test]
async fn settings_change_marks_result_stale_but_keeps_the_escape_hatch() {
    let backend = ScriptedBackend::new(vec![Ok(acf_payload())]);
    let mut session = session_with(60, backend);
    walk_to_validation(&mut session, 5);
    session.next().unwrap();
    session.run_pending_analysis().await.unwrap();

    session.set_lags(Some(7));

    assert!(session.has_cached_result());
    assert!(session.result_is_stale());
    assert!(session.current_result().is_none());
    // Result steps stay reachable while any cached result exists.
    assert!(session.go_to(StepId::FullStatistics));
}

#[tokio::test]
async fn exports_do_not_touch_progress_or_cache() {
    let backend = ScriptedBackend::new(vec![Ok(acf_payload())]);
    let mut session = session_with(60, backend);
    walk_to_validation(&mut session, 5);
    session.next().unwrap();
    session.run_pending_analysis().await.unwrap();
    assert_eq!(session.current_step(), StepId::Summary);

    let dir = tempfile::tempdir().unwrap();
    let pipeline = ExportPipeline::new(dir.path());
    let result = session.current_result().unwrap().clone();
    let analysis = session.analysis_handle();

    let csv_path = pipeline.export_tabular(analysis.as_ref(), &result).unwrap();
    let png_path = pipeline.export_image(analysis.as_ref(), &result).unwrap();

    // <AnalysisName>_<YYYY-MM-DD>.<ext>
    let name = csv_path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("Autocorrelation_"));
    assert!(name.ends_with(".csv"));
    let date = &name["Autocorrelation_".len()..name.len() - ".csv".len()];
    assert_eq!(date.len(), 10);
    assert_eq!(&date[4..5], "-");
    assert_eq!(&date[7..8], "-");
    assert_eq!(png_path.extension().and_then(|e| e.to_str()), Some("png"));

    let text = std::fs::read_to_string(&csv_path).unwrap();
    assert!(text.contains("recommended_lag"));
    assert!(text.contains("Autocorrelation decays quickly."));
    // The tabular subset excludes the heavyweight fields.
    assert!(!text.contains("ljung_box_p"));

    assert_eq!(session.current_step(), StepId::Summary);
    assert_eq!(session.max_reached(), StepId::Summary);
    assert!(!session.result_is_stale());
    assert_eq!(session.current_result().unwrap().payload, result.payload);
}

#[tokio::test]
async fn document_export_bundles_a_previous_image_artifact() {
    struct EchoRenderer;
    #[async_trait]
    impl DocumentRenderer for EchoRenderer {
        async fn render(
            &self,
            _result: &AnalysisResult,
            image_png: Option<&[u8]>,
        ) -> Result<Vec<u8>, AnalysisError> {
            Ok(if image_png.is_some() {
                b"with-image".to_vec()
            } else {
                b"no-image".to_vec()
            })
        }
    }

    let backend = ScriptedBackend::new(vec![Ok(acf_payload())]);
    let mut session = session_with(60, backend);
    walk_to_validation(&mut session, 5);
    session.next().unwrap();
    session.run_pending_analysis().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let pipeline = ExportPipeline::new(dir.path());
    let result = session.current_result().unwrap().clone();
    let analysis = session.analysis_handle();

    // No image rendered yet.
    let doc = pipeline
        .export_document(&EchoRenderer, &result, pipeline.existing_image(analysis.name()))
        .await
        .unwrap();
    assert_eq!(std::fs::read(&doc).unwrap(), b"no-image".to_vec());

    // After an image export the document picks it up.
    pipeline.export_image(analysis.as_ref(), &result).unwrap();
    let doc = pipeline
        .export_document(&EchoRenderer, &result, pipeline.existing_image(analysis.name()))
        .await
        .unwrap();
    assert_eq!(std::fs::read(&doc).unwrap(), b"with-image".to_vec());
    assert_eq!(doc.extension().and_then(|e| e.to_str()), Some("docx"));
}

#[tokio::test]
async fn result_step_jump_without_any_result_is_ignored() {
    let backend = ScriptedBackend::new(vec![]);
    let mut session = session_with(60, backend);
    session.set_target(Some("y".into()));
    session.next().unwrap();

    assert!(!session.go_to(StepId::Summary));
    assert_eq!(session.current_step(), StepId::Settings);
    // Backtracking over visited ground always works.
    assert!(session.go_to(StepId::Variables));
}
