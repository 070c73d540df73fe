//! Session lifecycle controller.
//!
//! Owns the wizard session on the async side and reacts to UI commands,
//! emitting events plus a fresh snapshot for presentation layers. The UI
//! never touches the session directly.

use crate::coordinator::Completion;
use crate::error::AnalysisError;
use crate::export::{ExportKind, ExportPipeline};
use crate::model::{AnalysisConfig, AnalysisResult, SessionEvent};
use crate::remote::DocumentRenderer;
use crate::session::WizardSession;
use crate::validation::ValidationCheck;
use crate::wizard::StepId;
use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub enum UiCommand {
    SetTarget(Option<String>),
    TogglePredictor(String),
    ToggleInstrument(String),
    SetLags(Option<usize>),
    Next,
    Prev,
    GoTo(StepId),
    Export(ExportKind),
    Quit,
}

/// Everything a UI needs to render one frame of the session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub analysis: String,
    pub dataset_name: String,
    pub columns: Vec<String>,
    pub rows: usize,
    pub config: AnalysisConfig,
    pub uses_lags: bool,
    pub uses_instruments: bool,
    /// Derived bound surfaced on the settings step; identical by
    /// construction to the bound the lag check enforces.
    pub max_lag: usize,
    pub current_step: StepId,
    pub max_reached: StepId,
    pub checks: Vec<ValidationCheck>,
    pub all_passed: bool,
    pub pending: bool,
    pub has_result: bool,
    pub result_stale: bool,
    pub result: Option<AnalysisResult>,
}

pub fn snapshot(session: &WizardSession) -> SessionSnapshot {
    let report = session.gate();
    let all_passed = report.all_passed();
    SessionSnapshot {
        analysis: session.analysis().name().to_string(),
        dataset_name: session.dataset().name.clone(),
        columns: session.dataset().column_names(),
        rows: session.dataset().rows(),
        config: session.config().clone(),
        uses_lags: session.analysis().uses_lags(),
        uses_instruments: session.analysis().uses_instruments(),
        max_lag: session.max_lag(),
        current_step: session.current_step(),
        max_reached: session.max_reached(),
        checks: report.checks,
        all_passed,
        pending: session.is_pending(),
        has_result: session.has_cached_result(),
        result_stale: session.result_is_stale(),
        result: session.current_result().cloned(),
    }
}

/// Event plus the snapshot to render from.
#[derive(Debug)]
pub struct ControllerEvent {
    pub event: SessionEvent,
    pub snapshot: SessionSnapshot,
}

/// Drive one wizard session until the UI quits.
pub async fn run_controller(
    mut session: WizardSession,
    pipeline: ExportPipeline,
    renderer: Arc<dyn DocumentRenderer>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
    event_tx: UnboundedSender<ControllerEvent>,
) -> Result<()> {
    let mut exports: JoinSet<(ExportKind, Result<PathBuf, AnalysisError>)> = JoinSet::new();
    // Task id to kind, so even a panicked task reports the right kind.
    let mut export_kinds: HashMap<tokio::task::Id, ExportKind> = HashMap::new();

    let send = |event: SessionEvent, session: &WizardSession| {
        let _ = event_tx.send(ControllerEvent {
            event,
            snapshot: snapshot(session),
        });
    };

    send(SessionEvent::Updated, &session);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(UiCommand::Quit) => break,
                    Some(UiCommand::Export(kind)) => {
                        start_export(
                            kind,
                            &session,
                            &pipeline,
                            &renderer,
                            &mut exports,
                            &mut export_kinds,
                            &send,
                        );
                        send(SessionEvent::Updated, &session);
                    }
                    Some(cmd) => {
                        apply_command(&mut session, cmd, &send);
                        send(SessionEvent::Updated, &session);
                    }
                }
            }
            // The in-flight handle is borrowed inside this arm only; it must
            // not be taken out of the coordinator before the branch wins, or
            // completion would never be observed.
            maybe_done = async {
                match session.inflight_handle_mut() {
                    Some(handle) => Some(handle.await),
                    None => futures::future::pending().await,
                }
            } => {
                if let Some(join_res) = maybe_done {
                    match session.settle(join_res) {
                        Completion::Cached => send(SessionEvent::AnalysisSucceeded, &session),
                        Completion::DiscardedStale => send(
                            SessionEvent::AnalysisFailed {
                                title: "Result discarded".into(),
                                detail: "configuration changed while the analysis was running"
                                    .into(),
                            },
                            &session,
                        ),
                        Completion::Failed(e) => send(
                            SessionEvent::AnalysisFailed {
                                title: e.title().into(),
                                detail: e.to_string(),
                            },
                            &session,
                        ),
                    }
                }
            }
            Some(joined) = exports.join_next_with_id(), if !exports.is_empty() => {
                let event = match joined {
                    Ok((id, (kind, Ok(path)))) => {
                        export_kinds.remove(&id);
                        SessionEvent::ExportFinished { kind, path }
                    }
                    Ok((id, (kind, Err(e)))) => {
                        export_kinds.remove(&id);
                        SessionEvent::ExportFailed {
                            kind,
                            title: e.title().into(),
                            detail: e.to_string(),
                        }
                    }
                    Err(e) => {
                        let kind = export_kinds
                            .remove(&e.id())
                            .unwrap_or(ExportKind::Tabular);
                        SessionEvent::ExportFailed {
                            kind,
                            title: "Export task failed".into(),
                            detail: e.to_string(),
                        }
                    }
                };
                send(event, &session);
            }
        }
    }

    // Abandon unfinished export tasks; artifacts are only reported on
    // completion, so a torn file cannot be announced.
    exports.shutdown().await;
    Ok(())
}

fn apply_command(
    session: &mut WizardSession,
    cmd: UiCommand,
    send: &impl Fn(SessionEvent, &WizardSession),
) {
    match cmd {
        UiCommand::SetTarget(target) => session.set_target(target),
        UiCommand::TogglePredictor(name) => session.toggle_predictor(&name),
        UiCommand::ToggleInstrument(name) => session.toggle_instrument(&name),
        UiCommand::SetLags(lags) => session.set_lags(lags),
        UiCommand::Prev => {
            session.prev();
        }
        UiCommand::GoTo(step) => {
            session.go_to(step);
        }
        UiCommand::Next => {
            if let Err(e) = session.next() {
                send(
                    SessionEvent::AnalysisFailed {
                        title: e.title().into(),
                        detail: e.to_string(),
                    },
                    session,
                );
            }
        }
        UiCommand::Export(_) | UiCommand::Quit => unreachable!("handled by the caller"),
    }
}

fn start_export(
    kind: ExportKind,
    session: &WizardSession,
    pipeline: &ExportPipeline,
    renderer: &Arc<dyn DocumentRenderer>,
    exports: &mut JoinSet<(ExportKind, Result<PathBuf, AnalysisError>)>,
    export_kinds: &mut HashMap<tokio::task::Id, ExportKind>,
    send: &impl Fn(SessionEvent, &WizardSession),
) {
    // Exports read the current, non-stale result only.
    let result = match session.current_result() {
        Some(r) => r.clone(),
        None => {
            let e = AnalysisError::NoResult;
            send(
                SessionEvent::ExportFailed {
                    kind,
                    title: e.title().into(),
                    detail: e.to_string(),
                },
                session,
            );
            return;
        }
    };

    match kind {
        ExportKind::Tabular => {
            // Synchronous and local; delivered before the next frame.
            let event = match pipeline.export_tabular(session.analysis(), &result) {
                Ok(path) => SessionEvent::ExportFinished { kind, path },
                Err(e) => SessionEvent::ExportFailed {
                    kind,
                    title: e.title().into(),
                    detail: e.to_string(),
                },
            };
            send(event, session);
        }
        ExportKind::Image => {
            let analysis = session.analysis_handle();
            let pipeline = pipeline.clone();
            let handle = exports.spawn_blocking(move || {
                let res = pipeline.export_image(analysis.as_ref(), &result);
                (ExportKind::Image, res)
            });
            export_kinds.insert(handle.id(), ExportKind::Image);
        }
        ExportKind::Document => {
            let renderer = Arc::clone(renderer);
            let pipeline = pipeline.clone();
            let handle = exports.spawn(async move {
                let image = pipeline.existing_image(&result.analysis);
                let res = pipeline
                    .export_document(renderer.as_ref(), &result, image)
                    .await;
                (ExportKind::Document, res)
            });
            export_kinds.insert(handle.id(), ExportKind::Document);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyses::Autocorrelation;
    use crate::coordinator::Completion;
    use crate::model::{Column, Dataset};
    use crate::remote::ComputeBackend;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct OkBackend;

    #[async_trait]
    impl ComputeBackend for OkBackend {
        async fn analyze(
            &self,
            _kind: &str,
            _config: &AnalysisConfig,
            _dataset: &Dataset,
        ) -> Result<serde_json::Value, AnalysisError> {
            Ok(json!({
                "acf": [1.0, 0.3],
                "recommended_lag": 1,
                "summary": "s",
                "reasoning": "r",
                "statistics": {}
            }))
        }
    }

    struct PanickyRenderer;

    #[async_trait]
    impl DocumentRenderer for PanickyRenderer {
        async fn render(
            &self,
            _result: &AnalysisResult,
            _image_png: Option<&[u8]>,
        ) -> Result<Vec<u8>, AnalysisError> {
            panic!("renderer fell over")
        }
    }

    async fn cached_session() -> WizardSession {
        let mut s = WizardSession::new(
            Arc::new(Autocorrelation),
            Arc::new(OkBackend),
            Dataset {
                name: "d".into(),
                columns: vec![Column {
                    name: "y".into(),
                    values: (0..45).map(|i| i as f64).collect(),
                }],
            },
        );
        s.set_target(Some("y".into()));
        s.set_lags(Some(5));
        s.next().unwrap();
        s.next().unwrap();
        s.next().unwrap();
        let completion = s.run_pending_analysis().await.unwrap();
        assert!(matches!(completion, Completion::Cached));
        s
    }

    #[tokio::test]
    async fn panicked_document_export_reports_as_a_document_failure() {
        let session = cached_session().await;
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::new(dir.path());
        let renderer: Arc<dyn DocumentRenderer> = Arc::new(PanickyRenderer);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let controller =
            tokio::spawn(run_controller(session, pipeline, renderer, cmd_rx, event_tx));

        cmd_tx.send(UiCommand::Export(ExportKind::Document)).unwrap();
        let failed_kind = loop {
            let ev = event_rx.recv().await.expect("controller exited early");
            if let SessionEvent::ExportFailed { kind, .. } = ev.event {
                break kind;
            }
        };
        assert_eq!(failed_kind, ExportKind::Document);

        cmd_tx.send(UiCommand::Quit).unwrap();
        controller.await.unwrap().unwrap();
    }
}
