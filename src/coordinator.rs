//! Single-flight analysis request coordination.
//!
//! At most one request to the computation boundary is ever outstanding.
//! Each request is tagged with the config it was issued for; a response that
//! resolves after the config has moved on is discarded rather than cached,
//! so a stale payload can never be presented as current.

use crate::analyses::Analysis;
use crate::error::AnalysisError;
use crate::model::{now_rfc3339, AnalysisConfig, AnalysisRequest, AnalysisResult, Dataset};
use crate::remote::ComputeBackend;
use crate::validation::ValidationReport;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Pending,
    Succeeded,
    Failed,
}

/// How a resolved request was settled.
#[derive(Debug)]
pub enum Completion {
    /// Schema-valid response for the current config; now cached.
    Cached,
    /// Response arrived for a config that is no longer current. Dropped.
    DiscardedStale,
    /// The request failed. A previously cached result is left untouched;
    /// cache validity is governed solely by config equality.
    Failed(AnalysisError),
}

struct Inflight {
    request: AnalysisRequest,
    handle: JoinHandle<Result<serde_json::Value, AnalysisError>>,
}

pub struct AnalysisCoordinator {
    analysis: Arc<dyn Analysis>,
    backend: Arc<dyn ComputeBackend>,
    state: CoordinatorState,
    inflight: Option<Inflight>,
    cached: Option<AnalysisResult>,
}

impl AnalysisCoordinator {
    pub fn new(analysis: Arc<dyn Analysis>, backend: Arc<dyn ComputeBackend>) -> Self {
        Self {
            analysis,
            backend,
            state: CoordinatorState::Idle,
            inflight: None,
            cached: None,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, CoordinatorState::Pending)
    }

    /// Whether any result has ever been cached, stale or not. Drives the
    /// wizard's result-step escape hatch.
    pub fn has_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// The cached result, only if it was produced by exactly `current`.
    /// Export and summary display must go through here.
    pub fn current_result(&self, current: &AnalysisConfig) -> Option<&AnalysisResult> {
        self.cached.as_ref().filter(|r| r.config == *current)
    }

    /// Issue one request to the computation boundary.
    ///
    /// Rejects with `Busy` while a request is outstanding (no queueing, no
    /// duplicate outbound call) and with `Validation` when the gate has not
    /// passed. Transitions to pending synchronously on acceptance.
    pub fn submit(
        &mut self,
        config: &AnalysisConfig,
        dataset: &Arc<Dataset>,
        report: &ValidationReport,
    ) -> Result<(), AnalysisError> {
        if self.is_pending() {
            return Err(AnalysisError::Busy);
        }
        if !report.all_passed() {
            let detail = report
                .first_failure()
                .map(|c| c.label.clone())
                .unwrap_or_else(|| "checks not passed".into());
            return Err(AnalysisError::Validation { message: detail });
        }

        let request = AnalysisRequest::new(config.clone());
        let backend = Arc::clone(&self.backend);
        let kind = self.analysis.kind();
        let task_config = config.clone();
        let task_dataset = Arc::clone(dataset);
        tracing::info!(analysis = kind, "analysis request issued");
        let handle =
            tokio::spawn(async move { backend.analyze(kind, &task_config, &task_dataset).await });

        self.inflight = Some(Inflight { request, handle });
        self.state = CoordinatorState::Pending;
        Ok(())
    }

    /// Borrow the in-flight join handle for a `select!` arm. Mirrors the
    /// completion-observation pattern of the run controller: the handle must
    /// not be taken out before its branch wins.
    pub fn inflight_handle_mut(
        &mut self,
    ) -> Option<&mut JoinHandle<Result<serde_json::Value, AnalysisError>>> {
        self.inflight.as_mut().map(|i| &mut i.handle)
    }

    /// Settle a resolved request against the config that is current *now*.
    pub fn complete(
        &mut self,
        join_res: Result<Result<serde_json::Value, AnalysisError>, tokio::task::JoinError>,
        current: &AnalysisConfig,
    ) -> Completion {
        let inflight = match self.inflight.take() {
            Some(i) => i,
            None => return Completion::Failed(AnalysisError::network("no request in flight")),
        };

        let payload = match join_res {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                self.state = CoordinatorState::Failed;
                return Completion::Failed(e);
            }
            Err(e) => {
                self.state = CoordinatorState::Failed;
                return Completion::Failed(AnalysisError::network(format!(
                    "analysis task failed: {e}"
                )));
            }
        };

        if inflight.request.config != *current {
            // The user reconfigured while the request was in flight. The
            // payload answers a question nobody is asking anymore, so it is
            // dropped before schema validation: a malformed stale response
            // must not surface an error either.
            tracing::info!(analysis = self.analysis.kind(), "stale response discarded");
            self.state = CoordinatorState::Idle;
            return Completion::DiscardedStale;
        }

        if let Err(e) = self.analysis.validate_payload(&payload) {
            self.state = CoordinatorState::Failed;
            return Completion::Failed(e);
        }

        self.cached = Some(AnalysisResult {
            analysis: self.analysis.name().to_string(),
            config: inflight.request.config,
            payload,
            completed_at: now_rfc3339(),
        });
        self.state = CoordinatorState::Succeeded;
        Completion::Cached
    }

    /// Await the outstanding request and settle it. Headless-path helper;
    /// the TUI observes completion through `inflight_handle_mut` instead.
    pub async fn wait(&mut self, current: &AnalysisConfig) -> Option<Completion> {
        let handle = self.inflight.as_mut()?;
        let join_res = (&mut handle.handle).await;
        Some(self.complete(join_res, current))
    }

    /// Drop the cached result. Invoked on session reset only; errors never
    /// come through here.
    pub fn clear_cache(&mut self) {
        self.cached = None;
        if !self.is_pending() {
            self.state = CoordinatorState::Idle;
        }
    }
}
