//! One wizard session: the glue between configuration, the validation gate,
//! step navigation, and the analysis coordinator.
//!
//! A session is instantiated per analysis screen; the same control logic
//! serves every screen through the `Analysis` trait.

use crate::analyses::Analysis;
use crate::coordinator::{AnalysisCoordinator, Completion, CoordinatorState};
use crate::error::AnalysisError;
use crate::model::{AnalysisConfig, AnalysisResult, Dataset, DatasetSummary};
use crate::remote::ComputeBackend;
use crate::validation::{self, ValidationReport};
use crate::wizard::{StepId, WizardStateMachine, VALIDATION_STEP};
use std::sync::Arc;

/// What `next()` did.
#[derive(Debug, PartialEq, Eq)]
pub enum NextAction {
    /// Plain step transition.
    Moved,
    /// We were on the validation step: an analysis request went out and the
    /// transition is deferred until it succeeds.
    Submitted,
    /// Already on the last step.
    AtEnd,
}

pub struct WizardSession {
    analysis: Arc<dyn Analysis>,
    dataset: Arc<Dataset>,
    config: AnalysisConfig,
    wizard: WizardStateMachine,
    coordinator: AnalysisCoordinator,
}

impl WizardSession {
    pub fn new(
        analysis: Arc<dyn Analysis>,
        backend: Arc<dyn ComputeBackend>,
        dataset: Dataset,
    ) -> Self {
        let coordinator = AnalysisCoordinator::new(Arc::clone(&analysis), backend);
        Self {
            analysis,
            dataset: Arc::new(dataset),
            config: AnalysisConfig::default(),
            wizard: WizardStateMachine::new(),
            coordinator,
        }
    }

    pub fn analysis(&self) -> &dyn Analysis {
        self.analysis.as_ref()
    }

    /// Owning handle for tasks that outlive a borrow of the session.
    pub fn analysis_handle(&self) -> Arc<dyn Analysis> {
        Arc::clone(&self.analysis)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn current_step(&self) -> StepId {
        self.wizard.current()
    }

    pub fn max_reached(&self) -> StepId {
        self.wizard.max_reached()
    }

    pub fn is_pending(&self) -> bool {
        self.coordinator.is_pending()
    }

    pub fn coordinator_state(&self) -> CoordinatorState {
        self.coordinator.state()
    }

    /// Recompute the gate. Pure projection; callers may invoke this on every
    /// input change.
    pub fn gate(&self) -> ValidationReport {
        let summary = DatasetSummary::from(self.dataset.as_ref());
        ValidationReport {
            checks: self.analysis.checks(&self.config, &summary),
        }
    }

    /// Derived lag bound for the active dataset. The settings surface reads
    /// the bound from here; the lag check enforces the same value.
    pub fn max_lag(&self) -> usize {
        validation::max_lag(self.dataset.rows())
    }

    // --- configuration ---

    pub fn set_target(&mut self, target: Option<String>) {
        if self.config.target != target {
            self.config.target = target;
            self.variables_changed();
        }
    }

    pub fn toggle_predictor(&mut self, name: &str) {
        if let Some(pos) = self.config.predictors.iter().position(|p| p == name) {
            self.config.predictors.remove(pos);
        } else {
            self.config.predictors.push(name.to_string());
        }
        self.variables_changed();
    }

    pub fn toggle_instrument(&mut self, name: &str) {
        if let Some(pos) = self.config.instruments.iter().position(|p| p == name) {
            self.config.instruments.remove(pos);
        } else {
            self.config.instruments.push(name.to_string());
        }
        self.variables_changed();
    }

    /// Settings-step parameter. Changes staleness of any cached result (the
    /// cache is keyed by the full config) but does not reset progress.
    pub fn set_lags(&mut self, lags: Option<usize>) {
        self.config.lags = lags;
    }

    /// Swap in a different dataset. Resets the whole session.
    pub fn replace_dataset(&mut self, dataset: Dataset) {
        self.dataset = Arc::new(dataset);
        self.config = AnalysisConfig::default();
        self.variables_changed();
    }

    /// The variable universe moved: progress and the cached result are void.
    fn variables_changed(&mut self) {
        self.wizard.reset();
        self.coordinator.clear_cache();
    }

    // --- navigation ---

    /// Direct jump; silently ignored when the step is not reachable.
    pub fn go_to(&mut self, step: StepId) -> bool {
        self.wizard.go_to(step, self.coordinator.has_cached())
    }

    pub fn prev(&mut self) -> bool {
        self.wizard.back()
    }

    /// Advance. On the validation step this issues the analysis request and
    /// defers the transition to `settle`; everywhere else it is an ordinary
    /// clamped forward move.
    pub fn next(&mut self) -> Result<NextAction, AnalysisError> {
        if self.wizard.current() == VALIDATION_STEP {
            let report = self.gate();
            self.coordinator
                .submit(&self.config, &self.dataset, &report)?;
            return Ok(NextAction::Submitted);
        }
        if self.wizard.advance() {
            Ok(NextAction::Moved)
        } else {
            Ok(NextAction::AtEnd)
        }
    }

    /// Settle a resolved analysis request. On success, auto-advance to the
    /// summary step, but only if the user is still waiting on the
    /// validation step; a response arriving while they browse elsewhere just
    /// fills the cache.
    pub fn settle(
        &mut self,
        join_res: Result<
            Result<serde_json::Value, AnalysisError>,
            tokio::task::JoinError,
        >,
    ) -> Completion {
        let completion = self.coordinator.complete(join_res, &self.config);
        if matches!(completion, Completion::Cached)
            && self.wizard.current() == VALIDATION_STEP
        {
            self.wizard.go_to(StepId::Summary, true);
        }
        completion
    }

    /// Borrow the in-flight handle for a `select!` arm.
    pub fn inflight_handle_mut(
        &mut self,
    ) -> Option<&mut tokio::task::JoinHandle<Result<serde_json::Value, AnalysisError>>> {
        self.coordinator.inflight_handle_mut()
    }

    /// Await the outstanding request and settle it (headless path).
    pub async fn run_pending_analysis(&mut self) -> Option<Completion> {
        let handle = self.inflight_handle_mut()?;
        let join_res = handle.await;
        Some(self.settle(join_res))
    }

    // --- results ---

    /// The cached result, only when produced by the current config.
    pub fn current_result(&self) -> Option<&AnalysisResult> {
        self.coordinator.current_result(&self.config)
    }

    /// Whether any result exists at all, current or stale.
    pub fn has_cached_result(&self) -> bool {
        self.coordinator.has_cached()
    }

    /// A result exists but no longer matches the configuration.
    pub fn result_is_stale(&self) -> bool {
        self.has_cached_result() && self.current_result().is_none()
    }
}
