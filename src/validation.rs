//! Readiness checks gating the validation step and the analysis trigger.
//!
//! Checks are pure projections of the current config and dataset shape.
//! They are cheap enough to recompute on every input change; nothing here
//! is stored independently.

use crate::model::{AnalysisConfig, DatasetSummary};
use serde::Serialize;

/// One named readiness check with a human-readable outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationCheck {
    pub label: String,
    pub passed: bool,
    pub detail: String,
}

impl ValidationCheck {
    pub fn new(label: impl Into<String>, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            passed,
            detail: detail.into(),
        }
    }
}

/// The full outcome of one gate evaluation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<ValidationCheck>,
}

impl ValidationReport {
    /// AND of every check; the sole precondition for leaving the validation
    /// step and submitting to the computation boundary.
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn first_failure(&self) -> Option<&ValidationCheck> {
        self.checks.iter().find(|c| !c.passed)
    }
}

/// Largest admissible lag count for `rows` observations: `floor(n/2) - 1`.
///
/// This is the single source of truth for the bound. The settings surface
/// displays it and the lag check enforces it, so the two can never diverge.
pub fn max_lag(rows: usize) -> usize {
    (rows / 2).saturating_sub(1)
}

/// "A target variable is selected."
pub fn check_target_selected(config: &AnalysisConfig) -> ValidationCheck {
    match &config.target {
        Some(name) => ValidationCheck::new(
            "Target variable selected",
            true,
            format!("Using '{name}' as the target variable"),
        ),
        None => ValidationCheck::new(
            "Target variable selected",
            false,
            "Select a target variable on the variables step",
        ),
    }
}

/// "Sample size meets the analysis-specific minimum."
pub fn check_min_sample_size(data: &DatasetSummary, min_rows: usize) -> ValidationCheck {
    ValidationCheck::new(
        "Sufficient sample size",
        data.rows >= min_rows,
        format!("{} observations (minimum {})", data.rows, min_rows),
    )
}

/// "At least `min` predictor variables are selected."
pub fn check_predictors_selected(config: &AnalysisConfig, min: usize) -> ValidationCheck {
    ValidationCheck::new(
        "Predictor variables selected",
        config.predictors.len() >= min,
        format!("{} of at least {} selected", config.predictors.len(), min),
    )
}

/// "Enough instruments for the endogenous regressors" (order condition).
pub fn check_instrument_count(config: &AnalysisConfig) -> ValidationCheck {
    let needed = config.predictors.len().max(1);
    ValidationCheck::new(
        "Sufficient instruments",
        config.instruments.len() >= needed,
        format!(
            "{} instruments for {} regressors",
            config.instruments.len(),
            needed
        ),
    )
}

/// "Lag count is within the derived bound for this sample size."
pub fn check_lag_bound(config: &AnalysisConfig, data: &DatasetSummary) -> ValidationCheck {
    let bound = max_lag(data.rows);
    match config.lags {
        Some(lags) if lags == 0 => ValidationCheck::new(
            "Appropriate lag count",
            false,
            "Lag count must be at least 1",
        ),
        Some(lags) => ValidationCheck::new(
            "Appropriate lag count",
            lags <= bound,
            format!("{lags} lags requested, maximum {bound} for {} rows", data.rows),
        ),
        None => ValidationCheck::new(
            "Appropriate lag count",
            false,
            "Set a lag count on the settings step",
        ),
    }
}
