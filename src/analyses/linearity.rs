//! Linearity check screen.

use super::Analysis;
use crate::model::{AnalysisConfig, DatasetSummary};
use crate::validation::{
    check_min_sample_size, check_predictors_selected, check_target_selected, ValidationCheck,
};

/// Residual-based linearity diagnostics for a target/predictor selection.
pub struct LinearityCheck;

impl Analysis for LinearityCheck {
    fn name(&self) -> &'static str {
        "Linearity"
    }

    fn kind(&self) -> &'static str {
        "linearity"
    }

    fn min_rows(&self) -> usize {
        10
    }

    fn checks(&self, config: &AnalysisConfig, data: &DatasetSummary) -> Vec<ValidationCheck> {
        vec![
            check_target_selected(config),
            check_predictors_selected(config, 1),
            check_min_sample_size(data, self.min_rows()),
        ]
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["residuals", "r_squared", "summary", "reasoning", "statistics"]
    }

    fn tabular_fields(&self) -> &'static [&'static str] {
        &["r_squared", "summary"]
    }

    fn plot_series(&self) -> (&'static str, &'static str) {
        ("Residuals by observation", "residuals")
    }
}
