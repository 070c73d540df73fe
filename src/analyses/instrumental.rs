//! Instrumental-variable estimation screen.

use super::Analysis;
use crate::model::{AnalysisConfig, DatasetSummary};
use crate::validation::{
    check_instrument_count, check_min_sample_size, check_predictors_selected,
    check_target_selected, ValidationCheck,
};

/// Two-stage least squares with user-selected instruments. The order
/// condition (at least as many instruments as endogenous regressors) is
/// enforced by the gate; everything statistical happens remotely.
pub struct InstrumentalVariables;

impl Analysis for InstrumentalVariables {
    fn name(&self) -> &'static str {
        "InstrumentalVariables"
    }

    fn kind(&self) -> &'static str {
        "instrumental-variables"
    }

    fn min_rows(&self) -> usize {
        20
    }

    fn uses_instruments(&self) -> bool {
        true
    }

    fn checks(&self, config: &AnalysisConfig, data: &DatasetSummary) -> Vec<ValidationCheck> {
        vec![
            check_target_selected(config),
            check_predictors_selected(config, 1),
            check_instrument_count(config),
            check_min_sample_size(data, self.min_rows()),
        ]
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &[
            "coefficients",
            "standard_errors",
            "f_statistic",
            "summary",
            "reasoning",
            "statistics",
        ]
    }

    fn tabular_fields(&self) -> &'static [&'static str] {
        &["coefficients", "standard_errors", "f_statistic", "summary"]
    }

    fn plot_series(&self) -> (&'static str, &'static str) {
        ("Coefficient estimates", "coefficients")
    }
}
