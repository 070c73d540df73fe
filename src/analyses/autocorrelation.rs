//! Autocorrelation diagnostics screen.

use super::Analysis;
use crate::model::{AnalysisConfig, DatasetSummary};
use crate::validation::{
    check_lag_bound, check_min_sample_size, check_target_selected, ValidationCheck,
};

/// Autocorrelation-function diagnostics over a single series. The service
/// returns the ACF values per lag plus a recommended lag order, which is
/// passed through verbatim.
pub struct Autocorrelation;

impl Analysis for Autocorrelation {
    fn name(&self) -> &'static str {
        "Autocorrelation"
    }

    fn kind(&self) -> &'static str {
        "autocorrelation"
    }

    fn min_rows(&self) -> usize {
        30
    }

    fn uses_lags(&self) -> bool {
        true
    }

    fn checks(&self, config: &AnalysisConfig, data: &DatasetSummary) -> Vec<ValidationCheck> {
        vec![
            check_target_selected(config),
            check_min_sample_size(data, self.min_rows()),
            check_lag_bound(config, data),
        ]
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["acf", "recommended_lag", "summary", "reasoning", "statistics"]
    }

    fn tabular_fields(&self) -> &'static [&'static str] {
        &["acf", "recommended_lag", "summary"]
    }

    fn plot_series(&self) -> (&'static str, &'static str) {
        ("ACF by lag", "acf")
    }
}
