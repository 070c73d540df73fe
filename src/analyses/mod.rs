//! Analysis catalog.
//!
//! One `Analysis` implementation per statistical screen. The wizard core is
//! written once against this trait; a screen contributes only its name, its
//! readiness checks, the response shape it expects from the computation
//! service, and how its result is exported.

mod autocorrelation;
mod instrumental;
mod linearity;

pub use autocorrelation::Autocorrelation;
pub use instrumental::InstrumentalVariables;
pub use linearity::LinearityCheck;

use crate::error::AnalysisError;
use crate::model::{AnalysisConfig, DatasetSummary};
use crate::validation::ValidationCheck;
use clap::ValueEnum;
use std::sync::Arc;

/// Per-screen behavior of one guided analysis.
pub trait Analysis: Send + Sync {
    /// Display name, also embedded in export filenames.
    fn name(&self) -> &'static str;

    /// Wire identifier used in the computation boundary's request path.
    fn kind(&self) -> &'static str;

    /// Type-specific minimum sample size.
    fn min_rows(&self) -> usize;

    /// Whether the settings step exposes a lag-count field.
    fn uses_lags(&self) -> bool {
        false
    }

    /// Whether the variables step exposes instrument selection.
    fn uses_instruments(&self) -> bool {
        false
    }

    /// Ordered readiness checks for the current config and data shape.
    fn checks(&self, config: &AnalysisConfig, data: &DatasetSummary) -> Vec<ValidationCheck>;

    /// Top-level fields a response must carry to be considered well-formed.
    fn required_fields(&self) -> &'static [&'static str];

    /// Fields serialized by the tabular export, in order.
    fn tabular_fields(&self) -> &'static [&'static str];

    /// Series plotted by the image export: `(series label, array field)`.
    fn plot_series(&self) -> (&'static str, &'static str);

    /// Structural validation only: the response must carry every required
    /// field. No numeric interpretation happens here or anywhere else in
    /// this crate.
    fn validate_payload(&self, payload: &serde_json::Value) -> Result<(), AnalysisError> {
        let obj = payload
            .as_object()
            .ok_or_else(|| AnalysisError::schema("response body is not a JSON object"))?;
        for field in self.required_fields() {
            if !obj.contains_key(*field) {
                return Err(AnalysisError::schema(format!(
                    "response is missing required field '{field}'"
                )));
            }
        }
        let (_, series_field) = self.plot_series();
        if obj.get(series_field).map(|v| !v.is_array()).unwrap_or(false) {
            return Err(AnalysisError::schema(format!(
                "field '{series_field}' is not an array"
            )));
        }
        Ok(())
    }
}

/// Analysis selector for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnalysisKind {
    Autocorrelation,
    Iv,
    Linearity,
}

impl AnalysisKind {
    pub fn instance(self) -> Arc<dyn Analysis> {
        match self {
            AnalysisKind::Autocorrelation => Arc::new(Autocorrelation),
            AnalysisKind::Iv => Arc::new(InstrumentalVariables),
            AnalysisKind::Linearity => Arc::new(LinearityCheck),
        }
    }
}
