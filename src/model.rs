use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named column of numeric observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// The active dataset, passed into the session as an already-resolved value.
/// The core never fetches data itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Dataset {
    /// Row count of the longest column. Columns are expected to be equal
    /// length; ragged input is tolerated and bounded by the longest.
    pub fn rows(&self) -> usize {
        self.columns.iter().map(|c| c.values.len()).max().unwrap_or(0)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column values keyed by name, in request-payload form.
    pub fn column_map(&self) -> BTreeMap<String, Vec<f64>> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.values.clone()))
            .collect()
    }
}

/// The ambient data shape validation checks read: nothing more than row and
/// column counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub cols: usize,
}

impl From<&Dataset> for DatasetSummary {
    fn from(d: &Dataset) -> Self {
        Self {
            rows: d.rows(),
            cols: d.columns.len(),
        }
    }
}

/// The variable/parameter selection for one analysis. Used both as the
/// request payload and as the cache key for the last successful result, so
/// equality must cover every field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Target (dependent) variable, selected on the variables step.
    pub target: Option<String>,
    /// Predictor variables, selected on the variables step.
    #[serde(default)]
    pub predictors: Vec<String>,
    /// Instrument variables (instrumental-variable estimation only).
    #[serde(default)]
    pub instruments: Vec<String>,
    /// Lag count (autocorrelation diagnostics only), set on the settings step.
    #[serde(default)]
    pub lags: Option<usize>,
}

/// One outstanding call to the computation boundary, tagged with the config
/// it was issued for so a late resolution can be matched against the current
/// config and discarded when stale.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub config: AnalysisConfig,
    pub issued_at: String,
}

impl AnalysisRequest {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            issued_at: now_rfc3339(),
        }
    }
}

/// A successful computation response together with the config that produced
/// it. The payload is opaque to the core beyond shape validation; derived
/// recommendation values inside it are passed through verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis: String,
    pub config: AnalysisConfig,
    pub payload: serde_json::Value,
    pub completed_at: String,
}

/// Events emitted by the session controller and consumed by UI layers.
#[derive(Debug)]
pub enum SessionEvent {
    /// Something about the session changed; re-render from the snapshot.
    Updated,
    /// The in-flight analysis resolved successfully and was cached.
    AnalysisSucceeded,
    /// The in-flight analysis failed, or its response was discarded as stale.
    AnalysisFailed { title: String, detail: String },
    /// An export finished and its artifact is on disk.
    ExportFinished {
        kind: crate::export::ExportKind,
        path: std::path::PathBuf,
    },
    /// An export failed.
    ExportFailed {
        kind: crate::export::ExportKind,
        title: String,
        detail: String,
    },
}

/// Current UTC time, RFC 3339.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}
