//! Multi-format export of a cached analysis result.
//!
//! Three strategies behind one `kind` discriminant: a synchronous tabular
//! snapshot, a locally rasterized chart image, and a remotely rendered
//! document. Export is a pure read of the cached result; it never touches
//! wizard progress or the cache, and repeating an export is always safe.

mod document;
mod image;

pub use document::export_document;
pub use image::render_result_png;

use crate::analyses::Analysis;
use crate::error::AnalysisError;
use crate::model::AnalysisResult;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Tabular,
    Image,
    Document,
}

impl ExportKind {
    pub fn extension(self) -> &'static str {
        match self {
            ExportKind::Tabular => "csv",
            ExportKind::Image => "png",
            ExportKind::Document => "docx",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportKind::Tabular => "CSV",
            ExportKind::Image => "PNG",
            ExportKind::Document => "Document",
        }
    }
}

/// Per-kind delivery status. Each async export kind carries its own status
/// so a pending document render never blocks a tabular export or navigation.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ExportStatus {
    #[default]
    Idle,
    Working,
    Done(PathBuf),
    Error(String),
}

impl ExportStatus {
    pub fn is_working(&self) -> bool {
        matches!(self, ExportStatus::Working)
    }
}

/// Today's calendar date, ISO formatted, preferring local time.
fn today_iso() -> String {
    let fmt = time::macros::format_description!("[year]-[month]-[day]");
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.date().format(&fmt).unwrap_or_else(|_| "today".into())
}

/// `<AnalysisName>_<ISODate>.<ext>`
pub fn export_filename(analysis_name: &str, kind: ExportKind) -> String {
    format!("{}_{}.{}", analysis_name, today_iso(), kind.extension())
}

/// Produces and delivers export artifacts for one analysis session.
#[derive(Clone)]
pub struct ExportPipeline {
    out_dir: PathBuf,
}

impl ExportPipeline {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn target_path(&self, analysis_name: &str, kind: ExportKind) -> PathBuf {
        self.out_dir.join(export_filename(analysis_name, kind))
    }

    /// Synchronous tabular snapshot of the analysis-specific field subset.
    /// Fails only on I/O; the caller guarantees a current result exists.
    pub fn export_tabular(
        &self,
        analysis: &dyn Analysis,
        result: &AnalysisResult,
    ) -> Result<PathBuf, AnalysisError> {
        let path = self.target_path(analysis.name(), ExportKind::Tabular);
        write_tabular(analysis, result, &path)?;
        tracing::info!(path = %path.display(), "tabular export written");
        Ok(path)
    }

    /// Rasterize the result's plotted series to a PNG. CPU-bound; callers on
    /// an event loop should run it off-thread and track its own in-progress
    /// status.
    pub fn export_image(
        &self,
        analysis: &dyn Analysis,
        result: &AnalysisResult,
    ) -> Result<PathBuf, AnalysisError> {
        let path = self.target_path(analysis.name(), ExportKind::Image);
        image::render_result_png(analysis, result, &path)?;
        tracing::info!(path = %path.display(), "image export written");
        Ok(path)
    }

    /// Previously produced image artifact for this analysis, if any. Sent
    /// along with document renders.
    pub fn existing_image(&self, analysis_name: &str) -> Option<Vec<u8>> {
        std::fs::read(self.target_path(analysis_name, ExportKind::Image)).ok()
    }

    /// Remote document render, delivered to the target path.
    pub async fn export_document(
        &self,
        renderer: &dyn crate::remote::DocumentRenderer,
        result: &AnalysisResult,
        image_png: Option<Vec<u8>>,
    ) -> Result<PathBuf, AnalysisError> {
        let path = self.target_path(&result.analysis, ExportKind::Document);
        document::export_document(renderer, result, image_png, &path).await?;
        tracing::info!(path = %path.display(), "document export written");
        Ok(path)
    }
}

/// Render one payload field as a flat CSV cell.
fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| cell(v))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

fn write_tabular(
    analysis: &dyn Analysis,
    result: &AnalysisResult,
    path: &Path,
) -> Result<(), AnalysisError> {
    let mut writer = csv::Writer::from_path(path).map_err(io_from_csv)?;
    writer.write_record(["field", "value"]).map_err(io_from_csv)?;
    writer
        .write_record(["analysis", &result.analysis])
        .map_err(io_from_csv)?;
    writer
        .write_record(["computed_at", &result.completed_at])
        .map_err(io_from_csv)?;
    for field in analysis.tabular_fields() {
        let value = result
            .payload
            .get(*field)
            .map(cell)
            .unwrap_or_default();
        writer.write_record([*field, &value]).map_err(io_from_csv)?;
    }
    writer.flush()?;
    Ok(())
}

fn io_from_csv(err: csv::Error) -> AnalysisError {
    AnalysisError::Io(std::io::Error::other(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyses::Autocorrelation;
    use crate::model::AnalysisConfig;
    use serde_json::json;

    fn result() -> AnalysisResult {
        AnalysisResult {
            analysis: "Autocorrelation".into(),
            config: AnalysisConfig {
                target: Some("y".into()),
                lags: Some(3),
                ..Default::default()
            },
            payload: json!({
                "acf": [1.0, 0.5, 0.2],
                "recommended_lag": 2,
                "summary": "mild autocorrelation",
                "reasoning": "acf tapers",
                "statistics": {"ljung_box": 1.0}
            }),
            completed_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn filename_embeds_date_and_extension() {
        for (kind, ext) in [
            (ExportKind::Tabular, "csv"),
            (ExportKind::Image, "png"),
            (ExportKind::Document, "docx"),
        ] {
            let name = export_filename("Autocorrelation", kind);
            assert!(name.starts_with("Autocorrelation_"));
            assert!(name.ends_with(&format!(".{ext}")));
            assert!(name.contains(&today_iso()));
        }
    }

    #[test]
    fn tabular_export_writes_the_field_subset() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::new(dir.path());
        let path = pipeline
            .export_tabular(&Autocorrelation, &result())
            .unwrap();
        assert_eq!(path.extension().unwrap(), "csv");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("recommended_lag,2"));
        assert!(contents.contains("1.0; 0.5; 0.2"));
        assert!(contents.contains("mild autocorrelation"));
        // Fields outside the tabular subset stay out.
        assert!(!contents.contains("ljung_box"));
    }

    #[test]
    fn repeated_exports_overwrite_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::new(dir.path());
        let first = pipeline.export_tabular(&Autocorrelation, &result()).unwrap();
        let second = pipeline.export_tabular(&Autocorrelation, &result()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn image_export_renders_a_png() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::new(dir.path());
        let path = pipeline.export_image(&Autocorrelation, &result()).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        assert_eq!(pipeline.existing_image("Autocorrelation").unwrap(), bytes);
    }

    #[test]
    fn image_export_without_series_is_a_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::new(dir.path());
        let mut r = result();
        r.payload["acf"] = json!([]);
        let err = pipeline.export_image(&Autocorrelation, &r).unwrap_err();
        assert!(matches!(err, AnalysisError::Render { .. }));
    }
}
