//! Rasterized chart export.
//!
//! Draws the analysis's designated result series to a PNG. Any failure in
//! here is a `Render` error scoped to the image path; it never affects the
//! session or other export kinds.

use crate::analyses::Analysis;
use crate::error::AnalysisError;
use crate::model::AnalysisResult;
use plotters::prelude::*;
use std::path::Path;

const WIDTH: u32 = 900;
const HEIGHT: u32 = 520;

fn render_err<E: std::fmt::Display>(err: E) -> AnalysisError {
    AnalysisError::render(err.to_string())
}

/// Numeric series from the payload field, indexed by position.
fn series_points(payload: &serde_json::Value, field: &str) -> Vec<(f64, f64)> {
    payload
        .get(field)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_f64())
                .enumerate()
                .map(|(i, v)| (i as f64, v))
                .collect()
        })
        .unwrap_or_default()
}

/// Render the result's plotted series into `path` as a PNG.
pub fn render_result_png(
    analysis: &dyn Analysis,
    result: &AnalysisResult,
    path: &Path,
) -> Result<(), AnalysisError> {
    let (series_label, series_field) = analysis.plot_series();
    let points = series_points(&result.payload, series_field);
    if points.is_empty() {
        return Err(AnalysisError::render(format!(
            "result field '{series_field}' has no plottable values"
        )));
    }

    let x_max = (points.len().saturating_sub(1)).max(1) as f64;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for (_, y) in &points {
        y_min = y_min.min(*y);
        y_max = y_max.max(*y);
    }
    if !(y_min.is_finite() && y_max.is_finite()) {
        return Err(AnalysisError::render("series contains no finite values"));
    }
    // Flat series still need a non-degenerate axis.
    let pad = ((y_max - y_min) * 0.1).max(0.1);
    let (y_lo, y_hi) = (y_min - pad, y_max + pad);

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let caption = format!("{}: {}", result.analysis, series_label);
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 24))
        .margin(16)
        .x_label_area_size(36)
        .y_label_area_size(52)
        .build_cartesian_2d(0.0..x_max, y_lo..y_hi)
        .map_err(render_err)?;

    chart.configure_mesh().draw().map_err(render_err)?;
    chart
        .draw_series(LineSeries::new(points.iter().copied(), &BLUE))
        .map_err(render_err)?;
    chart
        .draw_series(points.iter().map(|p| Circle::new(*p, 3, BLUE.filled())))
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}
