use anyhow::{bail, Context, Result};
use clap::Parser;
use guided_stats_cli::analyses::AnalysisKind;
use guided_stats_cli::coordinator::Completion;
use guided_stats_cli::export::{ExportKind, ExportPipeline};
use guided_stats_cli::model::{Column, Dataset};
use guided_stats_cli::remote::{HttpComputeBackend, HttpDocumentRenderer};
use guided_stats_cli::session::WizardSession;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "guided-stats",
    version,
    about = "Guided statistical analysis wizard with optional TUI"
)]
pub struct Cli {
    /// Analysis screen to run
    #[arg(long, value_enum, default_value_t = AnalysisKind::Autocorrelation)]
    pub analysis: AnalysisKind,

    /// CSV dataset with numeric columns and a header row
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Use the built-in example dataset instead of a file
    #[arg(long)]
    pub example: bool,

    /// Base URL of the statistical computation service
    #[arg(long, default_value = "http://localhost:8808")]
    pub compute_url: String,

    /// Base URL of the document rendering service
    #[arg(long, default_value = "http://localhost:8809")]
    pub doc_url: String,

    /// Directory export artifacts are written to
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Target (dependent) variable
    #[arg(long)]
    pub target: Option<String>,

    /// Predictor variable (repeatable)
    #[arg(long = "predictor")]
    pub predictors: Vec<String>,

    /// Instrument variable (repeatable, instrumental-variable estimation)
    #[arg(long = "instrument")]
    pub instruments: Vec<String>,

    /// Lag count (autocorrelation diagnostics)
    #[arg(long)]
    pub lags: Option<usize>,

    /// Print the raw result payload as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print a text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Also write the tabular (CSV) export after a headless run
    #[arg(long)]
    pub export_csv: bool,

    /// Also write the image (PNG) export after a headless run
    #[arg(long)]
    pub export_image: bool,

    /// Also write the document (DOCX) export after a headless run
    #[arg(long)]
    pub export_doc: bool,
}

impl Cli {
    pub fn is_headless(&self) -> bool {
        self.json || self.text
    }
}

/// Resolve the export directory: `--out-dir`, else the current directory.
pub fn resolve_out_dir(args: &Cli) -> Result<PathBuf> {
    match &args.out_dir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().context("get current directory"),
    }
}

/// Load the dataset the session will analyze. The session itself never
/// fetches data; it receives this as a resolved value.
pub fn load_dataset(args: &Cli) -> Result<Dataset> {
    match (&args.dataset, args.example) {
        (Some(path), _) => read_csv_dataset(path),
        (None, true) => Ok(example_dataset()),
        (None, false) => bail!("no dataset: pass --dataset <file.csv> or --example"),
    }
}

fn read_csv_dataset(path: &PathBuf) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open dataset {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .context("read CSV header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let records: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .context("read CSV records")?;

    // A column counts as numeric when any of its cells parses. Label
    // columns (no parseable cell) are dropped wholesale; a numeric column
    // must then parse in every row, because skipping a single bad cell
    // would shift every later observation and break cross-column row
    // pairing.
    let numeric: Vec<bool> = (0..headers.len())
        .map(|i| {
            records
                .iter()
                .any(|r| r.get(i).is_some_and(|f| f.trim().parse::<f64>().is_ok()))
        })
        .collect();

    let mut columns: Vec<Column> = headers
        .iter()
        .zip(&numeric)
        .filter(|(_, keep)| **keep)
        .map(|(name, _)| Column {
            name: name.clone(),
            values: Vec::new(),
        })
        .collect();

    for (row, record) in records.iter().enumerate() {
        let mut col_idx = 0;
        for (i, header) in headers.iter().enumerate() {
            if !numeric[i] {
                continue;
            }
            let field = record.get(i).unwrap_or("").trim();
            let value: f64 = field.parse().map_err(|_| {
                anyhow::anyhow!(
                    "dataset {}: row {}, column '{}': non-numeric value '{}'",
                    path.display(),
                    row + 2,
                    header,
                    field
                )
            })?;
            columns[col_idx].values.push(value);
            col_idx += 1;
        }
    }

    if columns.is_empty() {
        bail!("dataset {} has no numeric columns", path.display());
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string();
    Ok(Dataset { name, columns })
}

/// Small deterministic dataset for trying the wizard without a file.
pub fn example_dataset() -> Dataset {
    let n = 60;
    let y: Vec<f64> = (0..n).map(|i| (i as f64 / 3.0).sin() + i as f64 * 0.05).collect();
    let x1: Vec<f64> = (0..n).map(|i| i as f64 * 0.1).collect();
    let x2: Vec<f64> = (0..n).map(|i| ((i * i) % 17) as f64 / 10.0).collect();
    let z1: Vec<f64> = (0..n).map(|i| ((i * 7) % 23) as f64 / 10.0).collect();
    Dataset {
        name: "example".into(),
        columns: vec![
            Column { name: "y".into(), values: y },
            Column { name: "x1".into(), values: x1 },
            Column { name: "x2".into(), values: x2 },
            Column { name: "z1".into(), values: z1 },
        ],
    }
}

/// Build a session from the parsed flags.
pub fn build_session(args: &Cli, dataset: Dataset) -> Result<WizardSession> {
    let backend = HttpComputeBackend::new(args.compute_url.clone())
        .context("build computation client")?;
    let mut session = WizardSession::new(args.analysis.instance(), Arc::new(backend), dataset);

    session.set_target(args.target.clone());
    for p in &args.predictors {
        session.toggle_predictor(p);
    }
    for z in &args.instruments {
        session.toggle_instrument(z);
    }
    session.set_lags(args.lags);
    Ok(session)
}

pub async fn run(args: Cli) -> Result<()> {
    if args.is_headless() {
        return run_headless(&args).await;
    }

    #[cfg(feature = "tui")]
    {
        crate::tui::run(args).await
    }
    #[cfg(not(feature = "tui"))]
    {
        bail!("built without the tui feature; use --json or --text")
    }
}

/// Walk the wizard programmatically: validate, run once, print, export.
async fn run_headless(args: &Cli) -> Result<()> {
    let dataset = load_dataset(args)?;
    let mut session = build_session(args, dataset)?;

    // Variables -> Settings -> Validation.
    session.next().ok();
    session.next().ok();

    let report = session.gate();
    if args.text || !report.all_passed() {
        for check in &report.checks {
            let mark = if check.passed { "ok " } else { "FAIL" };
            println!("[{mark}] {} - {}", check.label, check.detail);
        }
    }
    if !report.all_passed() {
        bail!("validation checks failed; analysis not submitted");
    }

    session.next().context("submit analysis")?;
    let completion = session
        .run_pending_analysis()
        .await
        .context("no request in flight")?;
    match completion {
        Completion::Cached => {}
        Completion::DiscardedStale => bail!("analysis response discarded as stale"),
        Completion::Failed(e) => return Err(e).context("analysis failed"),
    }

    let result = session
        .current_result()
        .context("analysis finished without a result")?
        .clone();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.payload)?);
    } else {
        for line in text_summary(&result.payload) {
            println!("{line}");
        }
    }

    run_requested_exports(args, &session).await
}

/// Human-readable lines for text mode.
fn text_summary(payload: &serde_json::Value) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(summary) = payload.get("summary").and_then(|v| v.as_str()) {
        lines.push(format!("Summary:   {summary}"));
    }
    if let Some(reasoning) = payload.get("reasoning").and_then(|v| v.as_str()) {
        lines.push(format!("Reasoning: {reasoning}"));
    }
    if let Some(stats) = payload.get("statistics") {
        lines.push(format!(
            "Statistics: {}",
            serde_json::to_string(stats).unwrap_or_default()
        ));
    }
    lines
}

async fn run_requested_exports(args: &Cli, session: &WizardSession) -> Result<()> {
    if !(args.export_csv || args.export_image || args.export_doc) {
        return Ok(());
    }
    let result = session
        .current_result()
        .context("no current result to export")?;
    let pipeline = ExportPipeline::new(resolve_out_dir(args)?);

    if args.export_csv {
        let path = pipeline.export_tabular(session.analysis(), result)?;
        println!("Exported {}: {}", ExportKind::Tabular.label(), path.display());
    }
    if args.export_image {
        let path = pipeline.export_image(session.analysis(), result)?;
        println!("Exported {}: {}", ExportKind::Image.label(), path.display());
    }
    if args.export_doc {
        let renderer =
            HttpDocumentRenderer::new(args.doc_url.clone()).context("build document client")?;
        let image = pipeline.existing_image(&result.analysis);
        let path = pipeline.export_document(&renderer, result, image).await?;
        println!(
            "Exported {}: {}",
            ExportKind::Document.label(),
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_dataset_is_wide_enough_for_every_analysis() {
        let d = example_dataset();
        assert!(d.rows() >= 30);
        assert!(d.columns.len() >= 4);
        assert!(d.column("y").is_some());
    }

    #[test]
    fn csv_dataset_skips_non_numeric_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "label,y,x\na,1.0,2.0\nb,2.5,3.5\n").unwrap();
        let d = read_csv_dataset(&path).unwrap();
        assert_eq!(d.column_names(), vec!["y", "x"]);
        assert_eq!(d.rows(), 2);
    }

    #[test]
    fn csv_bad_cell_in_numeric_column_fails_the_load() {
        // Skipping the bad cell instead would shift y's later values up a
        // row and silently re-pair them with the wrong x observations.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "y,x\n1.0,10.0\nNA,20.0\n3.0,30.0\n").unwrap();
        let err = read_csv_dataset(&path).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("row 3"), "{msg}");
        assert!(msg.contains("'y'"), "{msg}");
        assert!(msg.contains("NA"), "{msg}");
    }
}
