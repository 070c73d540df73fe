mod help;
mod state;

use crate::cli::{self, Cli};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use guided_stats_cli::controller::{run_controller, ControllerEvent, SessionSnapshot, UiCommand};
use guided_stats_cli::export::{ExportKind, ExportPipeline, ExportStatus};
use guided_stats_cli::remote::{DocumentRenderer, HttpDocumentRenderer};
use guided_stats_cli::wizard::StepId;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use state::UiState;
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    let dataset = cli::load_dataset(&args)?;
    let session = cli::build_session(&args, dataset)?;
    let pipeline = ExportPipeline::new(cli::resolve_out_dir(&args)?);
    let renderer: Arc<dyn DocumentRenderer> = Arc::new(
        HttpDocumentRenderer::new(args.doc_url.clone()).context("build document client")?,
    );

    // Unbounded channels keep the UI thread decoupled from the controller.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<ControllerEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // The TUI runs on a dedicated thread to keep blocking terminal I/O out
    // of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(event_rx, cmd_tx));

    let res = run_controller(session, pipeline, renderer, cmd_rx, event_tx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut event_rx: UnboundedReceiver<ControllerEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut ui = UiState::default();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain controller events without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            ui.apply(ev);
        }

        if ui.quitting {
            break Ok(());
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &ui)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid starving the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                if key.kind == KeyEventKind::Press {
                    handle_key(key.modifiers, key.code, &mut ui, &cmd_tx);
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    res
}

fn handle_key(
    modifiers: KeyModifiers,
    code: KeyCode,
    ui: &mut UiState,
    cmd_tx: &UnboundedSender<UiCommand>,
) {
    let send = |cmd: UiCommand| {
        let _ = cmd_tx.send(cmd);
    };

    match (modifiers, code) {
        (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
            ui.quitting = true;
            send(UiCommand::Quit);
        }
        (_, KeyCode::Char('?')) => {
            ui.show_help = !ui.show_help;
        }
        (_, KeyCode::Esc) => {
            if ui.show_help {
                ui.show_help = false;
            } else {
                ui.notice = None;
            }
        }
        (_, KeyCode::Char('n')) | (_, KeyCode::Right) => {
            // On the validation step, `n` is the run control: disabled while
            // a request is pending and while any check fails. Failed checks
            // stay on the checklist, never in an error notification.
            let run_disabled = ui.snapshot.as_ref().is_some_and(|s| {
                s.current_step == StepId::Validation && (s.pending || !s.all_passed)
            });
            if !run_disabled {
                send(UiCommand::Next);
            }
        }
        (_, KeyCode::Char('b')) | (_, KeyCode::Left) => send(UiCommand::Prev),
        (_, KeyCode::Char(c)) if ('1'..='6').contains(&c) => {
            if let Some(step) = StepId::from_ordinal(c as u8 - b'0') {
                send(UiCommand::GoTo(step));
            }
        }
        (_, KeyCode::Char('e')) => request_export(ExportKind::Tabular, ui, &send),
        (_, KeyCode::Char('i')) => request_export(ExportKind::Image, ui, &send),
        (_, KeyCode::Char('d')) => request_export(ExportKind::Document, ui, &send),
        (_, KeyCode::Up) => {
            ui.selector = ui.selector.saturating_sub(1);
        }
        (_, KeyCode::Down) => {
            let max = ui
                .snapshot
                .as_ref()
                .map(|s| s.columns.len().saturating_sub(1))
                .unwrap_or(0);
            ui.selector = (ui.selector + 1).min(max);
        }
        (_, KeyCode::Char('t')) => {
            if on_step(ui, StepId::Variables) {
                if let Some(name) = ui.selected_column() {
                    send(UiCommand::SetTarget(Some(name)));
                }
            }
        }
        (_, KeyCode::Char('p')) | (_, KeyCode::Char(' ')) => {
            if on_step(ui, StepId::Variables) {
                if let Some(name) = ui.selected_column() {
                    send(UiCommand::TogglePredictor(name));
                }
            }
        }
        (_, KeyCode::Char('z')) => {
            let uses = ui.snapshot.as_ref().is_some_and(|s| s.uses_instruments);
            if uses && on_step(ui, StepId::Variables) {
                if let Some(name) = ui.selected_column() {
                    send(UiCommand::ToggleInstrument(name));
                }
            }
        }
        (_, KeyCode::Char('+')) | (_, KeyCode::Char('=')) => adjust_lags(ui, 1, &send),
        (_, KeyCode::Char('-')) => adjust_lags(ui, -1, &send),
        _ => {}
    }
}

fn on_step(ui: &UiState, step: StepId) -> bool {
    ui.snapshot.as_ref().is_some_and(|s| s.current_step == step)
}

fn adjust_lags(ui: &UiState, delta: i64, send: &impl Fn(UiCommand)) {
    let Some(snap) = ui.snapshot.as_ref() else {
        return;
    };
    if !snap.uses_lags || snap.current_step != StepId::Settings {
        return;
    }
    // The bound shown here is the one the validation gate derives; the
    // settings surface never recomputes it.
    let bound = snap.max_lag.max(1) as i64;
    let current = snap.config.lags.unwrap_or(0) as i64;
    let next = (current + delta).clamp(1, bound);
    send(UiCommand::SetLags(Some(next as usize)));
}

fn request_export(kind: ExportKind, ui: &mut UiState, send: &impl Fn(UiCommand)) {
    // Repeat triggers are disabled while that kind is in progress.
    if ui.status(kind).is_working() {
        return;
    }
    let exportable = ui
        .snapshot
        .as_ref()
        .is_some_and(|s| s.result.is_some());
    if !exportable {
        return;
    }
    if kind != ExportKind::Tabular {
        *ui.status_mut(kind) = ExportStatus::Working;
    }
    send(UiCommand::Export(kind));
}

// --- rendering ---

fn draw(area: Rect, f: &mut Frame, ui: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(4),
        ])
        .split(area);

    draw_steps(chunks[0], f, ui);
    if ui.show_help {
        help::draw_help(chunks[1], f);
    } else {
        draw_body(chunks[1], f, ui);
    }
    draw_status(chunks[2], f, ui);
}

fn draw_steps(area: Rect, f: &mut Frame, ui: &UiState) {
    let Some(snap) = ui.snapshot.as_ref() else {
        f.render_widget(Paragraph::new("Starting…"), area);
        return;
    };

    let titles: Vec<Line> = StepId::ALL
        .iter()
        .map(|step| {
            let reachable =
                *step <= snap.max_reached || (snap.has_result && step.is_result_step());
            let style = if reachable {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Line::from(Span::styled(
                format!("{} {}", step.ordinal(), step.label()),
                style,
            ))
        })
        .collect();

    let tabs = Tabs::new(titles)
        .select(snap.current_step.ordinal() as usize - 1)
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL).title(format!(
            "{} - {} ({} rows)",
            snap.analysis, snap.dataset_name, snap.rows
        )));
    f.render_widget(tabs, area);
}

fn draw_body(area: Rect, f: &mut Frame, ui: &UiState) {
    let Some(snap) = ui.snapshot.as_ref() else {
        f.render_widget(Paragraph::new("Starting…"), area);
        return;
    };

    let lines = match snap.current_step {
        StepId::Variables => variables_lines(snap, ui.selector),
        StepId::Settings => settings_lines(snap),
        StepId::Validation => validation_lines(snap),
        StepId::Summary => result_field_lines(snap, "summary", "Summary"),
        StepId::Reasoning => result_field_lines(snap, "reasoning", "Reasoning"),
        StepId::FullStatistics => statistics_lines(snap),
    };

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(snap.current_step.label()),
        );
    f.render_widget(p, area);
}

fn variables_lines(snap: &SessionSnapshot, selector: usize) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from("Select the variables for this analysis."),
        Line::from(""),
    ];
    for (i, col) in snap.columns.iter().enumerate() {
        let cursor = if i == selector { "▶ " } else { "  " };
        let mut tags = Vec::new();
        if snap.config.target.as_deref() == Some(col.as_str()) {
            tags.push("target");
        }
        if snap.config.predictors.iter().any(|p| p == col) {
            tags.push("predictor");
        }
        if snap.config.instruments.iter().any(|z| z == col) {
            tags.push("instrument");
        }
        let tag_text = if tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", tags.join(", "))
        };
        let style = if i == selector {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!("{cursor}{col}{tag_text}"),
            style,
        )));
    }
    lines.push(Line::from(""));
    let mut hint = String::from("t target · p predictor");
    if snap.uses_instruments {
        hint.push_str(" · z instrument");
    }
    lines.push(Line::from(Span::styled(
        hint,
        Style::default().fg(Color::DarkGray),
    )));
    lines
}

fn settings_lines(snap: &SessionSnapshot) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if snap.uses_lags {
        let lags = snap
            .config
            .lags
            .map(|l| l.to_string())
            .unwrap_or_else(|| "unset".into());
        lines.push(Line::from(format!(
            "Lag count: {lags}   (maximum {} for {} rows)",
            snap.max_lag, snap.rows
        )));
        lines.push(Line::from(Span::styled(
            "+ / - to adjust",
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::from(""));
    }
    lines.push(Line::from(format!(
        "Target: {}",
        snap.config.target.as_deref().unwrap_or("none")
    )));
    lines.push(Line::from(format!(
        "Predictors: {}",
        join_or_none(&snap.config.predictors)
    )));
    if snap.uses_instruments {
        lines.push(Line::from(format!(
            "Instruments: {}",
            join_or_none(&snap.config.instruments)
        )));
    }
    lines
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".into()
    } else {
        items.join(", ")
    }
}

fn validation_lines(snap: &SessionSnapshot) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for check in &snap.checks {
        let (mark, color) = if check.passed {
            ("✓", Color::Green)
        } else {
            ("✗", Color::Red)
        };
        lines.push(Line::from(vec![
            Span::styled(format!(" {mark} "), Style::default().fg(color)),
            Span::raw(check.label.clone()),
            Span::styled(
                format!("  - {}", check.detail),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
    }
    lines.push(Line::from(""));
    let footer = if snap.pending {
        Span::styled("Running analysis…", Style::default().fg(Color::Yellow))
    } else if snap.all_passed {
        Span::styled(
            "All checks passed - press n to run the analysis",
            Style::default().fg(Color::Green),
        )
    } else {
        Span::styled(
            "Resolve the failed checks to continue",
            Style::default().fg(Color::Red),
        )
    };
    lines.push(Line::from(footer));
    lines
}

fn stale_banner(snap: &SessionSnapshot) -> Option<Line<'static>> {
    snap.result_stale.then(|| {
        Line::from(Span::styled(
            "Configuration changed since this result was computed - re-run the analysis",
            Style::default().fg(Color::Yellow),
        ))
    })
}

fn result_field_lines(
    snap: &SessionSnapshot,
    field: &str,
    label: &str,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(banner) = stale_banner(snap) {
        lines.push(banner);
        lines.push(Line::from(""));
    }
    match snap.result.as_ref() {
        Some(result) => {
            let text = result
                .payload
                .get(field)
                .and_then(|v| v.as_str())
                .unwrap_or("(not provided by the service)")
                .to_string();
            lines.push(Line::from(format!("{label}:")));
            lines.push(Line::from(text));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("computed at {}", result.completed_at),
                Style::default().fg(Color::DarkGray),
            )));
        }
        None => lines.push(Line::from("No result yet - run the analysis first.")),
    }
    lines
}

fn statistics_lines(snap: &SessionSnapshot) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(banner) = stale_banner(snap) {
        lines.push(banner);
        lines.push(Line::from(""));
    }
    match snap.result.as_ref() {
        Some(result) => {
            let stats = result
                .payload
                .get("statistics")
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            let pretty = serde_json::to_string_pretty(&stats).unwrap_or_default();
            for line in pretty.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        None => lines.push(Line::from("No result yet - run the analysis first.")),
    }
    lines
}

fn draw_status(area: Rect, f: &mut Frame, ui: &UiState) {
    let mut lines = Vec::new();

    if let Some(notice) = ui.notice.as_ref() {
        let color = if notice.is_error {
            Color::Red
        } else {
            Color::Green
        };
        lines.push(Line::from(vec![
            Span::styled(notice.title.clone(), Style::default().fg(color)),
            Span::raw(": "),
            Span::raw(notice.detail.clone()),
            Span::styled("  (Esc to dismiss)", Style::default().fg(Color::DarkGray)),
        ]));
    } else {
        let mut busy = Vec::new();
        if ui.snapshot.as_ref().is_some_and(|s| s.pending) {
            busy.push("analysis running");
        }
        if ui.image_status.is_working() {
            busy.push("image export downloading");
        }
        if ui.document_status.is_working() {
            busy.push("document export downloading");
        }
        if busy.is_empty() {
            lines.push(Line::from(Span::styled(
                "n next · b back · 1-6 jump · e/i/d export · ? help · q quit",
                Style::default().fg(Color::DarkGray),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                busy.join(" · "),
                Style::default().fg(Color::Yellow),
            )));
        }
    }

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use guided_stats_cli::analyses::Autocorrelation;
    use guided_stats_cli::controller;
    use guided_stats_cli::error::AnalysisError;
    use guided_stats_cli::model::{AnalysisConfig, Column, Dataset};
    use guided_stats_cli::remote::ComputeBackend;
    use guided_stats_cli::session::WizardSession;

    struct Never;

    #[async_trait]
    impl ComputeBackend for Never {
        async fn analyze(
            &self,
            _kind: &str,
            _config: &AnalysisConfig,
            _dataset: &Dataset,
        ) -> Result<serde_json::Value, AnalysisError> {
            Err(AnalysisError::network("unused"))
        }
    }

    fn session_on_validation(ready: bool) -> WizardSession {
        let mut s = WizardSession::new(
            Arc::new(Autocorrelation),
            Arc::new(Never),
            Dataset {
                name: "d".into(),
                columns: vec![Column {
                    name: "y".into(),
                    values: (0..45).map(|i| i as f64).collect(),
                }],
            },
        );
        if ready {
            s.set_target(Some("y".into()));
            s.set_lags(Some(10));
        }
        let _ = s.next();
        let _ = s.next();
        assert_eq!(s.current_step(), StepId::Validation);
        s
    }

    fn ui_for(session: &WizardSession) -> UiState {
        UiState {
            snapshot: Some(controller::snapshot(session)),
            ..Default::default()
        }
    }

    #[test]
    fn run_key_is_inert_while_validation_checks_fail() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut ui = ui_for(&session_on_validation(false));
        handle_key(KeyModifiers::NONE, KeyCode::Char('n'), &mut ui, &tx);
        handle_key(KeyModifiers::NONE, KeyCode::Right, &mut ui, &tx);
        assert!(rx.try_recv().is_err());

        let mut ui = ui_for(&session_on_validation(true));
        handle_key(KeyModifiers::NONE, KeyCode::Char('n'), &mut ui, &tx);
        assert!(matches!(rx.try_recv().unwrap(), UiCommand::Next));
    }

    #[tokio::test]
    async fn run_key_is_inert_while_a_request_is_pending() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = session_on_validation(true);
        session.next().unwrap();
        assert!(session.is_pending());

        let mut ui = ui_for(&session);
        handle_key(KeyModifiers::NONE, KeyCode::Char('n'), &mut ui, &tx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn next_key_moves_normally_off_the_validation_step() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = session_on_validation(false);
        let mut ui = ui_for(&session);
        // Same failing gate, but viewed from the settings step.
        if let Some(snap) = ui.snapshot.as_mut() {
            snap.current_step = StepId::Settings;
        }
        handle_key(KeyModifiers::NONE, KeyCode::Char('n'), &mut ui, &tx);
        assert!(matches!(rx.try_recv().unwrap(), UiCommand::Next));
    }
}
