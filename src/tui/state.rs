use guided_stats_cli::controller::{ControllerEvent, SessionSnapshot};
use guided_stats_cli::export::{ExportKind, ExportStatus};
use guided_stats_cli::model::SessionEvent;

/// Dismissible notification line.
pub struct Notice {
    pub title: String,
    pub detail: String,
    pub is_error: bool,
}

/// UI-side state. Owned by the UI thread only; the session itself lives on
/// the async side and is observed through snapshots.
#[derive(Default)]
pub struct UiState {
    pub snapshot: Option<SessionSnapshot>,
    pub notice: Option<Notice>,
    pub tabular_status: ExportStatus,
    pub image_status: ExportStatus,
    pub document_status: ExportStatus,
    /// Highlighted column on the variables step.
    pub selector: usize,
    pub show_help: bool,
    pub quitting: bool,
}

impl UiState {
    pub fn status_mut(&mut self, kind: ExportKind) -> &mut ExportStatus {
        match kind {
            ExportKind::Tabular => &mut self.tabular_status,
            ExportKind::Image => &mut self.image_status,
            ExportKind::Document => &mut self.document_status,
        }
    }

    pub fn status(&self, kind: ExportKind) -> &ExportStatus {
        match kind {
            ExportKind::Tabular => &self.tabular_status,
            ExportKind::Image => &self.image_status,
            ExportKind::Document => &self.document_status,
        }
    }

    /// Fold one controller event into the UI state.
    pub fn apply(&mut self, ev: ControllerEvent) {
        match ev.event {
            SessionEvent::Updated => {}
            SessionEvent::AnalysisSucceeded => {
                self.notice = Some(Notice {
                    title: "Analysis complete".into(),
                    detail: "results are ready".into(),
                    is_error: false,
                });
            }
            SessionEvent::AnalysisFailed { title, detail } => {
                self.notice = Some(Notice {
                    title,
                    detail,
                    is_error: true,
                });
            }
            SessionEvent::ExportFinished { kind, path } => {
                self.notice = Some(Notice {
                    title: format!("{} export saved", kind.label()),
                    detail: path.display().to_string(),
                    is_error: false,
                });
                *self.status_mut(kind) = ExportStatus::Done(path);
            }
            SessionEvent::ExportFailed { kind, title, detail } => {
                self.notice = Some(Notice {
                    title,
                    detail: detail.clone(),
                    is_error: true,
                });
                *self.status_mut(kind) = ExportStatus::Error(detail);
            }
        }
        self.set_snapshot(ev.snapshot);
    }

    fn set_snapshot(&mut self, snapshot: SessionSnapshot) {
        self.selector = self.selector.min(snapshot.columns.len().saturating_sub(1));
        self.snapshot = Some(snapshot);
    }

    pub fn selected_column(&self) -> Option<String> {
        self.snapshot
            .as_ref()
            .and_then(|s| s.columns.get(self.selector).cloned())
    }
}
