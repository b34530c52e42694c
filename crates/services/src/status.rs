//! Status surface: where short, human-readable progress and failure notices go.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use learned_core::model::ProgressSummary;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StatusMessage {
    /// Progress restored from the durable store.
    Restored { learned: usize },
    /// Progress restored from the bound export file.
    RestoredFromFile { learned: usize },
    /// Nothing stored yet; starting empty.
    Fresh,
    /// The durable store could not be read; changes stay in memory.
    LoadFailed,
    Saved,
    SaveFailed,
    FileBound { path: PathBuf },
    FileUnbound,
    Exported { path: PathBuf },
    ExportFailed,
    Imported { learned: usize },
    ImportFailed,
    PermissionDenied,
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusMessage::Restored { learned } => write!(f, "restored {learned} learned"),
            StatusMessage::RestoredFromFile { learned } => {
                write!(f, "restored {learned} learned from file")
            }
            StatusMessage::Fresh => f.write_str("no saved progress yet"),
            StatusMessage::LoadFailed => f.write_str("load failed; progress kept in memory only"),
            StatusMessage::Saved => f.write_str("saved"),
            StatusMessage::SaveFailed => f.write_str("save failed"),
            StatusMessage::FileBound { path } => write!(f, "export file: {}", path.display()),
            StatusMessage::FileUnbound => f.write_str("export file removed"),
            StatusMessage::Exported { path } => write!(f, "exported to {}", path.display()),
            StatusMessage::ExportFailed => f.write_str("export failed"),
            StatusMessage::Imported { learned } => write!(f, "imported {learned} learned"),
            StatusMessage::ImportFailed => f.write_str("import failed"),
            StatusMessage::PermissionDenied => f.write_str("file access not granted"),
        }
    }
}

impl StatusMessage {
    /// Whether the message reports a degraded state rather than success.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StatusMessage::LoadFailed
                | StatusMessage::SaveFailed
                | StatusMessage::ExportFailed
                | StatusMessage::ImportFailed
                | StatusMessage::PermissionDenied
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub message: StatusMessage,
    pub at: DateTime<Utc>,
}

/// Target for status text and the progress indicator.
pub trait StatusSurface: Send + Sync {
    fn publish_message(&self, event: &StatusEvent);

    fn publish_progress(&self, summary: &ProgressSummary);
}

/// Keeps everything published; for tests and headless runs.
#[derive(Debug, Default)]
pub struct RecordingStatus {
    messages: Mutex<Vec<StatusEvent>>,
    progress: Mutex<Vec<ProgressSummary>>,
}

impl RecordingStatus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<StatusMessage> {
        self.messages
            .lock()
            .map(|events| events.iter().map(|e| e.message.clone()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn last_message(&self) -> Option<StatusMessage> {
        self.messages().pop()
    }

    #[must_use]
    pub fn last_progress(&self) -> Option<ProgressSummary> {
        self.progress
            .lock()
            .ok()
            .and_then(|progress| progress.last().copied())
    }
}

impl StatusSurface for RecordingStatus {
    fn publish_message(&self, event: &StatusEvent) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(event.clone());
        }
    }

    fn publish_progress(&self, summary: &ProgressSummary) {
        if let Ok(mut progress) = self.progress.lock() {
            progress.push(*summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_render_short_text() {
        assert_eq!(StatusMessage::Saved.to_string(), "saved");
        assert_eq!(
            StatusMessage::Restored { learned: 4 }.to_string(),
            "restored 4 learned"
        );
        assert!(StatusMessage::SaveFailed.is_failure());
        assert!(!StatusMessage::Fresh.is_failure());
    }
}
