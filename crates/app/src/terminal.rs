use learned_core::model::ProgressSummary;
use services::{StatusEvent, StatusSurface};

/// Prints status notices and progress readouts to stdout.
#[derive(Debug, Default)]
pub struct TerminalStatus;

impl StatusSurface for TerminalStatus {
    fn publish_message(&self, event: &StatusEvent) {
        println!("[{}] {}", event.at.format("%H:%M:%S"), event.message);
    }

    fn publish_progress(&self, summary: &ProgressSummary) {
        println!("progress: {summary}");
    }
}
