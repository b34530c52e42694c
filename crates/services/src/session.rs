use std::sync::Arc;

use learned_core::Clock;
use learned_core::model::{PageId, ProgressDocument, ProgressSummary, ViewSettings};
use storage::file::{FileHandle, PermissionGate};
use storage::repository::{ProgressRepository, SettingsRepository, Storage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::aggregator::ProgressAggregator;
use crate::config::SessionConfig;
use crate::content::{ContentChange, ContentEvent, ContentNode, NodeKey};
use crate::error::ExternalFileError;
use crate::external_file::ExternalFileService;
use crate::reconciler::{ContentReconciler, ScanReport};
use crate::status::{StatusEvent, StatusMessage, StatusSurface};

/// Whether mutations reach the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceMode {
    Durable,
    /// The boot read failed. Writes are skipped so an empty working set never
    /// overwrites a stored document that could not be read.
    Ephemeral,
}

/// One page's progress tracking, from boot to teardown.
///
/// Owns the in-memory document, which stays authoritative: failed writes are
/// reported but never rolled back, and the next successful write catches the
/// store up.
pub struct ProgressSession {
    page: PageId,
    clock: Clock,
    document: ProgressDocument,
    mode: PersistenceMode,
    view: ViewSettings,
    summary: ProgressSummary,
    reconciler: ContentReconciler,
    aggregator: ProgressAggregator,
    progress: Arc<dyn ProgressRepository>,
    settings: Arc<dyn SettingsRepository>,
    external: ExternalFileService,
    status: Arc<dyn StatusSurface>,
}

impl ProgressSession {
    /// Restore progress and bind the initial content.
    ///
    /// Never fails: an unreadable store or file degrades to an empty document.
    pub async fn init(
        config: SessionConfig,
        storage: Storage,
        gate: Arc<dyn PermissionGate>,
        status: Arc<dyn StatusSurface>,
        initial: &[ContentNode],
    ) -> Self {
        let view = match storage.settings.get_view_settings().await {
            Ok(view) => view,
            Err(err) => {
                warn!(error = %err, "view settings unavailable, using defaults");
                ViewSettings::default()
            }
        };

        let mut session = Self {
            page: config.page,
            clock: config.clock,
            document: ProgressDocument::new(),
            mode: PersistenceMode::Durable,
            view,
            summary: ProgressSummary::default(),
            reconciler: ContentReconciler::new(),
            aggregator: ProgressAggregator::new(Arc::clone(&status)),
            progress: storage.progress,
            settings: storage.settings,
            external: ExternalFileService::new(storage.file_handles, gate),
            status,
        };

        session.restore().await;
        session.reconciler.scan(initial, &session.document, &session.page);
        session.reconciler.apply_filter(session.view.hide_learned);
        session.recompute();
        info!(
            page = %session.page,
            mode = ?session.mode,
            bindings = session.reconciler.binding_count(),
            "session started"
        );
        session
    }

    async fn restore(&mut self) {
        match self.progress.get_document().await {
            Ok(Some(doc)) => {
                self.document = doc;
                let learned = self.document.learned_count(&self.page);
                self.publish(StatusMessage::Restored { learned });
                return;
            }
            Ok(None) => debug!("no stored progress"),
            Err(err) => {
                warn!(error = %err, "durable store unavailable, running in memory");
                self.mode = PersistenceMode::Ephemeral;
            }
        }

        if let Some(doc) = self.external.restore_without_prompt().await {
            if !doc.is_empty() {
                self.document = doc;
                let learned = self.document.learned_count(&self.page);
                self.publish(StatusMessage::RestoredFromFile { learned });
                self.persist_quietly().await;
                return;
            }
        }

        self.publish(match self.mode {
            PersistenceMode::Durable => StatusMessage::Fresh,
            PersistenceMode::Ephemeral => StatusMessage::LoadFailed,
        });
    }

    /// Route a content notification.
    pub async fn handle_event(&mut self, event: ContentEvent) {
        match event {
            ContentEvent::Changed(change) => {
                self.handle_change(&change);
            }
            ContentEvent::Activated(key) => {
                self.activate(key).await;
            }
        }
    }

    /// Consume content events until every sender is dropped, then tear down.
    pub async fn run(mut self, mut events: mpsc::Receiver<ContentEvent>) -> ProgressDocument {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        self.teardown()
    }

    /// Bind added nodes, unbind removed ones, and refresh the counters.
    pub fn handle_change(&mut self, change: &ContentChange) -> ScanReport {
        let report = self.reconciler.apply(change, &self.document, &self.page);
        if report.bound > 0 || report.detached > 0 {
            self.reconciler.apply_filter(self.view.hide_learned);
            self.recompute();
        }
        report
    }

    /// Toggle the item behind `key`. Returns its new learned state, or `None`
    /// if the key does not belong to a bound element.
    ///
    /// The model changes first and the item is painted from it; only then is
    /// the document written, so a failed write leaves the screen matching the
    /// in-memory state.
    pub async fn activate(&mut self, key: NodeKey) -> Option<bool> {
        let Some(target) = self.reconciler.target_of(key) else {
            debug!(key = key.value(), "activation for unbound node");
            return None;
        };
        let id = target.id()?;

        let learned = self.document.toggle(&self.page, &id);
        self.reconciler.paint_id(&id, learned);
        self.persist().await;
        self.reconciler.apply_filter(self.view.hide_learned);
        self.recompute();
        debug!(item = %id, learned, "item toggled");
        Some(learned)
    }

    async fn persist(&self) {
        if self.mode == PersistenceMode::Ephemeral {
            debug!("ephemeral session, skipping durable write");
            return;
        }
        match self.progress.put_document(&self.document).await {
            Ok(()) => self.publish(StatusMessage::Saved),
            Err(err) => {
                warn!(error = %err, "saving progress failed");
                self.publish(StatusMessage::SaveFailed);
            }
        }
    }

    async fn persist_quietly(&self) {
        if self.mode == PersistenceMode::Durable {
            if let Err(err) = self.progress.put_document(&self.document).await {
                warn!(error = %err, "could not copy restored progress to the store");
            }
        }
    }

    /// Show or hide learned items and remember the choice.
    pub async fn set_hide_learned(&mut self, hide: bool) {
        self.view = self.view.with_hide_learned(hide);
        if let Err(err) = self.settings.save_view_settings(&self.view).await {
            warn!(error = %err, "could not store view settings");
        }
        self.reconciler.apply_filter(hide);
    }

    /// Choose the export file.
    ///
    /// # Errors
    ///
    /// Returns `ExternalFileError` if access is not granted or the handle
    /// cannot be stored.
    pub async fn bind_file(&mut self, handle: FileHandle) -> Result<(), ExternalFileError> {
        match self.external.bind(handle).await {
            Ok(handle) => {
                self.publish(StatusMessage::FileBound {
                    path: handle.path().to_path_buf(),
                });
                Ok(())
            }
            Err(err) => {
                self.publish_file_failure(&err, StatusMessage::ExportFailed);
                Err(err)
            }
        }
    }

    /// Forget the export file.
    ///
    /// # Errors
    ///
    /// Returns `ExternalFileError::Storage` if the handle cannot be removed.
    pub async fn unbind_file(&mut self) -> Result<(), ExternalFileError> {
        self.external.unbind().await?;
        self.publish(StatusMessage::FileUnbound);
        Ok(())
    }

    /// Write the current document to the export file.
    ///
    /// # Errors
    ///
    /// Returns `ExternalFileError` if no file is bound, access is not granted,
    /// or the write fails.
    pub async fn export(&mut self) -> Result<(), ExternalFileError> {
        match self.external.export(&self.document).await {
            Ok(handle) => {
                self.publish(StatusMessage::Exported {
                    path: handle.path().to_path_buf(),
                });
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "export failed");
                self.publish_file_failure(&err, StatusMessage::ExportFailed);
                Err(err)
            }
        }
    }

    /// Replace the in-memory document with the export file's contents.
    /// A file with no usable progress leaves the document and store untouched.
    ///
    /// # Errors
    ///
    /// Returns `ExternalFileError` if no file is bound, access is not granted,
    /// the file cannot be read, or it holds nothing to import.
    pub async fn import(&mut self) -> Result<(), ExternalFileError> {
        let doc = match self.external.import().await {
            Ok(doc) => doc,
            Err(err) => {
                warn!(error = %err, "import failed");
                self.publish_file_failure(&err, StatusMessage::ImportFailed);
                return Err(err);
            }
        };

        self.document = doc;
        self.reconciler.repaint_all(&self.document, &self.page);
        let learned = self.document.learned_count(&self.page);
        self.publish(StatusMessage::Imported { learned });
        self.persist().await;
        self.reconciler.apply_filter(self.view.hide_learned);
        self.recompute();
        Ok(())
    }

    fn publish_file_failure(&self, err: &ExternalFileError, fallback: StatusMessage) {
        let message = match err {
            ExternalFileError::PermissionDenied(_) => StatusMessage::PermissionDenied,
            _ => fallback,
        };
        self.publish(message);
    }

    fn publish(&self, message: StatusMessage) {
        self.status.publish_message(&StatusEvent {
            message,
            at: self.clock.now(),
        });
    }

    fn recompute(&mut self) {
        self.summary = self
            .aggregator
            .recompute(&self.reconciler, &self.document, &self.page);
    }

    /// Unbind all content and hand back the final document.
    pub fn teardown(mut self) -> ProgressDocument {
        self.reconciler.clear();
        info!(page = %self.page, "session closed");
        self.document
    }

    #[must_use]
    pub fn page(&self) -> &PageId {
        &self.page
    }

    #[must_use]
    pub fn document(&self) -> &ProgressDocument {
        &self.document
    }

    #[must_use]
    pub fn mode(&self) -> PersistenceMode {
        self.mode
    }

    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        self.summary
    }

    #[must_use]
    pub fn view_settings(&self) -> ViewSettings {
        self.view
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.reconciler.binding_count()
    }
}
