use async_trait::async_trait;
use learned_core::model::{ProgressDocument, ViewSettings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::file::FileHandle;

/// Fixed key of the progress document inside the progress keyspace.
pub const PROGRESS_DOCUMENT_KEY: &str = "learned-progress";

/// Fixed key of the export handle inside the file-handle keyspace.
pub const EXPORT_HANDLE_KEY: &str = "export-file";

/// Fixed key of the viewer preferences inside the settings keyspace.
pub const VIEW_SETTINGS_KEY: &str = "view-settings";

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The store could not be opened or the transaction aborted.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable, whole-document persistence of learned progress.
///
/// Every write overwrites the complete document; there are no partial updates.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Read the stored document, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store cannot be opened.
    async fn get_document(&self) -> Result<Option<ProgressDocument>, StorageError>;

    /// Overwrite the stored document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the write does not commit.
    async fn put_document(&self, doc: &ProgressDocument) -> Result<(), StorageError>;
}

/// Keyspace remembering the user-granted export file across restarts.
#[async_trait]
pub trait FileHandleRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn get_handle(&self) -> Result<Option<FileHandle>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the handle cannot be stored.
    async fn save_handle(&self, handle: &FileHandle) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the handle cannot be removed.
    async fn clear_handle(&self) -> Result<(), StorageError>;
}

/// Small, fast settings tier for viewer preferences.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Load settings, falling back to defaults when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn get_view_settings(&self) -> Result<ViewSettings, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the settings cannot be stored.
    async fn save_view_settings(&self, settings: &ViewSettings) -> Result<(), StorageError>;
}

/// In-memory repository for tests and ephemeral runs.
///
/// Holds serialized snapshots only, so callers can never alias the stored
/// document. Reads and writes can be switched to fail to exercise the
/// degraded paths.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<Option<String>>>,
    handle: Arc<Mutex<Option<FileHandle>>>,
    settings: Arc<Mutex<ViewSettings>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent read fail with `StorageError::Unavailable`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail with `StorageError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("reads disabled".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("transaction aborted".into()));
        }
        Ok(())
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Unavailable(err.to_string())
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_document(&self) -> Result<Option<ProgressDocument>, StorageError> {
        self.check_read()?;
        let guard = self.progress.lock().map_err(poisoned)?;
        guard
            .as_deref()
            .map(ProgressDocument::from_json)
            .transpose()
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    async fn put_document(&self, doc: &ProgressDocument) -> Result<(), StorageError> {
        self.check_write()?;
        let raw = doc
            .to_json()
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let mut guard = self.progress.lock().map_err(poisoned)?;
        *guard = Some(raw);
        Ok(())
    }
}

#[async_trait]
impl FileHandleRepository for InMemoryRepository {
    async fn get_handle(&self) -> Result<Option<FileHandle>, StorageError> {
        self.check_read()?;
        let guard = self.handle.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }

    async fn save_handle(&self, handle: &FileHandle) -> Result<(), StorageError> {
        self.check_write()?;
        let mut guard = self.handle.lock().map_err(poisoned)?;
        *guard = Some(handle.clone());
        Ok(())
    }

    async fn clear_handle(&self) -> Result<(), StorageError> {
        self.check_write()?;
        let mut guard = self.handle.lock().map_err(poisoned)?;
        *guard = None;
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for InMemoryRepository {
    async fn get_view_settings(&self) -> Result<ViewSettings, StorageError> {
        self.check_read()?;
        let guard = self.settings.lock().map_err(poisoned)?;
        Ok(*guard)
    }

    async fn save_view_settings(&self, settings: &ViewSettings) -> Result<(), StorageError> {
        self.check_write()?;
        let mut guard = self.settings.lock().map_err(poisoned)?;
        *guard = *settings;
        Ok(())
    }
}

/// Bundles the three keyspaces behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub file_handles: Arc<dyn FileHandleRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repo(InMemoryRepository::new())
    }

    /// Share one repository value across all three keyspaces.
    #[must_use]
    pub fn from_repo<R>(repo: R) -> Self
    where
        R: ProgressRepository + FileHandleRepository + SettingsRepository + Clone + 'static,
    {
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let file_handles: Arc<dyn FileHandleRepository> = Arc::new(repo.clone());
        let settings: Arc<dyn SettingsRepository> = Arc::new(repo);
        Self {
            progress,
            file_handles,
            settings,
        }
    }
}
