use std::sync::Arc;

use learned_core::model::ProgressDocument;
use storage::file::{
    FileHandle, PermissionGate, PermissionState, ensure_permission, load_from_file, save_to_file,
};
use storage::repository::FileHandleRepository;
use tracing::{debug, info, warn};

use crate::error::ExternalFileError;

/// Export and import of the progress document through a user-granted file.
///
/// The handle survives restarts in its own keyspace; permission is checked
/// again before every read or write.
#[derive(Clone)]
pub struct ExternalFileService {
    handles: Arc<dyn FileHandleRepository>,
    gate: Arc<dyn PermissionGate>,
}

impl ExternalFileService {
    #[must_use]
    pub fn new(handles: Arc<dyn FileHandleRepository>, gate: Arc<dyn PermissionGate>) -> Self {
        Self { handles, gate }
    }

    /// Previously granted handle, if any.
    ///
    /// # Errors
    ///
    /// Returns `ExternalFileError::Storage` if the handle keyspace cannot be read.
    pub async fn current_handle(&self) -> Result<Option<FileHandle>, ExternalFileError> {
        Ok(self.handles.get_handle().await?)
    }

    /// Ask for access to `handle` and remember it on success.
    ///
    /// # Errors
    ///
    /// Returns `ExternalFileError::PermissionDenied` if access is not granted,
    /// or `ExternalFileError::Storage` if the handle cannot be stored.
    pub async fn bind(&self, handle: FileHandle) -> Result<FileHandle, ExternalFileError> {
        let outcome = ensure_permission(self.gate.as_ref(), &handle).await;
        if !outcome.is_granted() {
            info!(path = %handle.path().display(), ?outcome, "export file not granted");
            return Err(ExternalFileError::PermissionDenied(outcome));
        }
        self.handles.save_handle(&handle).await?;
        info!(path = %handle.path().display(), "export file bound");
        Ok(handle)
    }

    /// Forget the bound handle.
    ///
    /// # Errors
    ///
    /// Returns `ExternalFileError::Storage` if the handle cannot be removed.
    pub async fn unbind(&self) -> Result<(), ExternalFileError> {
        self.handles.clear_handle().await?;
        Ok(())
    }

    async fn granted_handle(&self) -> Result<FileHandle, ExternalFileError> {
        let handle = self
            .current_handle()
            .await?
            .ok_or(ExternalFileError::NotBound)?;
        let outcome = ensure_permission(self.gate.as_ref(), &handle).await;
        if !outcome.is_granted() {
            return Err(ExternalFileError::PermissionDenied(outcome));
        }
        Ok(handle)
    }

    /// Write the whole document to the bound file.
    ///
    /// # Errors
    ///
    /// Returns `ExternalFileError` if no file is bound, access is not granted,
    /// or the write fails.
    pub async fn export(&self, doc: &ProgressDocument) -> Result<FileHandle, ExternalFileError> {
        let handle = self.granted_handle().await?;
        save_to_file(&handle, doc).await?;
        Ok(handle)
    }

    /// Read the document from the bound file.
    ///
    /// # Errors
    ///
    /// Returns `ExternalFileError` if no file is bound, access is not granted,
    /// or the file cannot be read. A file that yields no progress, including
    /// unparseable content, is `ExternalFileError::NothingToImport`.
    pub async fn import(&self) -> Result<ProgressDocument, ExternalFileError> {
        let handle = self.granted_handle().await?;
        let doc = load_from_file(&handle).await?;
        if doc.is_empty() {
            return Err(ExternalFileError::NothingToImport);
        }
        Ok(doc)
    }

    /// Boot-time fallback: read the bound file only if access is already
    /// granted. Never prompts and never fails.
    pub async fn restore_without_prompt(&self) -> Option<ProgressDocument> {
        let handle = match self.current_handle().await {
            Ok(Some(handle)) => handle,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "could not read export handle");
                return None;
            }
        };
        if self.gate.query(&handle).await != PermissionState::Granted {
            debug!(path = %handle.path().display(), "export file not granted at boot");
            return None;
        }
        match load_from_file(&handle).await {
            Ok(doc) => Some(doc),
            Err(err) => {
                warn!(error = %err, "could not read export file at boot");
                None
            }
        }
    }
}
