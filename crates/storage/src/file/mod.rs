//! Optional mirror of the progress document in a user-chosen file.
//!
//! Access is gated: a handle is only usable once [`ensure_permission`] reports
//! [`PermissionOutcome::Granted`]. Reads never fail on bad content, and writes
//! replace the file in one rename so readers see either the old or the new
//! document.

mod permission;

use std::path::{Path, PathBuf};

use learned_core::model::ProgressDocument;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub use permission::{
    FsPermissionGate, PermissionGate, PermissionOutcome, PermissionState, PromptPolicy,
    ensure_permission,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FileBindingError {
    #[error("file access failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not serialize progress: {0}")]
    Serialize(String),
}

/// Reference to an export file previously granted by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    path: PathBuf,
}

impl FileHandle {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> FileBindingError {
        FileBindingError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Read the document stored at `handle`.
///
/// Content that is not a valid progress document yields an empty document.
///
/// # Errors
///
/// Returns `FileBindingError::Io` if the file cannot be opened or read.
pub async fn load_from_file(handle: &FileHandle) -> Result<ProgressDocument, FileBindingError> {
    let bytes = tokio::fs::read(handle.path())
        .await
        .map_err(|err| handle.io_error(err))?;
    let raw = match String::from_utf8(bytes) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path = %handle.path().display(), error = %err, "discarding non-UTF-8 progress file");
            return Ok(ProgressDocument::new());
        }
    };
    match ProgressDocument::from_json(&raw) {
        Ok(doc) => {
            debug!(path = %handle.path().display(), "loaded progress file");
            Ok(doc)
        }
        Err(err) => {
            warn!(path = %handle.path().display(), error = %err, "discarding unreadable progress file");
            Ok(ProgressDocument::new())
        }
    }
}

/// Replace the file at `handle` with the pretty-printed document.
///
/// # Errors
///
/// Returns `FileBindingError` if serialization or any file operation fails.
pub async fn save_to_file(
    handle: &FileHandle,
    doc: &ProgressDocument,
) -> Result<(), FileBindingError> {
    let mut body = doc
        .to_json_pretty()
        .map_err(|err| FileBindingError::Serialize(err.to_string()))?;
    body.push('\n');

    let tmp = handle.temp_path();
    if let Err(err) = write_and_rename(&tmp, handle.path(), body.as_bytes()).await {
        remove_temp(&tmp).await;
        return Err(handle.io_error(err));
    }
    debug!(path = %handle.path().display(), bytes = body.len(), "saved progress file");
    Ok(())
}

async fn write_and_rename(tmp: &Path, target: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(tmp).await?;
    file.write_all(body).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(tmp, target).await
}

async fn remove_temp(tmp: &Path) {
    match tokio::fs::remove_file(tmp).await {
        Ok(()) => debug!(path = %tmp.display(), "removed temp file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %tmp.display(), error = %err, "could not remove temp file"),
    }
}
