//! Shared error types for the services crate.

use thiserror::Error;

use storage::file::{FileBindingError, PermissionOutcome};
use storage::repository::StorageError;

/// Errors emitted by `ExternalFileService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExternalFileError {
    #[error("no export file has been chosen")]
    NotBound,
    #[error("export file holds no progress to import")]
    NothingToImport,
    #[error("file access not granted ({0:?})")]
    PermissionDenied(PermissionOutcome),
    #[error(transparent)]
    File(#[from] FileBindingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
