use async_trait::async_trait;

use super::{Keyspace, SqliteRepository};
use crate::file::FileHandle;
use crate::repository::{EXPORT_HANDLE_KEY, FileHandleRepository, StorageError};

#[async_trait]
impl FileHandleRepository for SqliteRepository {
    async fn get_handle(&self) -> Result<Option<FileHandle>, StorageError> {
        let Some(raw) = self
            .read_value(Keyspace::FileHandles, EXPORT_HANDLE_KEY)
            .await?
        else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    async fn save_handle(&self, handle: &FileHandle) -> Result<(), StorageError> {
        let raw = serde_json::to_string(handle)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.write_value(Keyspace::FileHandles, EXPORT_HANDLE_KEY, &raw)
            .await
    }

    async fn clear_handle(&self) -> Result<(), StorageError> {
        self.delete_value(Keyspace::FileHandles, EXPORT_HANDLE_KEY)
            .await
    }
}
