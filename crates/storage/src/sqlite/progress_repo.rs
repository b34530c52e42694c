use async_trait::async_trait;
use learned_core::model::ProgressDocument;

use super::{Keyspace, SqliteRepository};
use crate::repository::{PROGRESS_DOCUMENT_KEY, ProgressRepository, StorageError};

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_document(&self) -> Result<Option<ProgressDocument>, StorageError> {
        let Some(raw) = self
            .read_value(Keyspace::Progress, PROGRESS_DOCUMENT_KEY)
            .await?
        else {
            return Ok(None);
        };
        ProgressDocument::from_json(&raw)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    async fn put_document(&self, doc: &ProgressDocument) -> Result<(), StorageError> {
        let raw = doc
            .to_json()
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.write_value(Keyspace::Progress, PROGRESS_DOCUMENT_KEY, &raw)
            .await
    }
}
