use async_trait::async_trait;
use learned_core::model::ViewSettings;

use super::{Keyspace, SqliteRepository};
use crate::repository::{SettingsRepository, StorageError, VIEW_SETTINGS_KEY};

#[async_trait]
impl SettingsRepository for SqliteRepository {
    async fn get_view_settings(&self) -> Result<ViewSettings, StorageError> {
        let raw = self
            .read_value(Keyspace::Settings, VIEW_SETTINGS_KEY)
            .await?;
        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|err| StorageError::Serialization(err.to_string())),
            None => Ok(ViewSettings::default()),
        }
    }

    async fn save_view_settings(&self, settings: &ViewSettings) -> Result<(), StorageError> {
        let raw = serde_json::to_string(settings)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.write_value(Keyspace::Settings, VIEW_SETTINGS_KEY, &raw)
            .await
    }
}
