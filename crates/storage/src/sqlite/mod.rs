use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Row};
use thiserror::Error;
use tracing::{debug, warn};

use crate::repository::{Storage, StorageError};

mod file_handle_repo;
mod migrate;
mod progress_repo;
mod settings_repo;

/// `SQLite`-backed durable store.
///
/// No connection is kept between calls: each operation opens the database,
/// applies pending migrations, runs one transaction and closes again.
#[derive(Clone, Debug)]
pub struct SqliteRepository {
    options: SqliteConnectOptions,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Tables used as independent key-value keyspaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyspace {
    Progress,
    FileHandles,
    Settings,
}

impl Keyspace {
    fn table(self) -> &'static str {
        match self {
            Keyspace::Progress => "progress_store",
            Keyspace::FileHandles => "file_handle_store",
            Keyspace::Settings => "settings_store",
        }
    }
}

fn unavailable(err: sqlx::Error) -> StorageError {
    StorageError::Unavailable(err.to_string())
}

impl SqliteRepository {
    /// Store backed by the database file at `path`, created on first use.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        Self { options }
    }

    /// Store described by a `sqlite:` URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL cannot be parsed.
    pub fn from_url(database_url: &str) -> Result<Self, SqliteInitError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        Ok(Self { options })
    }

    async fn open(&self) -> Result<SqliteConnection, StorageError> {
        let mut conn = self.options.connect().await.map_err(unavailable)?;
        migrate::run_migrations(&mut conn).await.map_err(unavailable)?;
        Ok(conn)
    }

    async fn close(conn: SqliteConnection) {
        if let Err(err) = conn.close().await {
            warn!(error = %err, "closing sqlite connection failed");
        }
    }

    pub(crate) async fn read_value(
        &self,
        keyspace: Keyspace,
        key: &str,
    ) -> Result<Option<String>, StorageError> {
        let mut conn = self.open().await?;
        let sql = format!("SELECT value FROM {} WHERE key = ?1", keyspace.table());
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&mut conn)
            .await
            .map_err(unavailable);
        Self::close(conn).await;

        let Some(row) = row? else {
            return Ok(None);
        };
        let value: String = row
            .try_get("value")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        Ok(Some(value))
    }

    pub(crate) async fn write_value(
        &self,
        keyspace: Keyspace,
        key: &str,
        value: &str,
    ) -> Result<(), StorageError> {
        let mut conn = self.open().await?;
        let sql = format!(
            r"
            INSERT INTO {} (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            ",
            keyspace.table()
        );
        let result = async {
            let mut tx = conn.begin().await?;
            sqlx::query(&sql)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
            tx.commit().await
        }
        .await
        .map_err(unavailable);
        Self::close(conn).await;
        debug!(table = keyspace.table(), key, ok = result.is_ok(), "sqlite write");
        result
    }

    pub(crate) async fn delete_value(
        &self,
        keyspace: Keyspace,
        key: &str,
    ) -> Result<(), StorageError> {
        let mut conn = self.open().await?;
        let sql = format!("DELETE FROM {} WHERE key = ?1", keyspace.table());
        let result = sqlx::query(&sql)
            .bind(key)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(unavailable);
        Self::close(conn).await;
        result
    }
}

impl Storage {
    /// Build a `Storage` backed by the `SQLite` file at `path`.
    ///
    /// Nothing is opened here; the first read or write creates the file.
    #[must_use]
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self::from_repo(SqliteRepository::new(path))
    }

    /// Build a `Storage` from a `sqlite:` URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL cannot be parsed.
    pub fn sqlite_url(database_url: &str) -> Result<Self, SqliteInitError> {
        Ok(Self::from_repo(SqliteRepository::from_url(database_url)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }

    #[test]
    fn keyspaces_use_separate_tables() {
        assert_ne!(Keyspace::Progress.table(), Keyspace::FileHandles.table());
        assert_ne!(Keyspace::Progress.table(), Keyspace::Settings.table());
    }

    #[test]
    fn parses_sqlite_url() {
        assert!(SqliteRepository::from_url("sqlite://progress.sqlite3").is_ok());
    }
}
