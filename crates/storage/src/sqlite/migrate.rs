use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;

/// Bring the schema up to date on a freshly opened connection.
///
/// Every keyspace is a `(key, value)` table so whole documents are stored and
/// replaced as one row.
pub async fn run_migrations(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    async fn is_applied(conn: &mut SqliteConnection, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(&mut *conn)
    .await?;

    // Version 1: progress and file-handle keyspaces.
    if !is_applied(conn, 1).await? {
        let mut tx = conn.begin().await?;

        for table in ["progress_store", "file_handle_store"] {
            sqlx::query(&format!(
                r"
                CREATE TABLE IF NOT EXISTS {table} (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
                "
            ))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (1, datetime('now'))",
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
    }

    // Version 2: viewer settings.
    if !is_applied(conn, 2).await? {
        let mut tx = conn.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS settings_store (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (2, datetime('now'))",
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
    }

    Ok(())
}
