//! Schema migrations for the bucket store.
//!
//! Each step runs in its own transaction together with the row recording it
//! in `schema_version`, so a store is never left between two versions.

use super::Error;
use chrono::Utc;
use tokio_rusqlite::{Connection, params, rusqlite};

/// Ordered schema steps, keyed by the version they bring the store to.
const STEPS: &[(i64, &str)] = &[
    (1, include_str!("../../migrations/001_buckets.sql")),
    (2, include_str!("../../migrations/002_entries.sql")),
];

fn schema_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    let version = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Bring the store up to the newest schema.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the step whose SQL was rejected.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let applied = schema_version(conn)?;

        for (version, sql) in STEPS.iter().filter(|(version, _)| *version > applied) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("step {version}: {e}")))?;
            tx.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                params![version, Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, "applied schema step");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_count(conn: &Connection) -> i64 {
        conn.call(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('buckets', 'entries')",
                [],
                |row| row.get(0),
            )
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_run_twice_is_harmless() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();
        assert_eq!(table_count(&conn).await, 2);
    }

    #[tokio::test]
    async fn test_schema_version_recorded() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let latest: i64 = conn
            .call(|conn| conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(latest, STEPS[STEPS.len() - 1].0);
    }
}
