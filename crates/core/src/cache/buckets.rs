//! Named cache buckets and the responses stored in them.
//!
//! A bucket is a key/value store where the key is the request hash
//! (see [`request_key`](super::hash::request_key)) and the value is a stored
//! response. Writes are last-writer-wins; there is no eviction.

use super::connection::CacheDb;
use crate::Error;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

/// A response persisted in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub key: String,
    pub url: String,
    pub method: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Manifest revision for precached entries.
    pub revision: Option<String>,
    pub stored_at: String,
}

impl StoredResponse {
    /// Build an entry stamped with the current time.
    pub fn new(
        key: String, url: String, method: String, status: u16, status_text: String, headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            key,
            url,
            method,
            status,
            status_text,
            headers,
            body,
            revision: None,
            stored_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }
}

const ENTRY_COLUMNS: &str = "e.key, e.url, e.method, e.status, e.status_text, e.headers_json, e.body, e.revision, e.stored_at";

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(StoredResponse, String)> {
    let headers_json: String = row.get(5)?;
    let entry = StoredResponse {
        key: row.get(0)?,
        url: row.get(1)?,
        method: row.get(2)?,
        status: row.get(3)?,
        status_text: row.get(4)?,
        headers: Vec::new(),
        body: row.get(6)?,
        revision: row.get(7)?,
        stored_at: row.get(8)?,
    };
    Ok((entry, headers_json))
}

fn decode(found: rusqlite::Result<(StoredResponse, String)>) -> Result<Option<StoredResponse>, Error> {
    match found {
        Ok((mut entry, headers_json)) => {
            entry.headers = serde_json::from_str(&headers_json)?;
            Ok(Some(entry))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn ensure_bucket(conn: &rusqlite::Connection, name: &str) -> Result<i64, Error> {
    conn.execute(
        "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
        params![name, Utc::now().to_rfc3339()],
    )?;
    let id = conn.query_row("SELECT id FROM buckets WHERE name = ?1", params![name], |row| row.get(0))?;
    Ok(id)
}

fn upsert_entry(conn: &rusqlite::Connection, bucket_id: i64, entry: &StoredResponse) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&entry.headers)?;
    conn.execute(
        "INSERT INTO entries (bucket_id, key, url, method, status, status_text, headers_json, body, revision, stored_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(bucket_id, key) DO UPDATE SET
            url = excluded.url,
            method = excluded.method,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            revision = excluded.revision,
            stored_at = excluded.stored_at",
        params![
            bucket_id,
            &entry.key,
            &entry.url,
            &entry.method,
            entry.status,
            &entry.status_text,
            headers_json,
            &entry.body,
            &entry.revision,
            &entry.stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Bucket names in creation order.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Whether a bucket with this name exists.
    pub async fn has_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM buckets WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Create the bucket if it does not exist yet.
    pub async fn open_bucket(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_bucket(conn, &name)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a bucket and all of its entries.
    ///
    /// Returns false if no such bucket existed.
    pub async fn delete_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every bucket. Returns the number of buckets removed.
    pub async fn clear(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM buckets", [])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry in one bucket.
    ///
    /// A missing bucket behaves like an empty one.
    pub async fn match_entry(&self, bucket: &str, key: &str) -> Result<Option<StoredResponse>, Error> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let sql = format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e JOIN buckets b ON b.id = e.bucket_id
                     WHERE b.name = ?1 AND e.key = ?2"
                );
                decode(conn.query_row(&sql, params![bucket, key], row_to_entry))
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry across all buckets, oldest bucket first.
    pub async fn match_any(&self, key: &str) -> Result<Option<StoredResponse>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let sql = format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e JOIN buckets b ON b.id = e.bucket_id
                     WHERE e.key = ?1 ORDER BY b.id ASC LIMIT 1"
                );
                decode(conn.query_row(&sql, params![key], row_to_entry))
            })
            .await
            .map_err(Error::from)
    }

    /// Store an entry, creating the bucket on first use.
    ///
    /// Concurrent writers to the same key are not coordinated: the last write wins.
    pub async fn put(&self, bucket: &str, entry: &StoredResponse) -> Result<(), Error> {
        let bucket = bucket.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let bucket_id = ensure_bucket(conn, &bucket)?;
                upsert_entry(conn, bucket_id, &entry)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a batch of entries in one transaction.
    ///
    /// Either the bucket ends up holding every entry or the database is left
    /// untouched, including the bucket row itself.
    pub async fn put_all(&self, bucket: &str, entries: Vec<StoredResponse>) -> Result<(), Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let bucket_id = ensure_bucket(&tx, &bucket)?;
                for entry in &entries {
                    upsert_entry(&tx, bucket_id, entry)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a bucket (0 when the bucket is missing).
    pub async fn count(&self, bucket: &str) -> Result<u64, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries e JOIN buckets b ON b.id = e.bucket_id WHERE b.name = ?1",
                    params![bucket],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Every bucket with its entry count, in creation order.
    pub async fn bucket_stats(&self) -> Result<Vec<(String, u64)>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<(String, u64)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT b.name, COUNT(e.key) FROM buckets b
                     LEFT JOIN entries e ON e.bucket_id = b.id
                     GROUP BY b.id ORDER BY b.id ASC",
                )?;
                let stats = stmt
                    .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::request_key;

    fn make_entry(url: &str, body: &str) -> StoredResponse {
        StoredResponse::new(
            request_key("GET", url),
            url.to_string(),
            "GET".to_string(),
            200,
            "OK".to_string(),
            vec![("content-type".to_string(), "application/json".to_string())],
            body.as_bytes().to_vec(),
        )
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = make_entry("https://example.com/a.json", r#"{"rate":1.2}"#);

        db.put("runtime-v1", &entry).await.unwrap();

        let found = db.match_entry("runtime-v1", &entry.key).await.unwrap().unwrap();
        assert_eq!(found.body, entry.body);
        assert_eq!(found.headers, entry.headers);
        assert_eq!(found.status, 200);
    }

    #[tokio::test]
    async fn test_match_missing_bucket() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.match_entry("nope", "nokey").await.unwrap().is_none());
        assert!(!db.has_bucket("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("b", &make_entry("https://example.com/a", "old")).await.unwrap();
        db.put("b", &make_entry("https://example.com/a", "new")).await.unwrap();

        let key = request_key("GET", "https://example.com/a");
        let found = db.match_entry("b", &key).await.unwrap().unwrap();
        assert_eq!(found.body, b"new");
        assert_eq!(db.count("b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_match_any_prefers_oldest_bucket() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("precache", &make_entry("https://example.com/index.html", "shell")).await.unwrap();
        db.put("runtime", &make_entry("https://example.com/index.html", "fresh")).await.unwrap();

        let key = request_key("GET", "https://example.com/index.html");
        let found = db.match_any(&key).await.unwrap().unwrap();
        assert_eq!(found.body, b"shell");
    }

    #[tokio::test]
    async fn test_delete_bucket_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = make_entry("https://example.com/a", "x");
        db.put("old-v0", &entry).await.unwrap();

        assert!(db.delete_bucket("old-v0").await.unwrap());
        assert!(!db.delete_bucket("old-v0").await.unwrap());
        assert!(db.match_any(&entry.key).await.unwrap().is_none());
        assert!(db.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keys_in_creation_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_bucket("a-v1").await.unwrap();
        db.open_bucket("b-v1").await.unwrap();
        db.open_bucket("a-v1").await.unwrap();
        assert_eq!(db.keys().await.unwrap(), vec!["a-v1".to_string(), "b-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_put_all_and_stats() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entries = vec![
            make_entry("https://example.com/", "root").with_revision(Some("r1".into())),
            make_entry("https://example.com/offline.html", "offline"),
        ];
        db.put_all("precache-v1", entries).await.unwrap();
        db.open_bucket("runtime-v1").await.unwrap();

        let stats = db.bucket_stats().await.unwrap();
        assert_eq!(stats, vec![("precache-v1".to_string(), 2), ("runtime-v1".to_string(), 0)]);

        let root = db
            .match_entry("precache-v1", &request_key("GET", "https://example.com/"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(root.revision.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_clear() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_bucket("a").await.unwrap();
        db.open_bucket("b").await.unwrap();
        assert_eq!(db.clear().await.unwrap(), 2);
        assert!(db.keys().await.unwrap().is_empty());
    }
}
