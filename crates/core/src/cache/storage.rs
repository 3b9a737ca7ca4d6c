//! The cache storage interface and its SQLite implementation.
//!
//! Operations mirror the browser's Cache Storage: generations are opened by
//! name, entries are put and matched by request URL, and whole generations
//! are deleted by name. Each put or delete is atomic; `put_all` commits a
//! batch in one transaction so a generation is never left half written.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::generation::GenerationName;
use super::response::CachedResponse;
use crate::Error;

/// Keyed collections of (request URL, response) pairs, grouped by generation.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the generation if it does not exist yet.
    async fn open(&self, name: &GenerationName) -> Result<(), Error>;

    /// Store one response, creating the generation if needed. Replaces any
    /// entry with the same URL.
    async fn put(&self, name: &GenerationName, response: CachedResponse) -> Result<(), Error>;

    /// Store a batch of responses atomically: either all land or none do.
    async fn put_all(&self, name: &GenerationName, responses: Vec<CachedResponse>) -> Result<(), Error>;

    /// Exact-URL lookup within one generation.
    async fn match_url(&self, name: &GenerationName, url: &str) -> Result<Option<CachedResponse>, Error>;

    /// Exact-URL lookup across all generations, oldest generation first.
    async fn match_any(&self, url: &str) -> Result<Option<CachedResponse>, Error>;

    /// Generation names in creation order.
    async fn keys(&self) -> Result<Vec<GenerationName>, Error>;

    /// Every entry of a generation keyed by URL. Empty if it does not exist.
    async fn entries(&self, name: &GenerationName) -> Result<BTreeMap<String, CachedResponse>, Error>;

    /// Number of entries in a generation, without loading bodies.
    async fn count(&self, name: &GenerationName) -> Result<usize, Error>;

    /// Delete a generation and its entries. Returns whether it existed.
    async fn delete(&self, name: &GenerationName) -> Result<bool, Error>;

    /// Delete one entry. Returns whether it existed.
    async fn delete_entry(&self, name: &GenerationName, url: &str) -> Result<bool, Error>;
}

const ENTRY_COLUMNS: &str = "e.url, e.status, e.content_type, e.body, e.body_sha256, e.stored_at";

const UPSERT_ENTRY: &str = "INSERT INTO entries (
        generation_id, url, status, content_type, body, body_sha256, stored_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(generation_id, url) DO UPDATE SET
        status = excluded.status,
        content_type = excluded.content_type,
        body = excluded.body,
        body_sha256 = excluded.body_sha256,
        stored_at = excluded.stored_at";

fn row_to_response(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedResponse> {
    Ok(CachedResponse {
        url: row.get(0)?,
        status: row.get(1)?,
        content_type: row.get(2)?,
        body: Bytes::from(row.get::<_, Vec<u8>>(3)?),
        body_sha256: row.get(4)?,
        stored_at: row.get(5)?,
    })
}

/// Insert the generation if absent and return its row id.
fn ensure_generation(conn: &rusqlite::Connection, name: &str) -> Result<i64, Error> {
    conn.execute(
        "INSERT INTO generations (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    let id = conn.query_row("SELECT id FROM generations WHERE name = ?1", params![name], |row| row.get(0))?;
    Ok(id)
}

fn insert_entry(stmt: &mut rusqlite::Statement<'_>, generation_id: i64, response: &CachedResponse) -> Result<(), Error> {
    stmt.execute(params![
        generation_id,
        &response.url,
        response.status,
        &response.content_type,
        response.body.as_ref(),
        &response.body_sha256,
        &response.stored_at,
    ])?;
    Ok(())
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &GenerationName) -> Result<(), Error> {
        let name = name.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_generation(conn, &name)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, name: &GenerationName, response: CachedResponse) -> Result<(), Error> {
        self.put_all(name, vec![response]).await
    }

    async fn put_all(&self, name: &GenerationName, responses: Vec<CachedResponse>) -> Result<(), Error> {
        let name = name.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let generation_id = ensure_generation(&tx, &name)?;
                {
                    let mut stmt = tx.prepare(UPSERT_ENTRY)?;
                    for response in &responses {
                        insert_entry(&mut stmt, generation_id, response)?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn match_url(&self, name: &GenerationName, url: &str) -> Result<Option<CachedResponse>, Error> {
        let name = name.as_str().to_string();
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e
                     JOIN generations g ON g.id = e.generation_id
                     WHERE g.name = ?1 AND e.url = ?2"
                ))?;

                match stmt.query_row(params![name, url], row_to_response) {
                    Ok(response) => Ok(Some(response)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn match_any(&self, url: &str) -> Result<Option<CachedResponse>, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e
                     JOIN generations g ON g.id = e.generation_id
                     WHERE e.url = ?1
                     ORDER BY g.id ASC LIMIT 1"
                ))?;

                match stmt.query_row(params![url], row_to_response) {
                    Ok(response) => Ok(Some(response)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<GenerationName>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationName>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .map(|name| name.map(GenerationName::from))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn entries(&self, name: &GenerationName) -> Result<BTreeMap<String, CachedResponse>, Error> {
        let name = name.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<BTreeMap<String, CachedResponse>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e
                     JOIN generations g ON g.id = e.generation_id
                     WHERE g.name = ?1"
                ))?;
                let mut entries = BTreeMap::new();
                for response in stmt.query_map(params![name], row_to_response)? {
                    let response = response?;
                    entries.insert(response.url.clone(), response);
                }
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    async fn count(&self, name: &GenerationName) -> Result<usize, Error> {
        let name = name.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries e
                     JOIN generations g ON g.id = e.generation_id
                     WHERE g.name = ?1",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &GenerationName) -> Result<bool, Error> {
        let name = name.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_entry(&self, name: &GenerationName, url: &str) -> Result<bool, Error> {
        let name = name.as_str().to_string();
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries
                     WHERE url = ?2 AND generation_id = (SELECT id FROM generations WHERE name = ?1)",
                    params![name, url],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
