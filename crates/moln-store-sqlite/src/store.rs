//! [`SqliteStore`], the SQLite implementation of [`KeyValueStore`].

use std::path::Path;

use moln_core::store::{Fields, KeyValueStore};

use crate::{Result, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Moln key-value store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every call
/// runs on the connection's own thread, one at a time, so each primitive is
/// atomic on its own. Sequences of primitives are not.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── KeyValueStore impl ──────────────────────────────────────────────────────

impl KeyValueStore for SqliteStore {
  type Error = crate::Error;

  async fn exists(&self, key: &str) -> Result<bool> {
    let key = key.to_owned();
    let found = self
      .conn
      .call(move |conn| {
        let found: bool = conn.query_row(
          "SELECT EXISTS (SELECT 1 FROM hash_fields WHERE key = ?1)
               OR EXISTS (SELECT 1 FROM set_members WHERE key = ?1)
               OR EXISTS (SELECT 1 FROM list_items  WHERE key = ?1)
               OR EXISTS (SELECT 1 FROM counters    WHERE key = ?1)",
          rusqlite::params![key],
          |row| row.get(0),
        )?;
        Ok(found)
      })
      .await?;
    Ok(found)
  }

  async fn delete(&self, key: &str) -> Result<()> {
    let key = key.to_owned();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for table in ["hash_fields", "set_members", "list_items", "counters"] {
          tx.execute(
            &format!("DELETE FROM {table} WHERE key = ?1"),
            rusqlite::params![key],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Hashes ────────────────────────────────────────────────────────────

  async fn hash_get_all(&self, key: &str) -> Result<Option<Fields>> {
    let key = key.to_owned();
    let fields = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT field, value FROM hash_fields WHERE key = ?1")?;
        let fields = stmt
          .query_map(rusqlite::params![key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
          })?
          .collect::<rusqlite::Result<Fields>>()?;
        Ok(fields)
      })
      .await?;
    Ok((!fields.is_empty()).then_some(fields))
  }

  async fn hash_set(&self, key: &str, fields: Vec<(String, String)>) -> Result<()> {
    let key = key.to_owned();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO hash_fields (key, field, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (key, field) DO UPDATE SET value = excluded.value",
          )?;
          for (field, value) in &fields {
            stmt.execute(rusqlite::params![key, field, value])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Sets ──────────────────────────────────────────────────────────────

  async fn set_add(&self, key: &str, member: &str) -> Result<()> {
    let (key, member) = (key.to_owned(), member.to_owned());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO set_members (key, member) VALUES (?1, ?2)",
          rusqlite::params![key, member],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
    let (key, member) = (key.to_owned(), member.to_owned());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM set_members WHERE key = ?1 AND member = ?2",
          rusqlite::params![key, member],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn set_members(&self, key: &str) -> Result<Vec<String>> {
    let key = key.to_owned();
    let members = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT member FROM set_members WHERE key = ?1")?;
        let members = stmt
          .query_map(rusqlite::params![key], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(members)
      })
      .await?;
    Ok(members)
  }

  // ── Lists ─────────────────────────────────────────────────────────────

  async fn list_prepend(&self, key: &str, value: &str) -> Result<()> {
    let (key, value) = (key.to_owned(), value.to_owned());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO list_items (key, position, value)
           SELECT ?1, COALESCE(MIN(position), 0) - 1, ?2
           FROM list_items WHERE key = ?1",
          rusqlite::params![key, value],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_range(&self, key: &str) -> Result<Vec<String>> {
    let key = key.to_owned();
    let values = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT value FROM list_items WHERE key = ?1 ORDER BY position ASC",
        )?;
        let values = stmt
          .query_map(rusqlite::params![key], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(values)
      })
      .await?;
    Ok(values)
  }

  // ── Counters ──────────────────────────────────────────────────────────

  async fn incr(&self, key: &str) -> Result<i64> {
    let key = key.to_owned();
    let value = self
      .conn
      .call(move |conn| {
        let value: i64 = conn.query_row(
          "INSERT INTO counters (key, value) VALUES (?1, 1)
           ON CONFLICT (key) DO UPDATE SET value = value + 1
           RETURNING value",
          rusqlite::params![key],
          |row| row.get(0),
        )?;
        Ok(value)
      })
      .await?;
    Ok(value)
  }
}
