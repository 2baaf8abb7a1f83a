//! File write path: hashed, transactional upsert of a file row, its
//! symbols, and its full-text document.

use crate::error::StoreResult;
use crate::store::Store;
use chrono::{DateTime, Utc};
use codescope_core::{FileRecord, Language, ShardSymbol};
use rusqlite::{Row, params};
use sha2::{Digest, Sha256};
use tracing::debug;

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
  /// Content hash matched the stored row; nothing written
  Unchanged,
  Inserted,
  Updated,
}

/// sha256 hex of file bytes at index time
pub fn content_hash(content: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(content.as_bytes());
  hex::encode(hasher.finalize())
}

pub(crate) fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
  let language: Option<String> = row.get(4)?;
  let indexed_at: String = row.get(7)?;

  Ok(FileRecord {
    id: row.get(0)?,
    repo_id: row.get(1)?,
    abs_path: row.get(2)?,
    rel_path: row.get(3)?,
    language: language.as_deref().and_then(Language::parse),
    size: row.get(5)?,
    hash: row.get(6)?,
    indexed_at: DateTime::parse_from_rfc3339(&indexed_at)
      .map(|t| t.with_timezone(&Utc))
      .unwrap_or_default(),
  })
}

pub(crate) const FILE_COLUMNS: &str = "id, repo_id, abs_path, rel_path, language, size, hash, indexed_at";

impl Store {
  /// Insert or replace a file, its symbols, and its BM25 document in one
  /// transaction. Returns `Unchanged` without writing when the content hash
  /// matches the stored row and `force` is not set.
  #[allow(clippy::too_many_arguments)]
  pub fn upsert_file(
    &self,
    repo_id: i64,
    abs_path: &str,
    rel_path: &str,
    content: &str,
    language: Option<Language>,
    symbols: &[ShardSymbol],
    force: bool,
  ) -> StoreResult<UpsertOutcome> {
    let hash = content_hash(content);

    self.with_conn_mut(|conn| {
      let existing: Option<(i64, String, String)> = conn
        .query_row(
          "SELECT id, hash, abs_path FROM files WHERE repo_id = ?1 AND rel_path = ?2",
          params![repo_id, rel_path],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map(Some)
        .or_else(|e| match e {
          rusqlite::Error::QueryReturnedNoRows => Ok(None),
          other => Err(other),
        })?;

      if let Some((_, ref stored_hash, _)) = existing
        && stored_hash == &hash
        && !force
      {
        debug!(rel_path, "File unchanged, skipping");
        return Ok(UpsertOutcome::Unchanged);
      }

      let tx = conn.transaction()?;
      let now = Utc::now().to_rfc3339();

      let (file_id, outcome) = match existing {
        Some((id, _, old_abs_path)) => {
          tx.execute("DELETE FROM symbols WHERE file_id = ?1", params![id])?;
          // The BM25 row is keyed by path, which may have moved
          tx.execute("DELETE FROM bm25_content WHERE filepath = ?1", params![old_abs_path])?;
          tx.execute(
            "UPDATE files SET abs_path = ?1, language = ?2, size = ?3, hash = ?4, indexed_at = ?5 WHERE id = ?6",
            params![abs_path, language.map(|l| l.as_str()), content.len() as i64, hash, now, id],
          )?;
          (id, UpsertOutcome::Updated)
        }
        None => {
          tx.execute(
            "INSERT INTO files (repo_id, abs_path, rel_path, language, size, hash, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
              repo_id,
              abs_path,
              rel_path,
              language.map(|l| l.as_str()),
              content.len() as i64,
              hash,
              now
            ],
          )?;
          (tx.last_insert_rowid(), UpsertOutcome::Inserted)
        }
      };

      {
        let mut insert = tx.prepare(
          "INSERT INTO symbols (file_id, name, kind, line_start, line_end, signature, doc)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for symbol in symbols {
          insert.execute(params![
            file_id,
            symbol.name,
            symbol.kind.as_str(),
            symbol.line_start,
            symbol.line_end,
            symbol.signature,
            symbol.doc,
          ])?;
        }
      }

      tx.execute("DELETE FROM bm25_content WHERE filepath = ?1", params![abs_path])?;
      tx.execute(
        "INSERT INTO bm25_content (filepath, content) VALUES (?1, ?2)",
        params![abs_path, content],
      )?;

      tx.commit()?;
      debug!(rel_path, symbols = symbols.len(), ?outcome, "File upserted");
      Ok(outcome)
    })
  }

  /// Fetch a file row by (repo, relative path)
  pub fn get_file(&self, repo_id: i64, rel_path: &str) -> StoreResult<Option<FileRecord>> {
    self.with_conn(|conn| {
      let result = conn.query_row(
        &format!("SELECT {FILE_COLUMNS} FROM files WHERE repo_id = ?1 AND rel_path = ?2"),
        params![repo_id, rel_path],
        file_from_row,
      );
      match result {
        Ok(file) => Ok(Some(file)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
      }
    })
  }

  /// Remove a file, its symbols, and its BM25 document
  pub fn remove_file(&self, repo_id: i64, rel_path: &str) -> StoreResult<bool> {
    self.with_conn_mut(|conn| {
      let tx = conn.transaction()?;

      let abs_path: Option<String> = tx
        .query_row(
          "SELECT abs_path FROM files WHERE repo_id = ?1 AND rel_path = ?2",
          params![repo_id, rel_path],
          |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
          rusqlite::Error::QueryReturnedNoRows => Ok(None),
          other => Err(other),
        })?;

      let Some(abs_path) = abs_path else {
        return Ok(false);
      };

      tx.execute(
        "DELETE FROM files WHERE repo_id = ?1 AND rel_path = ?2",
        params![repo_id, rel_path],
      )?;
      tx.execute("DELETE FROM bm25_content WHERE filepath = ?1", params![abs_path])?;
      tx.commit()?;
      Ok(true)
    })
  }

  /// Number of files in one repository
  pub fn file_count(&self, repo_id: i64) -> StoreResult<u64> {
    self.with_conn(|conn| {
      Ok(conn.query_row(
        "SELECT COUNT(*) FROM files WHERE repo_id = ?1",
        params![repo_id],
        |r| r.get(0),
      )?)
    })
  }
}
