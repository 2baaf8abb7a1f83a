//! Schema DDL and versioning.
//!
//! The schema version lives in the `meta` table; the store refuses to open
//! a database written by a newer version.

use crate::error::{StoreError, StoreResult};
use rusqlite::Connection;

/// Highest schema version this build understands
pub const SCHEMA_VERSION: i64 = 1;

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS repositories (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  path TEXT NOT NULL UNIQUE,
  name TEXT NOT NULL,
  metadata TEXT NOT NULL DEFAULT '{}',
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  repo_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
  abs_path TEXT NOT NULL,
  rel_path TEXT NOT NULL,
  language TEXT,
  size INTEGER NOT NULL DEFAULT 0,
  hash TEXT NOT NULL,
  indexed_at TEXT NOT NULL,
  UNIQUE(repo_id, rel_path)
);

CREATE TABLE IF NOT EXISTS symbols (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
  name TEXT NOT NULL,
  kind TEXT NOT NULL,
  line_start INTEGER NOT NULL,
  line_end INTEGER NOT NULL,
  signature TEXT NOT NULL DEFAULT '',
  doc TEXT
);

CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id);
CREATE INDEX IF NOT EXISTS idx_files_language ON files(language);
CREATE INDEX IF NOT EXISTS idx_files_repo ON files(repo_id);

CREATE VIRTUAL TABLE IF NOT EXISTS bm25_content USING fts5(filepath, content);
"#;

/// Apply pragmas, create tables, and check/record the schema version
pub fn initialize(conn: &Connection) -> StoreResult<()> {
  // journal_mode returns a row, so it cannot go through execute_batch
  let _mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
  conn.pragma_update(None, "foreign_keys", "ON")?;
  conn.execute_batch(DDL)?;

  match read_version(conn)? {
    Some(found) if found > SCHEMA_VERSION => {
      return Err(StoreError::SchemaMismatch {
        found,
        supported: SCHEMA_VERSION,
      });
    }
    Some(_) => {}
    None => {
      conn.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
      )?;
    }
  }

  Ok(())
}

pub fn read_version(conn: &Connection) -> StoreResult<Option<i64>> {
  let mut stmt = conn.prepare("SELECT value FROM meta WHERE key = 'schema_version'")?;
  let mut rows = stmt.query([])?;

  match rows.next()? {
    Some(row) => {
      let raw: String = row.get(0)?;
      let version = raw
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("bad schema_version: {raw}")))?;
      Ok(Some(version))
    }
    None => Ok(None),
  }
}
