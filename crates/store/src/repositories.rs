//! Repository lifecycle: creation, listing with metadata filters, cascade
//! delete, and temporary-repository cleanup.

use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use chrono::{DateTime, Utc};
use codescope_core::{RepoMetadata, Repository};
use rusqlite::params;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Optional filters for `list_repositories`
#[derive(Debug, Clone, Default)]
pub struct RepoFilter {
  pub repo_type: Option<String>,
  pub language: Option<String>,
  pub temporary: Option<bool>,
}

/// On-demand per-repository breakdown
#[derive(Debug, Clone, serde::Serialize)]
pub struct RepoStats {
  pub repo_id: i64,
  pub files: u64,
  pub symbols: u64,
  pub languages: BTreeMap<String, u64>,
}

fn repo_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Repository> {
  let metadata: String = row.get(3)?;
  let created_at: String = row.get(4)?;

  Ok(Repository {
    id: row.get(0)?,
    path: row.get(1)?,
    name: row.get(2)?,
    metadata: serde_json::from_str(&metadata).unwrap_or_default(),
    created_at: DateTime::parse_from_rfc3339(&created_at)
      .map(|t| t.with_timezone(&Utc))
      .unwrap_or_default(),
  })
}

impl Store {
  /// Insert a repository row, returning its stable id. Re-registering an
  /// existing path updates the name and metadata and returns the same id.
  pub fn create_repository(&self, path: &str, name: &str, metadata: &RepoMetadata) -> StoreResult<i64> {
    self.with_conn(|conn| {
      let metadata_json = serde_json::to_string(metadata)?;
      let existing: Option<i64> = conn
        .query_row("SELECT id FROM repositories WHERE path = ?1", params![path], |r| r.get(0))
        .map(Some)
        .or_else(|e| match e {
          rusqlite::Error::QueryReturnedNoRows => Ok(None),
          other => Err(other),
        })?;

      if let Some(id) = existing {
        conn.execute(
          "UPDATE repositories SET name = ?1, metadata = ?2 WHERE id = ?3",
          params![name, metadata_json, id],
        )?;
        debug!(path, id, "Repository re-registered");
        return Ok(id);
      }

      conn.execute(
        "INSERT INTO repositories (path, name, metadata, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![path, name, metadata_json, Utc::now().to_rfc3339()],
      )?;
      let id = conn.last_insert_rowid();
      info!(path, id, "Repository created");
      Ok(id)
    })
  }

  pub fn get_repository(&self, id: i64) -> StoreResult<Repository> {
    self.with_conn(|conn| {
      conn
        .query_row(
          "SELECT id, path, name, metadata, created_at FROM repositories WHERE id = ?1",
          params![id],
          repo_from_row,
        )
        .map_err(|e| match e {
          rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(format!("repository {id}")),
          other => other.into(),
        })
    })
  }

  pub fn get_repository_by_path(&self, path: &str) -> StoreResult<Option<Repository>> {
    self.with_conn(|conn| {
      let result = conn.query_row(
        "SELECT id, path, name, metadata, created_at FROM repositories WHERE path = ?1",
        params![path],
        repo_from_row,
      );
      match result {
        Ok(repo) => Ok(Some(repo)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
      }
    })
  }

  /// List repositories, filtered on metadata fields in memory (the metadata
  /// column is a JSON blob; repositories are few)
  pub fn list_repositories(&self, filter: &RepoFilter) -> StoreResult<Vec<Repository>> {
    let all: Vec<Repository> = self.with_conn(|conn| {
      let mut stmt =
        conn.prepare("SELECT id, path, name, metadata, created_at FROM repositories ORDER BY id ASC")?;
      let rows = stmt.query_map([], repo_from_row)?.collect::<rusqlite::Result<_>>()?;
      Ok(rows)
    })?;

    Ok(
      all
        .into_iter()
        .filter(|repo| {
          if let Some(ref t) = filter.repo_type
            && repo.metadata.repo_type.as_str() != t
          {
            return false;
          }
          if let Some(ref lang) = filter.language
            && repo.metadata.language.as_deref() != Some(lang.as_str())
          {
            return false;
          }
          if let Some(temp) = filter.temporary
            && repo.metadata.temporary != temp
          {
            return false;
          }
          true
        })
        .collect(),
    )
  }

  /// Delete a repository and cascade to files, symbols, and BM25 documents
  pub fn delete_repository(&self, id: i64) -> StoreResult<()> {
    self.with_conn_mut(|conn| {
      let tx = conn.transaction()?;

      // The FTS table has no foreign key; clear its rows first
      tx.execute(
        "DELETE FROM bm25_content WHERE filepath IN (SELECT abs_path FROM files WHERE repo_id = ?1)",
        params![id],
      )?;
      let deleted = tx.execute("DELETE FROM repositories WHERE id = ?1", params![id])?;
      tx.commit()?;

      if deleted == 0 {
        return Err(StoreError::NotFound(format!("repository {id}")));
      }
      info!(id, "Repository deleted");
      Ok(())
    })
  }

  /// Delete temporary repositories whose cleanup window has passed.
  /// Returns the ids that were removed.
  pub fn cleanup_expired_repositories(&self, now: DateTime<Utc>) -> StoreResult<Vec<i64>> {
    let expired: Vec<i64> = self
      .list_repositories(&RepoFilter {
        temporary: Some(true),
        ..RepoFilter::default()
      })?
      .into_iter()
      .filter(|repo| repo.metadata.cleanup_after.is_some_and(|t| t <= now))
      .map(|repo| repo.id)
      .collect();

    for id in &expired {
      self.delete_repository(*id)?;
    }

    if !expired.is_empty() {
      info!(count = expired.len(), "Expired temporary repositories removed");
    }
    Ok(expired)
  }

  /// File/symbol counts and a language histogram for one repository
  pub fn repo_stats(&self, repo_id: i64) -> StoreResult<RepoStats> {
    let files = self.file_count(repo_id)?;
    let symbols = self.symbol_count(repo_id)?;

    let languages = self.with_conn(|conn| {
      let mut stmt = conn.prepare(
        "SELECT language, COUNT(*) FROM files WHERE repo_id = ?1 AND language IS NOT NULL GROUP BY language",
      )?;
      let rows: Vec<(String, u64)> = stmt
        .query_map(params![repo_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<_>>()?;
      Ok(rows.into_iter().collect())
    })?;

    Ok(RepoStats {
      repo_id,
      files,
      symbols,
      languages,
    })
  }
}
