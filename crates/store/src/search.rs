//! Ranked full-text search over the FTS5 virtual table.

use crate::error::StoreResult;
use crate::store::Store;
use rusqlite::params;
use tracing::debug;

/// A BM25-ranked hit
#[derive(Debug, Clone, serde::Serialize)]
pub struct Bm25Hit {
  pub filepath: String,
  pub snippet: String,
  /// Higher is better (negated FTS5 rank)
  pub score: f64,
}

/// Quote each whitespace token so user input can never be parsed as FTS5
/// query syntax (`AND`, `NEAR`, unbalanced quotes, ...).
fn sanitize_match_query(query: &str) -> String {
  query
    .split_whitespace()
    .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
    .collect::<Vec<_>>()
    .join(" ")
}

impl Store {
  /// BM25 search; results ordered best-first, at most `limit` rows
  pub fn bm25_search(&self, query: &str, limit: usize) -> StoreResult<Vec<Bm25Hit>> {
    let sanitized = sanitize_match_query(query);
    if sanitized.is_empty() {
      return Ok(Vec::new());
    }

    self.with_conn(|conn| {
      let mut stmt = conn.prepare(
        "SELECT filepath, snippet(bm25_content, 1, '', '', '…', 10), rank
         FROM bm25_content WHERE bm25_content MATCH ?1
         ORDER BY rank LIMIT ?2",
      )?;

      let hits: Vec<Bm25Hit> = stmt
        .query_map(params![sanitized, limit as i64], |row| {
          let rank: f64 = row.get(2)?;
          Ok(Bm25Hit {
            filepath: row.get(0)?,
            snippet: row.get(1)?,
            score: -rank,
          })
        })?
        .collect::<rusqlite::Result<_>>()?;

      debug!(query, hits = hits.len(), "BM25 search");
      Ok(hits)
    })
  }

  /// BM25 search restricted to one repository's files
  pub fn bm25_search_scoped(&self, query: &str, limit: usize, repo_id: i64) -> StoreResult<Vec<Bm25Hit>> {
    let sanitized = sanitize_match_query(query);
    if sanitized.is_empty() {
      return Ok(Vec::new());
    }

    self.with_conn(|conn| {
      let mut stmt = conn.prepare(
        "SELECT filepath, snippet(bm25_content, 1, '', '', '…', 10), rank
         FROM bm25_content
         WHERE bm25_content MATCH ?1
           AND filepath IN (SELECT abs_path FROM files WHERE repo_id = ?3)
         ORDER BY rank LIMIT ?2",
      )?;

      let hits: Vec<Bm25Hit> = stmt
        .query_map(params![sanitized, limit as i64, repo_id], |row| {
          let rank: f64 = row.get(2)?;
          Ok(Bm25Hit {
            filepath: row.get(0)?,
            snippet: row.get(1)?,
            score: -rank,
          })
        })?
        .collect::<rusqlite::Result<_>>()?;

      Ok(hits)
    })
  }

  /// Full stored content of one BM25 document
  pub fn bm25_document(&self, filepath: &str) -> StoreResult<Option<String>> {
    self.with_conn(|conn| {
      let result = conn.query_row(
        "SELECT content FROM bm25_content WHERE filepath = ?1",
        params![filepath],
        |row| row.get(0),
      );
      match result {
        Ok(content) => Ok(Some(content)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
      }
    })
  }
}
