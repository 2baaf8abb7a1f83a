//! Staleness probe: sample stored paths and check they still exist.

use crate::error::StoreResult;
use crate::store::Store;
use std::path::Path;
use tracing::debug;

/// Result of an index validation pass
#[derive(Debug, Clone, serde::Serialize)]
pub struct ValidationReport {
  pub valid: bool,
  pub issues: Vec<String>,
  pub files: u64,
  pub bm25_documents: u64,
  pub sampled: u32,
  pub missing: u32,
}

impl Store {
  /// Sample up to 10 BM25 rows and check the stored paths against the
  /// filesystem. The index is stale when more than half the sample is
  /// missing, or when it has file rows but no BM25 documents.
  pub fn validate(&self) -> StoreResult<ValidationReport> {
    let counts = self.counts()?;

    let sample: Vec<String> = self.with_conn(|conn| {
      let mut stmt = conn.prepare("SELECT filepath FROM bm25_content LIMIT 10")?;
      let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
      Ok(rows)
    })?;

    let mut issues = Vec::new();
    let mut missing = 0u32;

    for filepath in &sample {
      if !Path::new(filepath).exists() {
        missing += 1;
        issues.push(format!("missing on filesystem: {filepath}"));
      }
    }

    let sampled = sample.len() as u32;
    let mut valid = true;

    if sampled > 0 && missing * 2 > sampled {
      valid = false;
      issues.push(format!("{missing} of {sampled} sampled paths do not exist"));
    }

    if counts.bm25_documents == 0 && counts.files > 0 {
      valid = false;
      issues.push(format!(
        "{} file rows but no BM25 documents",
        counts.files
      ));
    }

    debug!(valid, sampled, missing, "Index validation");
    Ok(ValidationReport {
      valid,
      issues,
      files: counts.files,
      bm25_documents: counts.bm25_documents,
      sampled,
      missing,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use codescope_core::{Language, RepoMetadata};
  use std::io::Write;
  use tempfile::TempDir;

  fn index_real_file(store: &Store, repo_id: i64, dir: &TempDir, name: &str) {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "fn main() {{}}").unwrap();
    store
      .upsert_file(
        repo_id,
        &path.to_string_lossy(),
        name,
        "fn main() {}",
        Some(Language::Rust),
        &[],
        false,
      )
      .unwrap();
  }

  #[test]
  fn test_valid_index() {
    let dir = TempDir::new().unwrap();
    let store = Store::open_in_memory().unwrap();
    let repo_id = store.create_repository("/w", "w", &RepoMetadata::default()).unwrap();

    for i in 0..3 {
      index_real_file(&store, repo_id, &dir, &format!("f{i}.rs"));
    }

    let report = store.validate().unwrap();
    assert!(report.valid, "issues: {:?}", report.issues);
    assert_eq!(report.missing, 0);
  }

  #[test]
  fn test_stale_when_paths_vanish() {
    let store = Store::open_in_memory().unwrap();
    let repo_id = store.create_repository("/w", "w", &RepoMetadata::default()).unwrap();

    // Paths that never existed on this host
    for i in 0..4 {
      store
        .upsert_file(
          repo_id,
          &format!("/nonexistent/codescope-test/f{i}.rs"),
          &format!("f{i}.rs"),
          "x",
          Some(Language::Rust),
          &[],
          false,
        )
        .unwrap();
    }

    let report = store.validate().unwrap();
    assert!(!report.valid);
    assert_eq!(report.missing, 4);
  }

  #[test]
  fn test_stale_when_bm25_empty_but_files_exist() {
    let store = Store::open_in_memory().unwrap();
    let repo_id = store.create_repository("/w", "w", &RepoMetadata::default()).unwrap();
    store
      .upsert_file(repo_id, "/w/a.rs", "a.rs", "x", Some(Language::Rust), &[], false)
      .unwrap();

    // Simulate a torn index: drop the BM25 row out-of-band
    store
      .with_conn(|conn| {
        conn.execute("DELETE FROM bm25_content", []).map_err(Into::into)
      })
      .map(|_: usize| ())
      .unwrap();

    let report = store.validate().unwrap();
    assert!(!report.valid);
    assert!(report.issues.iter().any(|i| i.contains("no BM25 documents")));
  }

  #[test]
  fn test_empty_store_is_valid() {
    let store = Store::open_in_memory().unwrap();
    let report = store.validate().unwrap();
    assert!(report.valid);
    assert_eq!(report.sampled, 0);
  }
}
