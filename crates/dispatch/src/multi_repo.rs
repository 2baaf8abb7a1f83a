//! Multi-repository fan-out: authorization against a configured allow-list,
//! identifier resolution to index stores, concurrent searches merged by
//! score, and timeout-guarded fallback to the local store.

use crate::fallback::bm25_search_hits;
use codescope_core::{Error, IndexConfig, Result, SearchHit, repo_identifier};
use dashmap::DashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use store::{Store, discover_index};
use tracing::{debug, warn};

pub struct MultiRepoManager {
  /// Raw allow-list entries plus their normalized identifiers
  authorized: HashSet<String>,
  data_dir: PathBuf,
  index_paths: Vec<PathBuf>,
  multi_path_discovery: bool,
  stores: DashMap<String, Arc<Store>>,
}

impl MultiRepoManager {
  pub fn new(config: &IndexConfig, data_dir: PathBuf) -> Self {
    let mut authorized = HashSet::new();
    for entry in &config.authorized_reference_repos {
      authorized.insert(entry.clone());
      authorized.insert(normalize_identifier(entry));
    }

    Self {
      authorized,
      data_dir,
      index_paths: config.index_paths.clone(),
      multi_path_discovery: config.multi_path_discovery,
      stores: DashMap::new(),
    }
  }

  pub fn authorized_count(&self) -> usize {
    // Raw entry + normalized id pairs; callers only care whether any exist
    self.authorized.len()
  }

  /// Authorization check on the raw identifier or its normalized form
  pub fn is_authorized(&self, repo: &str) -> bool {
    self.authorized.contains(repo) || self.authorized.contains(&normalize_identifier(repo))
  }

  /// Resolve an identifier (hash id, path, or URL) to its index store
  pub fn resolve(&self, repo: &str) -> Result<(String, Arc<Store>)> {
    if !self.is_authorized(repo) {
      return Err(Error::Unauthorized { repo: repo.to_string() });
    }

    let id = normalize_identifier(repo);

    if let Some(existing) = self.stores.get(&id) {
      return Ok((id.clone(), Arc::clone(existing.value())));
    }

    let db_path = discover_index(&self.data_dir, &id, &self.index_paths, self.multi_path_discovery)
      .ok_or_else(|| Error::NotFound {
        entity: "repository index",
        id: repo.to_string(),
      })?;

    let store = Store::open(&db_path).map_err(|e| Error::BackendUnavailable(e.to_string()))?;
    let store = Arc::new(store);
    self.stores.insert(id.clone(), Arc::clone(&store));

    debug!(repo, id, "Reference repository index opened");
    Ok((id, store))
  }

  /// Search one authorized repository; hits are tagged with its name
  pub async fn search_repo(&self, repo: &str, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let (id, store) = self.resolve(repo)?;
    let owned_query = query.to_string();
    let display = display_name(repo);

    let mut hits = tokio::task::spawn_blocking(move || bm25_search_hits(&store, &owned_query, limit))
      .await
      .map_err(|e| Error::BackendUnavailable(format!("search task: {e}")))?
      .map_err(|e| Error::BackendUnavailable(e.to_string()))?;

    for hit in &mut hits {
      hit.repository = Some(display.clone());
    }

    debug!(repo, id, hits = hits.len(), "Reference repository search");
    Ok(hits)
  }

  /// Concurrent fan-out over several repositories, merged by score desc.
  /// Individual repository failures are logged and skipped.
  pub async fn search_many(&self, repos: &[String], query: &str, limit: usize) -> Vec<SearchHit> {
    let searches = repos.iter().map(|repo| self.search_repo(repo, query, limit));
    let results = futures::future::join_all(searches).await;

    let mut merged = Vec::new();
    for (repo, result) in repos.iter().zip(results) {
      match result {
        Ok(hits) => merged.extend(hits),
        Err(e) => warn!(repo, "Fan-out search failed: {e}"),
      }
    }

    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged.truncate(limit);
    merged
  }
}

/// Normalize a repository identifier: an existing 16-hex id passes through;
/// URLs and paths hash to their deterministic identifier.
pub fn normalize_identifier(repo: &str) -> String {
  if repo.len() == 16 && repo.chars().all(|c| c.is_ascii_hexdigit()) {
    return repo.to_lowercase();
  }
  repo_identifier(repo)
}

/// Human-readable tag for result attribution
fn display_name(repo: &str) -> String {
  if let Some(name) = repo.rsplit('/').next()
    && !name.is_empty()
    && name != repo
  {
    return name.trim_end_matches(".git").to_string();
  }
  repo.to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use codescope_core::{Language, RepoMetadata};
  use store::db_path_for;
  use tempfile::TempDir;

  fn config_with(authorized: Vec<String>, data_dir: &TempDir) -> IndexConfig {
    IndexConfig {
      data_dir: Some(data_dir.path().to_path_buf()),
      multi_path_discovery: true,
      index_paths: Vec::new(),
      authorized_reference_repos: authorized,
    }
  }

  fn seed_reference_index(data_dir: &TempDir, identifier: &str, content: &str) {
    let store = Store::open(&db_path_for(data_dir.path(), identifier)).unwrap();
    let repo_id = store.create_repository("/ref", "ref", &RepoMetadata::default()).unwrap();
    store
      .upsert_file(repo_id, "/ref/lib.py", "lib.py", content, Some(Language::Python), &[], false)
      .unwrap();
  }

  #[test]
  fn test_normalize_identifier() {
    assert_eq!(normalize_identifier("ABCDEF0123456789"), "abcdef0123456789");
    let by_url = normalize_identifier("https://example.com/r.git");
    assert_eq!(by_url.len(), 16);
    assert_eq!(by_url, repo_identifier("https://example.com/r.git"));
  }

  #[test]
  fn test_unauthorized_rejected() {
    let dir = TempDir::new().unwrap();
    let manager = MultiRepoManager::new(&config_with(vec!["/allowed/repo".into()], &dir), dir.path().to_path_buf());

    assert!(manager.is_authorized("/allowed/repo"));
    assert!(!manager.is_authorized("/other/repo"));

    let err = manager.resolve("/other/repo").unwrap_err();
    assert!(matches!(err, Error::Unauthorized { .. }));
  }

  #[test]
  fn test_resolve_missing_index() {
    let dir = TempDir::new().unwrap();
    let manager = MultiRepoManager::new(&config_with(vec!["/allowed/repo".into()], &dir), dir.path().to_path_buf());

    let err = manager.resolve("/allowed/repo").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
  }

  #[tokio::test]
  async fn test_search_tags_results_with_repo() {
    let dir = TempDir::new().unwrap();
    let repo = "https://example.com/refrepo.git";
    seed_reference_index(&dir, &normalize_identifier(repo), "the needle text");

    let manager = MultiRepoManager::new(&config_with(vec![repo.to_string()], &dir), dir.path().to_path_buf());
    let hits = manager.search_repo(repo, "needle", 10).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].repository.as_deref(), Some("refrepo"));
  }

  #[tokio::test]
  async fn test_search_many_merges_by_score() {
    let dir = TempDir::new().unwrap();
    let repo_a = "/refs/alpha";
    let repo_b = "/refs/beta";
    seed_reference_index(&dir, &normalize_identifier(repo_a), "needle needle needle");
    seed_reference_index(&dir, &normalize_identifier(repo_b), "needle and much other text here");

    let manager = MultiRepoManager::new(
      &config_with(vec![repo_a.to_string(), repo_b.to_string()], &dir),
      dir.path().to_path_buf(),
    );

    let hits = manager.search_many(&[repo_a.to_string(), repo_b.to_string()], "needle", 10).await;
    assert_eq!(hits.len(), 2);
    assert!(hits[0].score >= hits[1].score);
  }

  #[tokio::test]
  async fn test_search_many_skips_failures() {
    let dir = TempDir::new().unwrap();
    let good = "/refs/good";
    seed_reference_index(&dir, &normalize_identifier(good), "needle");

    // "missing" is authorized but has no index on disk
    let manager = MultiRepoManager::new(
      &config_with(vec![good.to_string(), "/refs/missing".to_string()], &dir),
      dir.path().to_path_buf(),
    );

    let hits = manager
      .search_many(&[good.to_string(), "/refs/missing".to_string()], "needle", 10)
      .await;
    assert_eq!(hits.len(), 1);
  }
}
