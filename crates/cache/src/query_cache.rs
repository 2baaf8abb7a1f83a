//! Query-result cache layer.
//!
//! Keys are `(query_type, canonicalized params)`; each query type carries
//! its own TTL. The wrapper contract is lookup, on miss compute, then
//! attempt to store: a caller can never tell from the result whether the
//! cache participated.

use crate::tiered::TieredCache;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
  SymbolLookup,
  Search,
  SemanticSearch,
  FileSymbols,
  ProjectStatus,
}

impl QueryType {
  pub fn as_str(&self) -> &'static str {
    match self {
      QueryType::SymbolLookup => "symbol_lookup",
      QueryType::Search => "search",
      QueryType::SemanticSearch => "semantic_search",
      QueryType::FileSymbols => "file_symbols",
      QueryType::ProjectStatus => "project_status",
    }
  }

  /// Per-type TTL
  pub fn ttl(&self) -> Duration {
    match self {
      QueryType::SymbolLookup => Duration::from_secs(1800),
      QueryType::Search => Duration::from_secs(600),
      QueryType::SemanticSearch => Duration::from_secs(900),
      QueryType::FileSymbols => Duration::from_secs(1800),
      QueryType::ProjectStatus => Duration::from_secs(60),
    }
  }

  /// Default tags attached to entries of this type
  pub fn tags(&self) -> Vec<String> {
    match self {
      QueryType::SymbolLookup | QueryType::FileSymbols => vec!["symbols".to_string()],
      QueryType::Search | QueryType::SemanticSearch => vec!["search".to_string()],
      QueryType::ProjectStatus => vec!["status".to_string()],
    }
  }
}

pub struct QueryCache {
  cache: Arc<TieredCache>,
}

impl QueryCache {
  pub fn new(cache: Arc<TieredCache>) -> Self {
    Self { cache }
  }

  pub fn inner(&self) -> &Arc<TieredCache> {
    &self.cache
  }

  /// Deterministic key: query type plus a hash of the canonical JSON params
  /// (serde_json object keys serialize sorted, so equal params always
  /// produce equal keys)
  pub fn cache_key(query_type: QueryType, params: &Value) -> String {
    let canonical = params.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hex::encode(&hasher.finalize()[..8]);
    format!("{}:{}", query_type.as_str(), hash)
  }

  pub async fn get(&self, query_type: QueryType, params: &Value) -> Option<Value> {
    let key = Self::cache_key(query_type, params);
    let lookup = self.cache.get(&key).await?;

    match serde_json::from_slice(&lookup.value) {
      Ok(value) => {
        debug!(key, tier = %lookup.tier, "Query cache hit");
        Some(value)
      }
      Err(_) => None,
    }
  }

  pub async fn put(&self, query_type: QueryType, params: &Value, result: &Value, extra_tags: Vec<String>) {
    let key = Self::cache_key(query_type, params);
    let Ok(bytes) = serde_json::to_vec(result) else {
      return;
    };

    let mut tags = query_type.tags();
    tags.extend(extra_tags);

    self
      .cache
      .set(&key, bytes, Some(query_type.ttl()), tags, None)
      .await;
  }

  /// Cached wrapper: lookup → on miss compute → best-effort store.
  /// Compute errors pass through untouched; cache errors never surface.
  pub async fn get_or_compute<F, Fut, E>(
    &self,
    query_type: QueryType,
    params: &Value,
    extra_tags: Vec<String>,
    compute: F,
  ) -> Result<Value, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, E>>,
  {
    if let Some(cached) = self.get(query_type, params).await {
      return Ok(cached);
    }

    let result = compute().await?;
    self.put(query_type, params, &result, extra_tags).await;
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::l1::MemoryTier;
  use crate::l3::DiskTier;
  use serde_json::json;
  use tempfile::TempDir;

  fn query_cache(dir: &TempDir) -> QueryCache {
    QueryCache::new(Arc::new(TieredCache::new(
      MemoryTier::new(100, 10 * 1024 * 1024),
      None,
      DiskTier::new(dir.path().join("cache")).unwrap(),
      3600,
    )))
  }

  #[test]
  fn test_cache_key_stable_under_key_order() {
    let a = json!({"query": "foo", "limit": 20});
    let b = json!({"limit": 20, "query": "foo"});
    assert_eq!(
      QueryCache::cache_key(QueryType::Search, &a),
      QueryCache::cache_key(QueryType::Search, &b)
    );
  }

  #[test]
  fn test_cache_key_differs_by_type_and_params() {
    let params = json!({"symbol": "Foo"});
    let lookup = QueryCache::cache_key(QueryType::SymbolLookup, &params);
    let search = QueryCache::cache_key(QueryType::Search, &params);
    assert_ne!(lookup, search);

    let other = QueryCache::cache_key(QueryType::SymbolLookup, &json!({"symbol": "Bar"}));
    assert_ne!(lookup, other);
  }

  #[tokio::test]
  async fn test_get_or_compute_caches() {
    let dir = TempDir::new().unwrap();
    let qc = query_cache(&dir);
    let params = json!({"symbol": "Foo"});

    let mut calls = 0;
    let result: Result<Value, std::convert::Infallible> = qc
      .get_or_compute(QueryType::SymbolLookup, &params, Vec::new(), || {
        calls += 1;
        async { Ok(json!({"found": true})) }
      })
      .await;
    assert_eq!(result.unwrap(), json!({"found": true}));
    assert_eq!(calls, 1);

    // Second call is served from cache
    let mut recomputed = false;
    let cached: Result<Value, std::convert::Infallible> = qc
      .get_or_compute(QueryType::SymbolLookup, &params, Vec::new(), || {
        recomputed = true;
        async { Ok(json!({"found": false})) }
      })
      .await;
    assert_eq!(cached.unwrap(), json!({"found": true}));
    assert!(!recomputed);
  }

  #[tokio::test]
  async fn test_compute_errors_pass_through() {
    let dir = TempDir::new().unwrap();
    let qc = query_cache(&dir);
    let params = json!({"q": "x"});

    let result: Result<Value, &str> = qc
      .get_or_compute(QueryType::Search, &params, Vec::new(), || async { Err("backend down") })
      .await;
    assert_eq!(result.unwrap_err(), "backend down");

    // Nothing was cached
    assert!(qc.get(QueryType::Search, &params).await.is_none());
  }

  #[tokio::test]
  async fn test_invalidate_file_clears_symbol_entries() {
    let dir = TempDir::new().unwrap();
    let qc = query_cache(&dir);
    let params = json!({"symbol": "Foo"});

    qc.put(
      QueryType::SymbolLookup,
      &params,
      &json!({"defined_in": "/x.py"}),
      vec!["file:/x.py".to_string()],
    )
    .await;
    assert!(qc.get(QueryType::SymbolLookup, &params).await.is_some());

    qc.inner().invalidate_file("/x.py").await;
    assert!(qc.get(QueryType::SymbolLookup, &params).await.is_none());
  }
}
