//! BM25 fallback paths: lexical search hits when no plugin can answer, and
//! candidate-symbol extraction for lookup.

use codescope_core::SearchHit;
use store::{Bm25Hit, Store, StoreResult};
use tracing::debug;

/// Context lines included either side of a matched line
const CONTEXT_LINES: usize = 2;

/// Run a BM25 search and shape the raw hits into search results with line
/// numbers and context pulled from the stored document text.
pub fn bm25_search_hits(store: &Store, query: &str, limit: usize) -> StoreResult<Vec<SearchHit>> {
  let raw = store.bm25_search(query, limit)?;
  let mut hits = Vec::with_capacity(raw.len());

  for hit in raw {
    hits.push(shape_hit(store, query, hit)?);
  }

  Ok(hits)
}

/// As [`bm25_search_hits`], restricted to one repository
pub fn bm25_search_hits_scoped(
  store: &Store,
  query: &str,
  limit: usize,
  repo_id: i64,
) -> StoreResult<Vec<SearchHit>> {
  let raw = store.bm25_search_scoped(query, limit, repo_id)?;
  let mut hits = Vec::with_capacity(raw.len());

  for hit in raw {
    hits.push(shape_hit(store, query, hit)?);
  }

  Ok(hits)
}

fn shape_hit(store: &Store, query: &str, hit: Bm25Hit) -> StoreResult<SearchHit> {
  let content = store.bm25_document(&hit.filepath)?;

  let (line, context_before, context_after) = match content {
    Some(ref text) => locate_in_content(text, query, &hit.snippet),
    None => (1, Vec::new(), Vec::new()),
  };

  Ok(SearchHit {
    file: hit.filepath,
    line,
    snippet: hit.snippet,
    score: hit.score,
    repository: None,
    context_before,
    context_after,
  })
}

/// Find the first line containing any query token (falling back to snippet
/// text), returning 1-based line plus surrounding context lines.
fn locate_in_content(content: &str, query: &str, snippet: &str) -> (u32, Vec<String>, Vec<String>) {
  let lines: Vec<&str> = content.lines().collect();

  let needles: Vec<&str> = query
    .split_whitespace()
    .chain(snippet.split_whitespace().take(1))
    .collect();

  let index = lines
    .iter()
    .position(|line| needles.iter().any(|n| !n.is_empty() && line.contains(n)))
    .unwrap_or(0);

  let before = lines[index.saturating_sub(CONTEXT_LINES)..index]
    .iter()
    .map(|s| s.to_string())
    .collect();
  let after = lines[(index + 1).min(lines.len())..(index + 1 + CONTEXT_LINES).min(lines.len())]
    .iter()
    .map(|s| s.to_string())
    .collect();

  (index as u32 + 1, before, after)
}

/// Candidate identifiers pulled from BM25 snippets for a fuzzy lookup pass,
/// ranked by similarity to the target symbol. Exact matches sort first.
pub fn extract_symbol_candidates(snippets: &[String], target: &str) -> Vec<String> {
  let mut candidates: Vec<(String, f64)> = Vec::new();

  for snippet in snippets {
    for token in snippet.split(|c: char| !c.is_alphanumeric() && c != '_') {
      if token.is_empty() || !token.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_') {
        continue;
      }
      let score = similarity(target, token);
      if score > 0.0 && !candidates.iter().any(|(t, _)| t == token) {
        candidates.push((token.to_string(), score));
      }
    }
  }

  candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
  debug!(target, candidates = candidates.len(), "Fuzzy lookup candidates");
  candidates.into_iter().map(|(t, _)| t).take(10).collect()
}

/// Name similarity: exact > prefix/suffix > containment, weighted by the
/// length ratio so short accidental substrings rank low.
fn similarity(target: &str, candidate: &str) -> f64 {
  if candidate == target {
    return 1.0;
  }

  let target_lower = target.to_lowercase();
  let candidate_lower = candidate.to_lowercase();
  let ratio = (target.len().min(candidate.len()) as f64) / (target.len().max(candidate.len()) as f64);

  if candidate_lower == target_lower {
    0.95
  } else if candidate_lower.starts_with(&target_lower) || target_lower.starts_with(&candidate_lower) {
    0.7 * ratio
  } else if candidate_lower.ends_with(&target_lower) || target_lower.ends_with(&candidate_lower) {
    0.6 * ratio
  } else if candidate_lower.contains(&target_lower) || target_lower.contains(&candidate_lower) {
    0.4 * ratio
  } else {
    0.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use codescope_core::{Language, RepoMetadata};

  #[test]
  fn test_bm25_hits_carry_line_and_context() {
    let store = Store::open_in_memory().unwrap();
    let repo_id = store.create_repository("/w", "w", &RepoMetadata::default()).unwrap();
    store
      .upsert_file(
        repo_id,
        "/w/a.rs",
        "a.rs",
        "line one\nline two\nneedle here\nline four\nline five",
        Some(Language::Rust),
        &[],
        false,
      )
      .unwrap();

    let hits = bm25_search_hits(&store, "needle", 5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].line, 3);
    assert_eq!(hits[0].context_before, vec!["line one", "line two"]);
    assert_eq!(hits[0].context_after, vec!["line four", "line five"]);
  }

  #[test]
  fn test_context_clamped_at_edges() {
    let store = Store::open_in_memory().unwrap();
    let repo_id = store.create_repository("/w", "w", &RepoMetadata::default()).unwrap();
    store
      .upsert_file(repo_id, "/w/a.rs", "a.rs", "needle only", Some(Language::Rust), &[], false)
      .unwrap();

    let hits = bm25_search_hits(&store, "needle", 5).unwrap();
    assert_eq!(hits[0].line, 1);
    assert!(hits[0].context_before.is_empty());
    assert!(hits[0].context_after.is_empty());
  }

  #[test]
  fn test_candidate_extraction_ranks_exact_first() {
    let snippets = vec![
      "def process_data(x): return helper(x)".to_string(),
      "class DataProcessor: pass".to_string(),
    ];

    let candidates = extract_symbol_candidates(&snippets, "process_data");
    assert_eq!(candidates[0], "process_data");
  }

  #[test]
  fn test_candidate_extraction_fuzzy() {
    let snippets = vec!["def process_data_batch(x): pass".to_string()];
    let candidates = extract_symbol_candidates(&snippets, "process_data");
    assert!(candidates.contains(&"process_data_batch".to_string()));
  }

  #[test]
  fn test_candidates_skip_numeric_tokens() {
    let snippets = vec!["x = 12345 + foo_bar".to_string()];
    let candidates = extract_symbol_candidates(&snippets, "foo_bar");
    assert_eq!(candidates, vec!["foo_bar".to_string()]);
  }

  #[test]
  fn test_similarity_ordering() {
    assert!(similarity("foo", "foo") > similarity("foo", "foobar"));
    assert!(similarity("foo", "foobar") > similarity("foo", "a_foo_b"));
    assert_eq!(similarity("foo", "unrelated"), 0.0);
  }
}
