//! L1: bounded in-memory tier.
//!
//! An LRU map plus a byte counter behind one mutex. Critical sections do no
//! I/O. Eviction is scored from the access-pattern table, not from entry
//! recency alone.

use crate::types::{AccessPattern, CacheEntry, now_epoch};
use lru::LruCache;
use std::sync::Mutex;
use tracing::debug;

struct L1Inner {
  map: LruCache<String, CacheEntry>,
  bytes: u64,
}

pub struct MemoryTier {
  inner: Mutex<L1Inner>,
  max_entries: usize,
  max_bytes: u64,
}

impl MemoryTier {
  pub fn new(max_entries: usize, max_bytes: u64) -> Self {
    Self {
      inner: Mutex::new(L1Inner {
        map: LruCache::unbounded(),
        bytes: 0,
      }),
      max_entries,
      max_bytes,
    }
  }

  /// Hit: bumps the entry to most-recently-used and updates its counter
  pub fn get(&self, key: &str) -> Option<CacheEntry> {
    let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
    let now = now_epoch();

    if inner.map.peek(key).is_some_and(|e| e.is_expired(now)) {
      if let Some(old) = inner.map.pop(key) {
        inner.bytes -= old.size_bytes;
      }
      return None;
    }

    let entry = inner.map.get_mut(key)?;
    entry.access_count += 1;
    Some(entry.clone())
  }

  /// Insert without enforcing bounds; the caller runs eviction first when
  /// needed so scoring can consult the pattern table outside this lock
  pub fn insert(&self, key: String, entry: CacheEntry) {
    let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
    if let Some(old) = inner.map.pop(&key) {
      inner.bytes -= old.size_bytes;
    }
    inner.bytes += entry.size_bytes;
    inner.map.put(key, entry);
  }

  pub fn remove(&self, key: &str) -> Option<CacheEntry> {
    let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
    let entry = inner.map.pop(key)?;
    inner.bytes -= entry.size_bytes;
    Some(entry)
  }

  pub fn contains(&self, key: &str) -> bool {
    let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
    inner.map.contains(key)
  }

  pub fn len(&self) -> usize {
    let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
    inner.map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn bytes(&self) -> u64 {
    let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
    inner.bytes
  }

  /// Would inserting `size_bytes` more breach either bound?
  pub fn needs_eviction(&self, incoming_bytes: u64) -> bool {
    let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
    inner.map.len() + 1 > self.max_entries || inner.bytes + incoming_bytes > self.max_bytes
  }

  /// Evict the lowest-scoring 10 % of entries (at least one).
  ///
  /// Score: `frequency × (1 / age_seconds) ÷ max(size_kb, 1)`; entries with
  /// no access pattern score 0. Returns the evicted entries so the caller
  /// can demote them.
  pub fn evict_scored(&self, pattern_of: impl Fn(&str) -> Option<AccessPattern>) -> Vec<(String, CacheEntry)> {
    let now = now_epoch();

    // Collect scores without holding the lock across the pattern lookups
    let keys: Vec<(String, u64)> = {
      let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
      inner
        .map
        .iter()
        .map(|(k, e)| (k.clone(), e.size_bytes))
        .collect()
    };

    if keys.is_empty() {
      return Vec::new();
    }

    let mut scored: Vec<(String, f64)> = keys
      .into_iter()
      .map(|(key, size_bytes)| {
        let score = match pattern_of(&key) {
          Some(pattern) => {
            let age = now.saturating_sub(pattern.last_accessed).max(1) as f64;
            let size_kb = (size_bytes as f64 / 1024.0).max(1.0);
            pattern.frequency_per_hour(now) * (1.0 / age) / size_kb
          }
          None => 0.0,
        };
        (key, score)
      })
      .collect();

    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let evict_count = (scored.len() / 10).max(1);
    let mut evicted = Vec::with_capacity(evict_count);

    for (key, _) in scored.into_iter().take(evict_count) {
      if let Some(entry) = self.remove(&key) {
        evicted.push((key, entry));
      }
    }

    debug!(evicted = evicted.len(), "L1 eviction pass");
    evicted
  }

  /// Keys whose pattern shows no access for longer than `idle_secs`
  pub fn idle_keys(&self, idle_secs: u64, pattern_of: impl Fn(&str) -> Option<AccessPattern>) -> Vec<String> {
    let now = now_epoch();
    let keys: Vec<String> = {
      let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
      inner.map.iter().map(|(k, _)| k.clone()).collect()
    };

    keys
      .into_iter()
      .filter(|key| match pattern_of(key) {
        Some(p) => now.saturating_sub(p.last_accessed) > idle_secs,
        None => true,
      })
      .collect()
  }

  pub fn clear(&self) {
    let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
    inner.map.clear();
    inner.bytes = 0;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::CacheTier;

  fn entry(bytes: usize) -> CacheEntry {
    CacheEntry::new(vec![0u8; bytes], Some(3600), Vec::new())
  }

  #[test]
  fn test_byte_accounting() {
    let tier = MemoryTier::new(10, 1024);
    tier.insert("a".into(), entry(100));
    tier.insert("b".into(), entry(200));
    assert_eq!(tier.bytes(), 300);

    // Replacing an entry swaps its bytes, not adds
    tier.insert("a".into(), entry(50));
    assert_eq!(tier.bytes(), 250);

    tier.remove("b");
    assert_eq!(tier.bytes(), 50);
  }

  #[test]
  fn test_needs_eviction_on_either_bound() {
    let tier = MemoryTier::new(2, 1000);
    tier.insert("a".into(), entry(10));
    tier.insert("b".into(), entry(10));
    assert!(tier.needs_eviction(10)); // entry bound

    let tier = MemoryTier::new(100, 100);
    tier.insert("a".into(), entry(90));
    assert!(tier.needs_eviction(20)); // byte bound
    assert!(!tier.needs_eviction(5));
  }

  #[test]
  fn test_expired_entry_is_miss() {
    let tier = MemoryTier::new(10, 1024);
    let mut e = entry(10);
    e.expires_at = Some(now_epoch() - 1);
    tier.insert("gone".into(), e);

    assert!(tier.get("gone").is_none());
    assert_eq!(tier.bytes(), 0);
  }

  #[test]
  fn test_evict_scored_prefers_patternless() {
    let tier = MemoryTier::new(10, 1024);
    tier.insert("cold".into(), entry(10));
    tier.insert("hot".into(), entry(10));

    let mut hot_pattern = AccessPattern::new("hot", 10, CacheTier::L1);
    for _ in 0..20 {
      hot_pattern.record(CacheTier::L1, 10);
    }

    let evicted = tier.evict_scored(|key| {
      if key == "hot" { Some(hot_pattern.clone()) } else { None }
    });

    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].0, "cold");
    assert!(tier.contains("hot"));
  }

  #[test]
  fn test_evicts_at_least_one() {
    let tier = MemoryTier::new(10, 1024);
    for i in 0..5 {
      tier.insert(format!("k{i}"), entry(10));
    }
    // 10% of 5 rounds to 0; still evicts one
    let evicted = tier.evict_scored(|_| None);
    assert_eq!(evicted.len(), 1);
    assert_eq!(tier.len(), 4);
  }

  #[test]
  fn test_idle_keys() {
    let tier = MemoryTier::new(10, 1024);
    tier.insert("idle".into(), entry(10));
    tier.insert("busy".into(), entry(10));

    let mut idle_pattern = AccessPattern::new("idle", 10, CacheTier::L1);
    idle_pattern.last_accessed = now_epoch() - 2 * 3600;
    let busy_pattern = AccessPattern::new("busy", 10, CacheTier::L1);

    let idle = tier.idle_keys(3600, |key| match key {
      "idle" => Some(idle_pattern.clone()),
      "busy" => Some(busy_pattern.clone()),
      _ => None,
    });

    assert_eq!(idle, vec!["idle".to_string()]);
  }
}
