//! Access-pattern sidecar table.

use crate::types::{AccessPattern, CacheTier, now_epoch};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Patterns idle longer than this are discarded
const PATTERN_MAX_IDLE_SECS: u64 = 24 * 3600;

#[derive(Default)]
pub struct AccessPatternTable {
  patterns: Mutex<HashMap<String, AccessPattern>>,
}

impl AccessPatternTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record one access, creating the pattern on first sight
  pub fn record_access(&self, key: &str, tier: CacheTier, size_bytes: u64) {
    let mut patterns = self.patterns.lock().unwrap_or_else(|p| p.into_inner());
    patterns
      .entry(key.to_string())
      .and_modify(|p| p.record(tier, size_bytes))
      .or_insert_with(|| AccessPattern::new(key, size_bytes, tier));
  }

  pub fn get(&self, key: &str) -> Option<AccessPattern> {
    let patterns = self.patterns.lock().unwrap_or_else(|p| p.into_inner());
    patterns.get(key).cloned()
  }

  pub fn access_count(&self, key: &str) -> u64 {
    self.get(key).map(|p| p.access_count).unwrap_or(0)
  }

  pub fn frequency_per_hour(&self, key: &str) -> f64 {
    self
      .get(key)
      .map(|p| p.frequency_per_hour(now_epoch()))
      .unwrap_or(0.0)
  }

  pub fn remove(&self, key: &str) {
    let mut patterns = self.patterns.lock().unwrap_or_else(|p| p.into_inner());
    patterns.remove(key);
  }

  /// Drop patterns idle for more than 24 h; returns how many were removed
  pub fn prune_stale(&self) -> usize {
    let now = now_epoch();
    let mut patterns = self.patterns.lock().unwrap_or_else(|p| p.into_inner());
    let before = patterns.len();
    patterns.retain(|_, p| !p.is_stale(now, PATTERN_MAX_IDLE_SECS));
    let pruned = before - patterns.len();
    if pruned > 0 {
      debug!(pruned, "Stale access patterns discarded");
    }
    pruned
  }

  pub fn len(&self) -> usize {
    let patterns = self.patterns.lock().unwrap_or_else(|p| p.into_inner());
    patterns.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
