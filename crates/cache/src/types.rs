use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch
pub fn now_epoch() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
  L1,
  L2,
  L3,
}

impl std::fmt::Display for CacheTier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CacheTier::L1 => f.write_str("l1"),
      CacheTier::L2 => f.write_str("l2"),
      CacheTier::L3 => f.write_str("l3"),
    }
  }
}

/// An entry as stored in any tier. The same serialized form is used for the
/// L2 value and the L3 file payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
  pub value: Vec<u8>,
  pub created_at: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expires_at: Option<u64>,
  pub access_count: u64,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<String>,
  pub size_bytes: u64,
}

impl CacheEntry {
  pub fn new(value: Vec<u8>, ttl_secs: Option<u64>, tags: Vec<String>) -> Self {
    let created_at = now_epoch();
    let size_bytes = value.len() as u64;
    Self {
      value,
      created_at,
      expires_at: ttl_secs.map(|t| created_at + t),
      access_count: 0,
      tags,
      size_bytes,
    }
  }

  pub fn is_expired(&self, now: u64) -> bool {
    self.expires_at.is_some_and(|t| t <= now)
  }

  /// Remaining TTL in seconds, if bounded
  pub fn ttl_remaining(&self, now: u64) -> Option<u64> {
    self.expires_at.map(|t| t.saturating_sub(now))
  }
}

/// Per-key access statistics guiding promotion and eviction.
/// Created on first access; discarded after 24 h of silence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPattern {
  pub key: String,
  pub access_count: u64,
  pub first_accessed: u64,
  pub last_accessed: u64,
  pub size_bytes: u64,
  pub tier_history: Vec<CacheTier>,
}

impl AccessPattern {
  pub fn new(key: &str, size_bytes: u64, tier: CacheTier) -> Self {
    let now = now_epoch();
    Self {
      key: key.to_string(),
      access_count: 1,
      first_accessed: now,
      last_accessed: now,
      size_bytes,
      tier_history: vec![tier],
    }
  }

  pub fn record(&mut self, tier: CacheTier, size_bytes: u64) {
    self.access_count += 1;
    self.last_accessed = now_epoch();
    self.size_bytes = size_bytes;
    if self.tier_history.last() != Some(&tier) {
      self.tier_history.push(tier);
      if self.tier_history.len() > 8 {
        self.tier_history.remove(0);
      }
    }
  }

  /// Accesses per hour, measured over at least a one-minute window
  pub fn frequency_per_hour(&self, now: u64) -> f64 {
    let elapsed_hours = (now.saturating_sub(self.first_accessed) as f64 / 3600.0).max(1.0 / 60.0);
    self.access_count as f64 / elapsed_hours
  }

  pub fn is_stale(&self, now: u64, max_idle_secs: u64) -> bool {
    now.saturating_sub(self.last_accessed) > max_idle_secs
  }
}
