//! The tier facade: placement, promotion, eviction, maintenance, and
//! tag invalidation. Tier I/O errors are logged and become per-tier misses;
//! nothing here returns an error to the caller.

use crate::l1::MemoryTier;
use crate::l2::RedisTier;
use crate::l3::DiskTier;
use crate::patterns::AccessPatternTable;
use crate::types::{CacheEntry, CacheTier};
use codescope_core::CacheConfig;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Keys hotter than this go to L1 on set
const HOT_FREQ_PER_HOUR: f64 = 5.0;
/// L2 → L1 promotion threshold
const PROMOTE_L1_FREQ_PER_HOUR: f64 = 10.0;
/// L3 → L2 promotion threshold
const PROMOTE_L2_ACCESS_COUNT: u64 = 3;
const SMALL_ENTRY_BYTES: u64 = 50 * 1024;
const LARGE_ENTRY_BYTES: u64 = 5 * 1024 * 1024;
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);
const L1_DEMOTE_IDLE_SECS: u64 = 3600;

/// A successful lookup: the value and the tier that answered
#[derive(Debug, Clone)]
pub struct CacheLookup {
  pub value: Vec<u8>,
  pub tier: CacheTier,
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct TierStats {
  pub l1_entries: usize,
  pub l1_bytes: u64,
  pub l1_hits: u64,
  pub l2_hits: u64,
  pub l3_hits: u64,
  pub misses: u64,
  pub tracked_patterns: usize,
  pub l2_enabled: bool,
}

pub struct TieredCache {
  l1: Arc<MemoryTier>,
  l2: Option<Arc<RedisTier>>,
  l3: Arc<DiskTier>,
  patterns: Arc<AccessPatternTable>,
  default_ttl_secs: u64,
  /// tag → keys, maintained on set; L3 payload tags cover entries that
  /// predate this process
  tag_index: Mutex<HashMap<String, HashSet<String>>>,
  shutdown_tx: broadcast::Sender<()>,
  l1_hits: AtomicU64,
  l2_hits: AtomicU64,
  l3_hits: AtomicU64,
  misses: AtomicU64,
}

impl TieredCache {
  /// Build from config. L2 is attached only when a Redis URL is configured
  /// and reachable; failure to connect downgrades to L1 + L3.
  pub async fn from_config(config: &CacheConfig, data_dir: &std::path::Path) -> std::io::Result<Self> {
    let disk_dir = config
      .disk_dir
      .clone()
      .unwrap_or_else(|| data_dir.join("cache"));

    let l3 = DiskTier::new(disk_dir).map_err(|e| std::io::Error::other(e.to_string()))?;

    let l2 = match config.redis_url.as_deref() {
      Some(url) => match RedisTier::connect(url).await {
        Ok(tier) => Some(Arc::new(tier)),
        Err(e) => {
          warn!("L2 cache unavailable, continuing without Redis: {e}");
          None
        }
      },
      None => None,
    };

    Ok(Self::new(
      MemoryTier::new(config.max_entries, config.max_bytes),
      l2,
      l3,
      config.default_ttl_secs,
    ))
  }

  pub fn new(l1: MemoryTier, l2: Option<Arc<RedisTier>>, l3: DiskTier, default_ttl_secs: u64) -> Self {
    let (shutdown_tx, _) = broadcast::channel(1);
    Self {
      l1: Arc::new(l1),
      l2,
      l3: Arc::new(l3),
      patterns: Arc::new(AccessPatternTable::new()),
      default_ttl_secs,
      tag_index: Mutex::new(HashMap::new()),
      shutdown_tx,
      l1_hits: AtomicU64::new(0),
      l2_hits: AtomicU64::new(0),
      l3_hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
    }
  }

  /// Tiered lookup with promotion. Tier errors are misses for that tier.
  pub async fn get(&self, key: &str) -> Option<CacheLookup> {
    // L1
    if let Some(entry) = self.l1.get(key) {
      self.l1_hits.fetch_add(1, Ordering::Relaxed);
      self.patterns.record_access(key, CacheTier::L1, entry.size_bytes);
      return Some(CacheLookup {
        value: entry.value,
        tier: CacheTier::L1,
      });
    }

    // L2
    if let Some(ref l2) = self.l2 {
      match l2.get(key).await {
        Ok(Some(entry)) => {
          self.l2_hits.fetch_add(1, Ordering::Relaxed);
          self.patterns.record_access(key, CacheTier::L2, entry.size_bytes);

          if self.patterns.frequency_per_hour(key) > PROMOTE_L1_FREQ_PER_HOUR {
            self.promote_to_l1(key, entry.clone());
          }

          return Some(CacheLookup {
            value: entry.value,
            tier: CacheTier::L2,
          });
        }
        Ok(None) => {}
        Err(e) => warn!("L2 read failed for {key}: {e}"),
      }
    }

    // L3
    let l3 = Arc::clone(&self.l3);
    let owned_key = key.to_string();
    let result = tokio::task::spawn_blocking(move || l3.get(&owned_key)).await;

    match result {
      Ok(Ok(Some(entry))) => {
        self.l3_hits.fetch_add(1, Ordering::Relaxed);
        self.patterns.record_access(key, CacheTier::L3, entry.size_bytes);

        if self.patterns.access_count(key) >= PROMOTE_L2_ACCESS_COUNT {
          if let Some(ref l2) = self.l2 {
            if let Err(e) = l2.set(key, &entry).await {
              warn!("L3→L2 promotion failed for {key}: {e}");
            }
          }
        }

        return Some(CacheLookup {
          value: entry.value,
          tier: CacheTier::L3,
        });
      }
      Ok(Ok(None)) => {}
      Ok(Err(e)) => warn!("L3 read failed for {key}: {e}"),
      Err(e) => warn!("L3 read task failed for {key}: {e}"),
    }

    self.misses.fetch_add(1, Ordering::Relaxed);
    None
  }

  /// Store a value. Placement follows the size/heat table unless a tier
  /// hint is supplied; each tier write is independent and best-effort.
  pub async fn set(
    &self,
    key: &str,
    value: Vec<u8>,
    ttl: Option<Duration>,
    tags: Vec<String>,
    tier_hint: Option<CacheTier>,
  ) {
    let ttl_secs = ttl.map(|t| t.as_secs()).unwrap_or(self.default_ttl_secs);
    let entry = CacheEntry::new(value, Some(ttl_secs), tags.clone());

    let placement = match tier_hint {
      Some(tier) => hint_placement(tier),
      None => placement_for(entry.size_bytes, self.patterns.frequency_per_hour(key)),
    };

    debug!(key, size = entry.size_bytes, ?placement, "Cache set");

    for tier in placement {
      match tier {
        CacheTier::L1 => self.promote_to_l1(key, entry.clone()),
        CacheTier::L2 => {
          if let Some(ref l2) = self.l2 {
            if let Err(e) = l2.set(key, &entry).await {
              warn!("L2 write failed for {key}: {e}");
            }
          }
        }
        CacheTier::L3 => {
          let l3 = Arc::clone(&self.l3);
          let owned_key = key.to_string();
          let owned_entry = entry.clone();
          let result = tokio::task::spawn_blocking(move || l3.set(&owned_key, &owned_entry)).await;
          if let Ok(Err(e)) = result {
            warn!("L3 write failed for {key}: {e}");
          }
        }
      }
    }

    let mut index = self.tag_index.lock().unwrap_or_else(|p| p.into_inner());
    for tag in tags {
      index.entry(tag).or_default().insert(key.to_string());
    }
  }

  /// Remove a key from every tier
  pub async fn delete(&self, key: &str) -> bool {
    let mut removed = self.l1.remove(key).is_some();

    if let Some(ref l2) = self.l2 {
      match l2.delete(key).await {
        Ok(r) => removed |= r,
        Err(e) => warn!("L2 delete failed for {key}: {e}"),
      }
    }

    let l3 = Arc::clone(&self.l3);
    let owned_key = key.to_string();
    if let Ok(Ok(r)) = tokio::task::spawn_blocking(move || l3.delete(&owned_key)).await {
      removed |= r;
    }

    self.patterns.remove(key);
    removed
  }

  /// Remove every entry carrying `tag`, across all tiers
  pub async fn invalidate_tag(&self, tag: &str) -> usize {
    let keys: Vec<String> = {
      let mut index = self.tag_index.lock().unwrap_or_else(|p| p.into_inner());
      index.remove(tag).map(|set| set.into_iter().collect()).unwrap_or_default()
    };

    let mut invalidated = 0;
    for key in &keys {
      if self.delete(key).await {
        invalidated += 1;
      }
    }

    // L3 may hold tagged entries from a previous process
    let l3 = Arc::clone(&self.l3);
    if let Ok(Ok(entries)) = tokio::task::spawn_blocking(move || l3.entries_with_tags()).await {
      for (path, tags) in entries {
        if tags.iter().any(|t| t == tag) {
          let _ = std::fs::remove_file(path);
          invalidated += 1;
        }
      }
    }

    if invalidated > 0 {
      info!(tag, invalidated, "Cache tag invalidated");
    }
    invalidated
  }

  /// File changed: drop its entry tag plus the symbol and search result tags
  pub async fn invalidate_file(&self, path: &str) -> usize {
    let file_tag = format!("file:{path}");
    let mut total = self.invalidate_tag(&file_tag).await;
    total += self.invalidate_tag("symbols").await;
    total += self.invalidate_tag("search").await;
    total
  }

  /// Insert into L1, evicting by score first when either bound would break
  fn promote_to_l1(&self, key: &str, entry: CacheEntry) {
    let patterns = Arc::clone(&self.patterns);

    let mut guard = 0;
    while self.l1.needs_eviction(entry.size_bytes) && !self.l1.is_empty() {
      let patterns = Arc::clone(&patterns);
      let evicted = self.l1.evict_scored(move |k| patterns.get(k));
      if evicted.is_empty() {
        break;
      }
      guard += 1;
      if guard > 16 {
        break;
      }
    }

    self.l1.insert(key.to_string(), entry);
  }

  /// Spawn the 5-minute maintenance loop; stops on shutdown
  pub fn spawn_maintenance(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
    let cache = Arc::clone(self);
    let mut shutdown_rx = self.shutdown_tx.subscribe();

    tokio::spawn(async move {
      let mut timer = interval(MAINTENANCE_INTERVAL);
      timer.tick().await; // skip the immediate tick

      loop {
        tokio::select! {
          _ = timer.tick() => {
            cache.run_maintenance().await;
          }
          _ = shutdown_rx.recv() => {
            debug!("Cache maintenance received shutdown signal");
            break;
          }
        }
      }
    })
  }

  /// One maintenance pass: purge L3, prune patterns, demote idle L1 entries
  pub async fn run_maintenance(&self) {
    let l3 = Arc::clone(&self.l3);
    match tokio::task::spawn_blocking(move || l3.purge_expired()).await {
      Ok(Ok(_)) => {}
      Ok(Err(e)) => warn!("L3 purge failed: {e}"),
      Err(e) => warn!("L3 purge task failed: {e}"),
    }

    self.patterns.prune_stale();

    let patterns = Arc::clone(&self.patterns);
    let idle = self.l1.idle_keys(L1_DEMOTE_IDLE_SECS, move |k| patterns.get(k));

    for key in idle {
      let Some(entry) = self.l1.remove(&key) else {
        continue;
      };

      // Keep a copy in a persistent tier before dropping from memory
      let mut copied = false;
      if let Some(ref l2) = self.l2 {
        match l2.exists(&key).await {
          Ok(true) => copied = true,
          Ok(false) => {
            if l2.set(&key, &entry).await.is_ok() {
              copied = true;
            }
          }
          Err(e) => warn!("L2 existence check failed for {key}: {e}"),
        }
      }

      if !copied {
        let l3 = Arc::clone(&self.l3);
        let owned_key = key.clone();
        let _ = tokio::task::spawn_blocking(move || l3.set(&owned_key, &entry)).await;
      }

      debug!(key, "Demoted idle L1 entry");
    }
  }

  /// Stop background maintenance; idempotent
  pub fn shutdown(&self) {
    let _ = self.shutdown_tx.send(());
  }

  pub fn stats(&self) -> TierStats {
    TierStats {
      l1_entries: self.l1.len(),
      l1_bytes: self.l1.bytes(),
      l1_hits: self.l1_hits.load(Ordering::Relaxed),
      l2_hits: self.l2_hits.load(Ordering::Relaxed),
      l3_hits: self.l3_hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      tracked_patterns: self.patterns.len(),
      l2_enabled: self.l2.is_some(),
    }
  }

  pub fn patterns(&self) -> &AccessPatternTable {
    &self.patterns
  }
}

/// Placement by (size, heat) for a set with no tier hint
fn placement_for(size_bytes: u64, freq_per_hour: f64) -> Vec<CacheTier> {
  if size_bytes > LARGE_ENTRY_BYTES {
    vec![CacheTier::L3]
  } else if size_bytes >= SMALL_ENTRY_BYTES {
    vec![CacheTier::L2, CacheTier::L3]
  } else if freq_per_hour > HOT_FREQ_PER_HOUR {
    vec![CacheTier::L1, CacheTier::L2, CacheTier::L3]
  } else {
    vec![CacheTier::L2, CacheTier::L3]
  }
}

/// A hint places the entry at that tier and every persistent tier below it
fn hint_placement(tier: CacheTier) -> Vec<CacheTier> {
  match tier {
    CacheTier::L1 => vec![CacheTier::L1, CacheTier::L2, CacheTier::L3],
    CacheTier::L2 => vec![CacheTier::L2, CacheTier::L3],
    CacheTier::L3 => vec![CacheTier::L3],
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn cache(dir: &TempDir) -> Arc<TieredCache> {
    Arc::new(TieredCache::new(
      MemoryTier::new(1000, 100 * 1024 * 1024),
      None,
      DiskTier::new(dir.path().join("cache")).unwrap(),
      3600,
    ))
  }

  #[test]
  fn test_placement_table() {
    // Small + cold
    assert_eq!(placement_for(1024, 0.0), vec![CacheTier::L2, CacheTier::L3]);
    // Small + hot
    assert_eq!(
      placement_for(1024, 6.0),
      vec![CacheTier::L1, CacheTier::L2, CacheTier::L3]
    );
    // Medium, regardless of heat
    assert_eq!(placement_for(1024 * 1024, 50.0), vec![CacheTier::L2, CacheTier::L3]);
    // Large
    assert_eq!(placement_for(10 * 1024 * 1024, 50.0), vec![CacheTier::L3]);
  }

  #[tokio::test]
  async fn test_set_get_roundtrip_no_redis() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);

    cache.set("k", b"value".to_vec(), None, Vec::new(), None).await;

    // Cold small entry lands in L3 (no L2 attached)
    let hit = cache.get("k").await.unwrap();
    assert_eq!(hit.value, b"value");
    assert_eq!(hit.tier, CacheTier::L3);
  }

  #[tokio::test]
  async fn test_tier_hint_forces_l1() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);

    cache
      .set("k", b"v".to_vec(), None, Vec::new(), Some(CacheTier::L1))
      .await;

    let hit = cache.get("k").await.unwrap();
    assert_eq!(hit.tier, CacheTier::L1);
  }

  #[tokio::test]
  async fn test_delete_is_global() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);

    cache
      .set("k", b"v".to_vec(), None, Vec::new(), Some(CacheTier::L1))
      .await;
    assert!(cache.delete("k").await);
    assert!(cache.get("k").await.is_none());
    assert!(!cache.delete("k").await);
  }

  #[tokio::test]
  async fn test_tag_invalidation() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);

    cache
      .set(
        "sym:Foo",
        b"def".to_vec(),
        None,
        vec!["symbols".into(), "file:/x.py".into()],
        Some(CacheTier::L1),
      )
      .await;
    cache
      .set("other", b"keep".to_vec(), None, vec!["unrelated".into()], Some(CacheTier::L1))
      .await;

    cache.invalidate_file("/x.py").await;

    assert!(cache.get("sym:Foo").await.is_none());
    assert!(cache.get("other").await.is_some());
  }

  #[tokio::test]
  async fn test_l1_bounds_hold_under_pressure() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(TieredCache::new(
      MemoryTier::new(8, 1024),
      None,
      DiskTier::new(dir.path().join("cache")).unwrap(),
      3600,
    ));

    for i in 0..50 {
      cache
        .set(&format!("k{i}"), vec![0u8; 100], None, Vec::new(), Some(CacheTier::L1))
        .await;
      let stats = cache.stats();
      assert!(stats.l1_entries <= 8, "entry bound broken: {}", stats.l1_entries);
      assert!(stats.l1_bytes <= 1024, "byte bound broken: {}", stats.l1_bytes);
    }
  }

  #[tokio::test]
  async fn test_stats_count_hits_and_misses() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);

    cache
      .set("k", b"v".to_vec(), None, Vec::new(), Some(CacheTier::L1))
      .await;
    cache.get("k").await;
    cache.get("absent").await;

    let stats = cache.stats();
    assert_eq!(stats.l1_hits, 1);
    assert_eq!(stats.misses, 1);
    assert!(!stats.l2_enabled);
  }

  // Full promotion chain; requires a local Redis:
  //   REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored
  #[tokio::test]
  #[ignore]
  async fn test_promotion_chain_l2_to_l1_live() {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
    let dir = TempDir::new().unwrap();
    let l2 = Arc::new(RedisTier::connect(&url).await.unwrap());
    let cache = TieredCache::new(
      MemoryTier::new(1000, 100 * 1024 * 1024),
      Some(l2),
      DiskTier::new(dir.path().join("cache")).unwrap(),
      3600,
    );

    // Cold 1 KiB entry: placed in L2 + L3, not L1
    cache
      .set("promo", vec![0u8; 1024], None, Vec::new(), None)
      .await;
    assert_eq!(cache.stats().l1_entries, 0);

    // Repeated hits drive the frequency over the promotion threshold
    for _ in 0..3 {
      cache.get("promo").await.unwrap();
    }

    let hit = cache.get("promo").await.unwrap();
    assert_eq!(hit.tier, CacheTier::L1);

    cache.delete("promo").await;
  }

  #[tokio::test]
  async fn test_maintenance_demotes_idle_l1() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);

    // Set with an L1 hint but never read: no access pattern, so the entry
    // counts as idle on the next maintenance pass
    cache
      .set("idle", b"v".to_vec(), None, Vec::new(), Some(CacheTier::L1))
      .await;
    assert_eq!(cache.stats().l1_entries, 1);

    cache.run_maintenance().await;
    assert_eq!(cache.stats().l1_entries, 0);

    // Still served, now from disk
    let hit = cache.get("idle").await.unwrap();
    assert_eq!(hit.tier, CacheTier::L3);
  }
}
