//! L3: disk tier.
//!
//! One file per entry at `<dir>/<hh>/<hash>.cache`, where `hh` is the first
//! two hex characters of the key hash. The payload is the serialized
//! [`CacheEntry`] (value, created_at, expires_at, access_count). Survives
//! process restarts; expired and corrupt files are purged by maintenance.

use crate::error::CacheResult;
use crate::types::{CacheEntry, now_epoch};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct DiskTier {
  dir: PathBuf,
}

fn key_hash(key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  hex::encode(hasher.finalize())
}

impl DiskTier {
  pub fn new(dir: PathBuf) -> CacheResult<Self> {
    std::fs::create_dir_all(&dir)?;
    Ok(Self { dir })
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn path_for(&self, key: &str) -> PathBuf {
    let hash = key_hash(key);
    self.dir.join(&hash[..2]).join(format!("{hash}.cache"))
  }

  /// Read an entry; expired files are deleted and reported as a miss.
  /// The on-disk access counter is updated on every hit.
  pub fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
    let path = self.path_for(key);
    if !path.exists() {
      return Ok(None);
    }

    let raw = std::fs::read(&path)?;
    let mut entry: CacheEntry = match serde_json::from_slice(&raw) {
      Ok(e) => e,
      Err(e) => {
        warn!(path = %path.display(), "Corrupt cache file, removing: {e}");
        let _ = std::fs::remove_file(&path);
        return Ok(None);
      }
    };

    if entry.is_expired(now_epoch()) {
      let _ = std::fs::remove_file(&path);
      return Ok(None);
    }

    entry.access_count += 1;
    // Best-effort counter write-back
    if let Ok(updated) = serde_json::to_vec(&entry) {
      let _ = std::fs::write(&path, updated);
    }

    Ok(Some(entry))
  }

  pub fn set(&self, key: &str, entry: &CacheEntry) -> CacheResult<()> {
    let path = self.path_for(key);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let payload = serde_json::to_vec(entry)?;
    std::fs::write(&path, payload)?;
    Ok(())
  }

  pub fn delete(&self, key: &str) -> CacheResult<bool> {
    let path = self.path_for(key);
    if path.exists() {
      std::fs::remove_file(&path)?;
      Ok(true)
    } else {
      Ok(false)
    }
  }

  /// Walk every shard and remove expired or unreadable files.
  /// Returns how many files were purged.
  pub fn purge_expired(&self) -> CacheResult<usize> {
    let now = now_epoch();
    let mut purged = 0;

    for shard in std::fs::read_dir(&self.dir)? {
      let shard = shard?;
      if !shard.file_type()?.is_dir() {
        continue;
      }

      for file in std::fs::read_dir(shard.path())? {
        let file = file?;
        let path = file.path();
        if path.extension().map(|e| e != "cache").unwrap_or(true) {
          continue;
        }

        let expired = match std::fs::read(&path).ok().and_then(|raw| serde_json::from_slice::<CacheEntry>(&raw).ok()) {
          Some(entry) => entry.is_expired(now),
          None => true, // unreadable or corrupt
        };

        if expired {
          let _ = std::fs::remove_file(&path);
          purged += 1;
        }
      }
    }

    if purged > 0 {
      debug!(purged, "L3 expired/corrupt files purged");
    }
    Ok(purged)
  }

  /// Every key-hash with a live file, paired with its tags.
  /// Used by tag invalidation when the in-process tag index misses.
  pub fn entries_with_tags(&self) -> CacheResult<Vec<(PathBuf, Vec<String>)>> {
    let mut out = Vec::new();

    for shard in std::fs::read_dir(&self.dir)? {
      let shard = shard?;
      if !shard.file_type()?.is_dir() {
        continue;
      }

      for file in std::fs::read_dir(shard.path())? {
        let path = file?.path();
        if let Some(entry) = std::fs::read(&path)
          .ok()
          .and_then(|raw| serde_json::from_slice::<CacheEntry>(&raw).ok())
        {
          out.push((path, entry.tags));
        }
      }
    }

    Ok(out)
  }

  pub fn clear(&self) -> CacheResult<()> {
    for shard in std::fs::read_dir(&self.dir)? {
      let shard = shard?;
      if shard.file_type()?.is_dir() {
        std::fs::remove_dir_all(shard.path())?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn tier() -> (TempDir, DiskTier) {
    let dir = TempDir::new().unwrap();
    let tier = DiskTier::new(dir.path().join("cache")).unwrap();
    (dir, tier)
  }

  #[test]
  fn test_sharded_layout() {
    let (_dir, tier) = tier();
    let entry = CacheEntry::new(b"x".to_vec(), None, Vec::new());
    tier.set("some-key", &entry).unwrap();

    let path = tier.path_for("some-key");
    assert!(path.exists());
    // <dir>/<hh>/<hash>.cache
    let shard = path.parent().unwrap().file_name().unwrap().to_string_lossy().to_string();
    assert_eq!(shard.len(), 2);
    assert!(path.file_name().unwrap().to_string_lossy().ends_with(".cache"));
  }

  #[test]
  fn test_roundtrip() {
    let (_dir, tier) = tier();
    let entry = CacheEntry::new(b"payload".to_vec(), Some(60), vec!["file:/x.py".into()]);
    tier.set("k", &entry).unwrap();

    let back = tier.get("k").unwrap().unwrap();
    assert_eq!(back.value, b"payload");
    assert_eq!(back.access_count, 1);

    // Counter persists across reads
    let again = tier.get("k").unwrap().unwrap();
    assert_eq!(again.access_count, 2);
  }

  #[test]
  fn test_expired_is_miss_and_deleted() {
    let (_dir, tier) = tier();
    let mut entry = CacheEntry::new(b"x".to_vec(), Some(60), Vec::new());
    entry.expires_at = Some(now_epoch() - 1);
    tier.set("gone", &entry).unwrap();

    assert!(tier.get("gone").unwrap().is_none());
    assert!(!tier.path_for("gone").exists());
  }

  #[test]
  fn test_corrupt_file_removed_on_read() {
    let (_dir, tier) = tier();
    let path = tier.path_for("bad");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"not json").unwrap();

    assert!(tier.get("bad").unwrap().is_none());
    assert!(!path.exists());
  }

  #[test]
  fn test_purge_expired() {
    let (_dir, tier) = tier();

    let live = CacheEntry::new(b"x".to_vec(), Some(3600), Vec::new());
    tier.set("live", &live).unwrap();

    let mut dead = CacheEntry::new(b"x".to_vec(), Some(60), Vec::new());
    dead.expires_at = Some(now_epoch() - 1);
    tier.set("dead", &dead).unwrap();

    let corrupt = tier.path_for("corrupt");
    std::fs::create_dir_all(corrupt.parent().unwrap()).unwrap();
    std::fs::write(&corrupt, b"garbage").unwrap();

    assert_eq!(tier.purge_expired().unwrap(), 2);
    assert!(tier.get("live").unwrap().is_some());
  }

  #[test]
  fn test_delete_and_clear() {
    let (_dir, tier) = tier();
    tier.set("a", &CacheEntry::new(b"1".to_vec(), None, Vec::new())).unwrap();
    tier.set("b", &CacheEntry::new(b"2".to_vec(), None, Vec::new())).unwrap();

    assert!(tier.delete("a").unwrap());
    assert!(!tier.delete("a").unwrap());

    tier.clear().unwrap();
    assert!(tier.get("b").unwrap().is_none());
  }
}
