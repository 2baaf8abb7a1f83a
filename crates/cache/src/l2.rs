//! L2: Redis tier.
//!
//! Values are the serialized [`CacheEntry`] JSON; TTLs are delegated to
//! Redis. All keys live under the `cache:` namespace.

use crate::error::{CacheError, CacheResult};
use crate::types::{CacheEntry, now_epoch};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

const NAMESPACE: &str = "cache:";

pub struct RedisTier {
  manager: ConnectionManager,
}

impl RedisTier {
  /// Connect to Redis; failure here disables the tier for the process
  pub async fn connect(url: &str) -> CacheResult<Self> {
    let client = redis::Client::open(url)?;
    let manager = client.get_connection_manager().await?;
    debug!(url, "L2 cache connected");
    Ok(Self { manager })
  }

  fn namespaced(key: &str) -> String {
    format!("{NAMESPACE}{key}")
  }

  pub async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
    let mut conn = self.manager.clone();
    let raw: Option<Vec<u8>> = conn.get(Self::namespaced(key)).await?;

    let Some(raw) = raw else {
      return Ok(None);
    };

    let mut entry: CacheEntry = serde_json::from_slice(&raw)?;
    if entry.is_expired(now_epoch()) {
      let _: () = conn.del(Self::namespaced(key)).await?;
      return Ok(None);
    }

    entry.access_count += 1;
    Ok(Some(entry))
  }

  pub async fn set(&self, key: &str, entry: &CacheEntry) -> CacheResult<()> {
    let mut conn = self.manager.clone();
    let payload = serde_json::to_vec(entry)?;

    match entry.ttl_remaining(now_epoch()) {
      Some(0) => return Err(CacheError::Expired),
      Some(ttl) => {
        let _: () = conn.set_ex(Self::namespaced(key), payload, ttl).await?;
      }
      None => {
        let _: () = conn.set(Self::namespaced(key), payload).await?;
      }
    }

    Ok(())
  }

  pub async fn delete(&self, key: &str) -> CacheResult<bool> {
    let mut conn = self.manager.clone();
    let removed: u64 = conn.del(Self::namespaced(key)).await?;
    Ok(removed > 0)
  }

  pub async fn exists(&self, key: &str) -> CacheResult<bool> {
    let mut conn = self.manager.clone();
    Ok(conn.exists(Self::namespaced(key)).await?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_namespacing() {
    assert_eq!(RedisTier::namespaced("search:abc"), "cache:search:abc");
  }

  // Live-Redis round-trip; run with a local server:
  //   REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored
  #[tokio::test]
  #[ignore]
  async fn test_roundtrip_against_live_redis() {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
    let tier = RedisTier::connect(&url).await.unwrap();

    let entry = CacheEntry::new(b"live".to_vec(), Some(60), vec!["t".into()]);
    tier.set("test:l2:roundtrip", &entry).await.unwrap();

    let back = tier.get("test:l2:roundtrip").await.unwrap().unwrap();
    assert_eq!(back.value, b"live");

    assert!(tier.delete("test:l2:roundtrip").await.unwrap());
    assert!(tier.get("test:l2:roundtrip").await.unwrap().is_none());
  }
}
