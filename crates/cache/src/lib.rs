//! Multi-tier query cache: L1 (process memory), L2 (Redis), L3 (disk),
//! with access-pattern-driven promotion, scored eviction, TTL cleanup, and
//! tag-based invalidation. Cache failures never surface to callers.

mod error;
mod l1;
mod l2;
mod l3;
mod patterns;
mod query_cache;
mod tiered;
mod types;

pub use error::CacheError;
pub use l1::MemoryTier;
pub use l2::RedisTier;
pub use l3::DiskTier;
pub use patterns::AccessPatternTable;
pub use query_cache::{QueryCache, QueryType};
pub use tiered::{CacheLookup, TierStats, TieredCache};
pub use types::{AccessPattern, CacheEntry, CacheTier, now_epoch};
