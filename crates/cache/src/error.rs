use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Redis error: {0}")]
  Redis(#[from] redis::RedisError),
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("Tier disabled")]
  Disabled,
  #[error("Entry expired")]
  Expired,
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
