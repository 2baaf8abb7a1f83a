use thiserror::Error;

#[derive(Error, Debug)]
pub enum DistribError {
  #[error("Redis error: {0}")]
  Redis(#[from] redis::RedisError),
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Queue unavailable: {0}")]
  Unavailable(String),
}

pub type DistribResult<T> = std::result::Result<T, DistribError>;
