use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Corrupt database: {0}")]
  Corrupt(String),
  #[error("Schema version {found} is newer than supported version {supported}")]
  SchemaMismatch { found: i64, supported: i64 },
  #[error("Not found: {0}")]
  NotFound(String),
}

impl StoreError {
  /// Cause tag for the surfaced error taxonomy
  pub fn cause(&self) -> &'static str {
    match self {
      StoreError::Io(_) => "io",
      StoreError::Corrupt(_) => "corrupt",
      StoreError::SchemaMismatch { .. } => "schema_mismatch",
      StoreError::NotFound(_) => "not_found",
    }
  }
}

impl From<rusqlite::Error> for StoreError {
  fn from(err: rusqlite::Error) -> Self {
    match err {
      rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("query returned no rows".into()),
      other => StoreError::Corrupt(other.to_string()),
    }
  }
}

impl From<serde_json::Error> for StoreError {
  fn from(err: serde_json::Error) -> Self {
    StoreError::Corrupt(format!("metadata: {err}"))
  }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cause_tags() {
    assert_eq!(StoreError::Corrupt("x".into()).cause(), "corrupt");
    assert_eq!(
      StoreError::SchemaMismatch { found: 9, supported: 1 }.cause(),
      "schema_mismatch"
    );
    assert_eq!(StoreError::NotFound("repo 3".into()).cause(), "not_found");
  }
}
