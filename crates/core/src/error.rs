use thiserror::Error;

/// The surfaced error taxonomy. Lower layers carry their own error enums;
/// the dispatcher translates everything it returns into one of these.
#[derive(Error, Debug)]
pub enum Error {
  #[error("Not found: {entity} {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("{phase} exceeded {limit_secs} second timeout")]
  Timeout { phase: &'static str, limit_secs: u64, elapsed_ms: u64 },

  #[error("Stale index: {0}")]
  StaleIndex(String),

  #[error("Repository not authorized: {repo}")]
  Unauthorized { repo: String },

  #[error("Backend unavailable: {0}")]
  BackendUnavailable(String),

  #[error("Plugin failure: {0}")]
  PluginFailure(String),

  #[error("Schema version {found} is newer than supported version {supported}")]
  SchemaMismatch { found: i64, supported: i64 },

  #[error("Job failure: {0}")]
  JobFailure(String),

  #[error("Path not found: {0}")]
  PathNotFound(String),

  #[error("Validation: {0}")]
  Validation(String),

  #[error("IO: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  /// Short machine-readable tag, used in diagnostic response fields
  pub fn reason(&self) -> &'static str {
    match self {
      Error::NotFound { .. } => "not_found",
      Error::Timeout { .. } => "timeout",
      Error::StaleIndex(_) => "stale_index",
      Error::Unauthorized { .. } => "unauthorized",
      Error::BackendUnavailable(_) => "backend_unavailable",
      Error::PluginFailure(_) => "no_plugin",
      Error::SchemaMismatch { .. } => "schema_mismatch",
      Error::JobFailure(_) => "job_failure",
      Error::PathNotFound(_) => "path_not_found",
      Error::Validation(_) => "validation",
      Error::Io(_) => "io",
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_timeout_display() {
    let err = Error::Timeout {
      phase: "Search operation",
      limit_secs: 10,
      elapsed_ms: 10042,
    };
    assert_eq!(err.to_string(), "Search operation exceeded 10 second timeout");
    assert_eq!(err.reason(), "timeout");
  }

  #[test]
  fn test_reason_tags() {
    let err = Error::NotFound {
      entity: "symbol",
      id: "Foo".into(),
    };
    assert_eq!(err.reason(), "not_found");
    assert_eq!(Error::PluginFailure("boom".into()).reason(), "no_plugin");
  }
}
