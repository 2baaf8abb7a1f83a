use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Repository classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
  #[default]
  Local,
  Reference,
  Temporary,
  External,
}

impl RepoType {
  pub fn as_str(&self) -> &'static str {
    match self {
      RepoType::Local => "local",
      RepoType::Reference => "reference",
      RepoType::Temporary => "temporary",
      RepoType::External => "external",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "local" => Some(RepoType::Local),
      "reference" => Some(RepoType::Reference),
      "temporary" => Some(RepoType::Temporary),
      "external" => Some(RepoType::External),
      _ => None,
    }
  }
}

/// Known repository metadata fields plus a typed extension map for the rest
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RepoMetadata {
  pub repo_type: RepoType,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub language: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub purpose: Option<String>,
  pub temporary: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cleanup_after: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<String>,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub extra: BTreeMap<String, String>,
}

/// A repository row as persisted in the index store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
  pub id: i64,
  pub path: String,
  pub name: String,
  pub metadata: RepoMetadata,
  pub created_at: DateTime<Utc>,
}

/// Deterministic repository identifier: first 16 hex chars of the sha256
/// of the remote URL or absolute path. Also names the database file.
pub fn repo_identifier(path_or_url: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(path_or_url.as_bytes());
  let hash = hasher.finalize();
  hex::encode(&hash[..8])
}

/// Identifier for a repository rooted at a filesystem path
pub fn repo_identifier_for_path(path: &Path) -> String {
  repo_identifier(&path.to_string_lossy())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_repo_identifier_stable() {
    let a = repo_identifier("/home/user/proj");
    let b = repo_identifier("/home/user/proj");
    let c = repo_identifier("/home/user/other");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 16);
  }

  #[test]
  fn test_repo_metadata_roundtrip() {
    let mut extra = BTreeMap::new();
    extra.insert("origin".to_string(), "https://example.com/repo.git".to_string());

    let meta = RepoMetadata {
      repo_type: RepoType::Reference,
      language: Some("python".into()),
      purpose: Some("translation reference".into()),
      temporary: true,
      cleanup_after: Some(Utc::now()),
      tags: vec!["external".into()],
      extra,
    };

    let json = serde_json::to_string(&meta).unwrap();
    let back: RepoMetadata = serde_json::from_str(&json).unwrap();
    assert_eq!(back.repo_type, RepoType::Reference);
    assert_eq!(back.tags, vec!["external".to_string()]);
    assert_eq!(back.extra.get("origin").map(String::as_str), Some("https://example.com/repo.git"));
  }

  #[test]
  fn test_repo_metadata_defaults() {
    let meta: RepoMetadata = serde_json::from_str("{}").unwrap();
    assert_eq!(meta.repo_type, RepoType::Local);
    assert!(!meta.temporary);
    assert!(meta.tags.is_empty());
  }
}
