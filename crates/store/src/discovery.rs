//! Index database discovery.
//!
//! One database file per repository, named by its deterministic identifier.
//! Discovery checks the conventional indexes directory first, then any
//! configured extra paths.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Conventional indexes directory under the data dir
pub fn indexes_dir(data_dir: &Path) -> PathBuf {
  data_dir.join("indexes")
}

/// Database file path for a repository identifier
pub fn db_path_for(data_dir: &Path, identifier: &str) -> PathBuf {
  indexes_dir(data_dir).join(format!("{identifier}.db"))
}

/// Find an existing database for `identifier`, searching the conventional
/// directory and, when multi-path discovery is enabled, each extra path.
pub fn discover_index(
  data_dir: &Path,
  identifier: &str,
  extra_paths: &[PathBuf],
  multi_path: bool,
) -> Option<PathBuf> {
  let filename = format!("{identifier}.db");

  let conventional = indexes_dir(data_dir).join(&filename);
  if conventional.exists() {
    return Some(conventional);
  }

  if multi_path {
    for dir in extra_paths {
      let candidate = dir.join(&filename);
      if candidate.exists() {
        debug!(path = %candidate.display(), "Index found via extra search path");
        return Some(candidate);
      }
    }
  }

  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_db_path_layout() {
    let path = db_path_for(Path::new("/data"), "abcd1234abcd1234");
    assert_eq!(path, PathBuf::from("/data/indexes/abcd1234abcd1234.db"));
  }

  #[test]
  fn test_discover_conventional_first() {
    let data = TempDir::new().unwrap();
    let extra = TempDir::new().unwrap();

    std::fs::create_dir_all(indexes_dir(data.path())).unwrap();
    std::fs::write(db_path_for(data.path(), "aa"), b"x").unwrap();
    std::fs::write(extra.path().join("aa.db"), b"y").unwrap();

    let found = discover_index(data.path(), "aa", &[extra.path().to_path_buf()], true).unwrap();
    assert_eq!(found, db_path_for(data.path(), "aa"));
  }

  #[test]
  fn test_discover_extra_paths_gated_by_flag() {
    let data = TempDir::new().unwrap();
    let extra = TempDir::new().unwrap();
    std::fs::write(extra.path().join("bb.db"), b"y").unwrap();

    let extras = vec![extra.path().to_path_buf()];
    assert!(discover_index(data.path(), "bb", &extras, false).is_none());
    assert!(discover_index(data.path(), "bb", &extras, true).is_some());
  }

  #[test]
  fn test_discover_missing() {
    let data = TempDir::new().unwrap();
    assert!(discover_index(data.path(), "cc", &[], true).is_none());
  }
}
