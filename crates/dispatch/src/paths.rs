//! Path translation at the response boundary.
//!
//! The store keeps paths as seen at indexing time, which may reflect a
//! different host. Before any path reaches a caller it is rewritten to a
//! form that exists on the serving host. Translation is a pure function
//! and idempotent.

use std::path::{Path, PathBuf};

/// Canonical prefixes commonly baked into indexes built elsewhere
const CANONICAL_PREFIXES: &[&str] = &["/workspace", "/app", "/repo"];

#[derive(Debug, Clone)]
pub struct PathTranslator {
  workspace_root: PathBuf,
}

impl PathTranslator {
  pub fn new(workspace_root: PathBuf) -> Self {
    Self { workspace_root }
  }

  pub fn workspace_root(&self) -> &Path {
    &self.workspace_root
  }

  /// Rewrite a stored canonical path to one usable on this host.
  ///
  /// - Paths already under the workspace root pass through unchanged.
  /// - A recognized canonical prefix is substituted with the workspace
  ///   root; if the substituted path does not exist the repo-relative form
  ///   is returned instead.
  /// - Anything else passes through unchanged.
  pub fn translate(&self, path: &str) -> String {
    let p = Path::new(path);

    if p.starts_with(&self.workspace_root) {
      return path.to_string();
    }

    for prefix in CANONICAL_PREFIXES {
      if let Ok(rest) = p.strip_prefix(prefix) {
        let candidate = self.workspace_root.join(rest);
        if candidate.exists() {
          return candidate.to_string_lossy().into_owned();
        }
        return rest.to_string_lossy().into_owned();
      }
    }

    path.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_substitutes_recognized_prefix() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("src")).unwrap();
    std::fs::write(root.path().join("src/a.py"), "x").unwrap();

    let translator = PathTranslator::new(root.path().to_path_buf());
    let translated = translator.translate("/workspace/src/a.py");
    assert_eq!(translated, root.path().join("src/a.py").to_string_lossy());
  }

  #[test]
  fn test_missing_target_degrades_to_relative() {
    let root = TempDir::new().unwrap();
    let translator = PathTranslator::new(root.path().to_path_buf());
    assert_eq!(translator.translate("/workspace/src/gone.py"), "src/gone.py");
  }

  #[test]
  fn test_unrecognized_path_passes_through() {
    let root = TempDir::new().unwrap();
    let translator = PathTranslator::new(root.path().to_path_buf());
    assert_eq!(translator.translate("/opt/elsewhere/x.py"), "/opt/elsewhere/x.py");
  }

  #[test]
  fn test_idempotent() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("src")).unwrap();
    std::fs::write(root.path().join("src/a.py"), "x").unwrap();

    let translator = PathTranslator::new(root.path().to_path_buf());
    for path in ["/workspace/src/a.py", "/workspace/src/gone.py", "/opt/other.py"] {
      let once = translator.translate(path);
      let twice = translator.translate(&once);
      assert_eq!(once, twice, "not idempotent for {path}");
    }
  }
}
