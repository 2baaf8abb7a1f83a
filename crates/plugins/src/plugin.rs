use crate::error::PluginError;
use codescope_core::{IndexShard, Language, Reference, SearchHit, SymbolDef};
use std::sync::{Arc, Mutex};

/// Options for a plugin-native search
#[derive(Debug, Clone)]
pub struct SearchOpts {
  pub limit: usize,
}

impl Default for SearchOpts {
  fn default() -> Self {
    Self { limit: 20 }
  }
}

/// A per-language symbol extractor plus optional search implementation.
///
/// Plugins are not assumed thread-safe; the registry wraps each instance in
/// a mutex and serializes calls.
pub trait Plugin: Send {
  fn language(&self) -> Language;

  /// Whether this plugin handles the given file path
  fn supports(&self, path: &str) -> bool;

  /// Extract the per-file symbol bundle for later commit to the store
  fn index_file(&mut self, path: &str, content: &str) -> Result<IndexShard, PluginError>;

  /// Definition of `name`, from what this plugin has indexed so far
  fn get_definition(&self, name: &str) -> Option<SymbolDef>;

  /// Use sites of `name`, from what this plugin has indexed so far
  fn find_references(&self, name: &str) -> Vec<Reference>;

  /// Plugin-native search. `None` means the capability is absent and the
  /// dispatcher should take the BM25 fallback path.
  fn search(&self, _query: &str, _opts: &SearchOpts) -> Option<Result<Vec<SearchHit>, PluginError>> {
    None
  }
}

/// A plugin instance with serialized access
pub type SharedPlugin = Arc<Mutex<Box<dyn Plugin>>>;
