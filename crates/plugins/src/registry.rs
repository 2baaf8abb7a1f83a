//! Plugin registry: eagerly registered plugins, a lazy factory with
//! process-lifetime memoization, and a record of languages that failed or
//! timed out so they are not retried.

use crate::error::PluginError;
use crate::plugin::{Plugin, SharedPlugin};
use codescope_core::Language;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub type PluginFactory = Arc<dyn Fn(Language) -> Result<Box<dyn Plugin>, PluginError> + Send + Sync>;

#[derive(Default)]
pub struct PluginRegistry {
  loaded: DashMap<Language, SharedPlugin>,
  skipped: DashMap<Language, String>,
  factory: Option<PluginFactory>,
}

impl PluginRegistry {
  /// Registry with no factory: only eagerly registered plugins are available
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_factory(factory: PluginFactory) -> Self {
    Self {
      loaded: DashMap::new(),
      skipped: DashMap::new(),
      factory: Some(factory),
    }
  }

  /// Eagerly register a plugin instance
  pub fn register(&self, plugin: Box<dyn Plugin>) {
    let language = plugin.language();
    debug!(%language, "Plugin registered");
    self.loaded.insert(language, Arc::new(Mutex::new(plugin)));
  }

  /// Already-loaded plugin for a language
  pub fn get(&self, language: Language) -> Option<SharedPlugin> {
    self.loaded.get(&language).map(|entry| Arc::clone(entry.value()))
  }

  /// Load a plugin through the factory, memoizing the instance.
  ///
  /// This call may block on plugin initialization; async callers run it on a
  /// blocking task under their own timeout.
  pub fn load(&self, language: Language) -> Result<SharedPlugin, PluginError> {
    if let Some(existing) = self.get(language) {
      return Ok(existing);
    }

    let Some(ref factory) = self.factory else {
      return Err(PluginError::Unsupported(language));
    };

    let plugin = factory(language)?;
    let shared: SharedPlugin = Arc::new(Mutex::new(plugin));
    self.loaded.insert(language, Arc::clone(&shared));
    debug!(%language, "Plugin loaded via factory");
    Ok(shared)
  }

  /// Record a language as skipped (load failure or timeout)
  pub fn mark_skipped(&self, language: Language, reason: impl Into<String>) {
    let reason = reason.into();
    warn!(%language, reason, "Language skipped");
    self.skipped.insert(language, reason);
  }

  pub fn is_skipped(&self, language: Language) -> bool {
    self.skipped.contains_key(&language)
  }

  pub fn has_factory(&self) -> bool {
    self.factory.is_some()
  }

  pub fn loaded_languages(&self) -> Vec<Language> {
    let mut langs: Vec<Language> = self.loaded.iter().map(|e| *e.key()).collect();
    langs.sort_by_key(|l| l.as_str());
    langs
  }

  pub fn skipped_languages(&self) -> Vec<(Language, String)> {
    let mut langs: Vec<(Language, String)> = self
      .skipped
      .iter()
      .map(|e| (*e.key(), e.value().clone()))
      .collect();
    langs.sort_by_key(|(l, _)| l.as_str());
    langs
  }

  pub fn plugin_count(&self) -> usize {
    self.loaded.len()
  }
}
