use codescope_core::Language;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PluginError {
  #[error("No plugin available for language: {0}")]
  Unsupported(Language),
  #[error("Grammar failed to load for {0}")]
  GrammarLoad(Language),
  #[error("Parse failed: {0}")]
  Parse(String),
  #[error("Plugin panicked: {0}")]
  Panicked(String),
}
