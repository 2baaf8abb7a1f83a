//! Per-language symbol extraction plugins.
//!
//! A plugin is anything implementing [`Plugin`]: a symbol extractor plus an
//! optional search implementation. The built-in plugins are tree-sitter
//! based; the registry serializes access to each instance and memoizes
//! factory-loaded plugins for the process lifetime.

mod error;
mod parser;
mod plugin;
mod queries;
mod registry;
mod treesitter;

pub use error::PluginError;
pub use parser::{Definition, SymbolParser};
pub use plugin::{Plugin, SearchOpts, SharedPlugin};
pub use registry::{PluginFactory, PluginRegistry};
pub use treesitter::{TreeSitterPlugin, treesitter_factory};
