//! Shared types for codescope: languages, symbols, repositories,
//! the error taxonomy, and environment-driven configuration.

mod code;
mod config;
mod error;
mod repo;

pub use code::{
  FileRecord, IndexShard, Language, Reference, SearchHit, ShardSymbol, Symbol, SymbolDef, SymbolKind,
};
pub use config::{CacheConfig, Config, CoordinatorConfig, DispatcherConfig, IndexConfig, default_data_dir};
pub use error::{Error, Result};
pub use repo::{RepoMetadata, RepoType, Repository, repo_identifier, repo_identifier_for_path};
