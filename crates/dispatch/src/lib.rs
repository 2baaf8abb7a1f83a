//! The dispatcher: query routing, plugin orchestration with load timeouts,
//! BM25 fallback, multi-repository fan-out, and path translation.

mod dispatcher;
mod fallback;
mod multi_repo;
mod paths;

pub use dispatcher::{
  Dispatcher, HealthStatus, IndexSummary, LookupResult, MatchKind, OperationSnapshot, SearchOptions,
  SearchResponse, supported_languages,
};
pub use fallback::{bm25_search_hits, bm25_search_hits_scoped, extract_symbol_candidates};
pub use multi_repo::{MultiRepoManager, normalize_identifier};
pub use paths::PathTranslator;
