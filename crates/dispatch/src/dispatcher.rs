//! The query router: resolves lookups and searches against plugins and the
//! index store, enforces per-operation timeouts, falls back to BM25, fans
//! out to authorized reference repositories, and exposes observability.

use crate::fallback::{bm25_search_hits, extract_symbol_candidates};
use crate::multi_repo::MultiRepoManager;
use crate::paths::PathTranslator;
use cache::{QueryCache, TierStats};
use codescope_core::{
  DispatcherConfig, Error, FileRecord, Language, Result, SearchHit, ShardSymbol, Symbol, SymbolDef,
};
use plugins::{PluginRegistry, SearchOpts, SharedPlugin};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use store::{Store, UpsertOutcome, ValidationReport};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Options for a search operation
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
  pub semantic: bool,
  pub limit: Option<usize>,
  pub repository: Option<String>,
}

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 1000;

/// How a lookup found its definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
  Exact,
  Fuzzy,
}

/// Lookup outcome; an absent definition is a result, never an error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResult {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub definition: Option<SymbolDef>,
  pub match_kind: MatchKind,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  pub stale_index: bool,
}

/// Search outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
  pub hits: Vec<SearchHit>,
  /// Set to "unavailable" when semantic search was requested but the
  /// capability is disabled; the lexical path answered instead
  #[serde(skip_serializing_if = "Option::is_none")]
  pub semantic: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  pub stale_index: bool,
}

/// Summary of an indexing run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSummary {
  pub indexed_files: u64,
  pub ignored_files: u64,
  pub failed_files: u64,
  pub total_files: u64,
  pub by_language: BTreeMap<String, u64>,
}

/// Structured status for `get_status`
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
  pub status: &'static str,
  pub mode: &'static str,
  pub languages_loaded: Vec<String>,
  pub languages_skipped: Vec<String>,
  pub supported_languages: Vec<String>,
  pub plugin_count: usize,
  pub multi_repo_enabled: bool,
  pub operations: OperationSnapshot,
  pub index: ValidationReport,
  pub store: store::StoreCounts,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cache: Option<TierStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationSnapshot {
  pub lookups: u64,
  pub searches: u64,
  pub files_indexed: u64,
  /// Operation name → when it last ran
  pub last_operation_times: BTreeMap<String, chrono::DateTime<chrono::Utc>>,
}

#[derive(Default)]
struct OperationCounters {
  lookups: AtomicU64,
  searches: AtomicU64,
  files_indexed: AtomicU64,
  last_times: std::sync::Mutex<BTreeMap<String, chrono::DateTime<chrono::Utc>>>,
}

impl OperationCounters {
  fn touch(&self, op: &str) {
    let mut times = self.last_times.lock().unwrap_or_else(|p| p.into_inner());
    times.insert(op.to_string(), chrono::Utc::now());
  }

  fn snapshot(&self) -> OperationSnapshot {
    OperationSnapshot {
      lookups: self.lookups.load(Ordering::Relaxed),
      searches: self.searches.load(Ordering::Relaxed),
      files_indexed: self.files_indexed.load(Ordering::Relaxed),
      last_operation_times: self.last_times.lock().unwrap_or_else(|p| p.into_inner()).clone(),
    }
  }
}

pub struct Dispatcher {
  store: Arc<Store>,
  registry: Arc<PluginRegistry>,
  translator: PathTranslator,
  config: DispatcherConfig,
  query_cache: Option<Arc<QueryCache>>,
  multi_repo: Option<Arc<MultiRepoManager>>,
  local_repo_id: i64,
  workspace_root: PathBuf,
  stale: AtomicBool,
  counters: OperationCounters,
}

impl Dispatcher {
  /// Build a dispatcher over one local store. Registers the workspace as
  /// the local repository and runs the startup staleness probe.
  pub async fn new(
    store: Arc<Store>,
    registry: Arc<PluginRegistry>,
    config: DispatcherConfig,
    workspace_root: PathBuf,
  ) -> Result<Self> {
    let name = workspace_root
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "workspace".to_string());
    let path = workspace_root.to_string_lossy().into_owned();

    let local_repo_id = {
      let store = Arc::clone(&store);
      let metadata = codescope_core::RepoMetadata::default();
      run_store(move || store.create_repository(&path, &name, &metadata)).await?
    };

    let dispatcher = Self {
      translator: PathTranslator::new(workspace_root.clone()),
      store,
      registry,
      config,
      query_cache: None,
      multi_repo: None,
      local_repo_id,
      workspace_root,
      stale: AtomicBool::new(false),
      counters: OperationCounters::default(),
    };

    // Startup staleness probe; advisory only
    if let Ok(report) = dispatcher.validate().await {
      dispatcher.stale.store(!report.valid, Ordering::Relaxed);
    }

    Ok(dispatcher)
  }

  pub fn with_cache(mut self, cache: Arc<QueryCache>) -> Self {
    self.query_cache = Some(cache);
    self
  }

  pub fn with_multi_repo(mut self, manager: Arc<MultiRepoManager>) -> Self {
    self.multi_repo = Some(manager);
    self
  }

  pub fn local_repo_id(&self) -> i64 {
    self.local_repo_id
  }

  pub fn translator(&self) -> &PathTranslator {
    &self.translator
  }

  pub fn registry(&self) -> &Arc<PluginRegistry> {
    &self.registry
  }

  pub fn store(&self) -> &Arc<Store> {
    &self.store
  }

  pub fn search_timeout_secs(&self) -> u64 {
    self.config.search_timeout_secs
  }

  // --- lookup ---------------------------------------------------------

  /// Resolve a symbol definition. Absence is reported in the result, never
  /// as an error.
  pub async fn lookup(&self, name: &str, repo: Option<&str>) -> Result<LookupResult> {
    if name.trim().is_empty() {
      return Err(Error::Validation("symbol name must not be empty".into()));
    }

    self.counters.lookups.fetch_add(1, Ordering::Relaxed);
    self.counters.touch("lookup");

    let Some(ref cache) = self.query_cache else {
      return self.lookup_uncached(name, repo).await;
    };

    let params = serde_json::json!({ "symbol": name, "repository": repo });
    let value = cache
      .get_or_compute(cache::QueryType::SymbolLookup, &params, Vec::new(), || async {
        let result = self.lookup_uncached(name, repo).await?;
        serde_json::to_value(&result).map_err(|e| Error::Validation(e.to_string()))
      })
      .await?;

    serde_json::from_value(value).map_err(|e| Error::Validation(e.to_string()))
  }

  async fn lookup_uncached(&self, name: &str, repo: Option<&str>) -> Result<LookupResult> {
    let scope = self.resolve_scope(repo)?;

    // Exact: the store is the durable source of truth
    if let Some(def) = self.lookup_exact(name, &scope).await? {
      return Ok(self.found(def, MatchKind::Exact));
    }

    // Loaded plugins may know symbols not yet committed to the store
    if scope.is_local() {
      if let Some(def) = self.lookup_in_plugins(name).await {
        return Ok(self.found(def, MatchKind::Exact));
      }
    }

    // Fuzzy: mine BM25 snippets for near-miss identifiers and retry
    if let Some(def) = self.lookup_fuzzy(name, &scope).await? {
      return Ok(self.found(def, MatchKind::Fuzzy));
    }

    let reason = if self.stale.load(Ordering::Relaxed) {
      "stale_index"
    } else {
      "not_found"
    };

    Ok(LookupResult {
      definition: None,
      match_kind: MatchKind::Exact,
      reason: Some(reason.to_string()),
      stale_index: self.stale.load(Ordering::Relaxed),
    })
  }

  fn found(&self, mut def: SymbolDef, match_kind: MatchKind) -> LookupResult {
    def.defined_in = self.translator.translate(&def.defined_in);
    LookupResult {
      definition: Some(def),
      match_kind,
      reason: None,
      stale_index: self.stale.load(Ordering::Relaxed),
    }
  }

  async fn lookup_exact(&self, name: &str, scope: &LookupScope) -> Result<Option<SymbolDef>> {
    let store = scope.store(&self.store);
    let repo_scope = scope.repo_id();
    let owned_name = name.to_string();
    let rows = run_store(move || store.lookup_symbol(&owned_name, repo_scope)).await?;
    Ok(rows.into_iter().next().map(|(symbol, file)| symbol_def(symbol, file)))
  }

  async fn lookup_in_plugins(&self, name: &str) -> Option<SymbolDef> {
    for language in self.registry.loaded_languages() {
      let Some(plugin) = self.registry.get(language) else {
        continue;
      };
      let owned_name = name.to_string();
      match with_plugin(plugin, move |p| p.get_definition(&owned_name)).await {
        Ok(Some(def)) => return Some(def),
        Ok(None) => {}
        Err(e) => warn!(%language, "Plugin lookup failed: {e}"),
      }
    }
    None
  }

  async fn lookup_fuzzy(&self, name: &str, scope: &LookupScope) -> Result<Option<SymbolDef>> {
    let store = scope.store(&self.store);
    let owned_name = name.to_string();
    let snippets: Vec<String> = run_store(move || {
      Ok(
        store
          .bm25_search(&owned_name, 10)?
          .into_iter()
          .map(|h| h.snippet)
          .collect(),
      )
    })
    .await?;

    for candidate in extract_symbol_candidates(&snippets, name) {
      if candidate == name {
        continue; // exact form already failed above
      }
      if let Some(def) = self.lookup_exact(&candidate, scope).await? {
        debug!(name, candidate, "Fuzzy lookup matched");
        return Ok(Some(def));
      }
    }

    Ok(None)
  }

  // --- search ---------------------------------------------------------

  /// Ranked code search, bounded by the 10-second operation timeout
  pub async fn search(&self, query: &str, opts: SearchOptions) -> Result<SearchResponse> {
    if query.trim().is_empty() {
      return Err(Error::Validation("query must not be empty".into()));
    }
    let limit = opts.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
      return Err(Error::Validation(format!("limit must be between 1 and {MAX_LIMIT}")));
    }

    self.counters.searches.fetch_add(1, Ordering::Relaxed);
    self.counters.touch("search");

    let Some(ref cache) = self.query_cache else {
      return self.search_timed(query, &opts, limit).await;
    };

    let query_type = if opts.semantic {
      cache::QueryType::SemanticSearch
    } else {
      cache::QueryType::Search
    };
    let params = serde_json::json!({
      "query": query,
      "limit": limit,
      "semantic": opts.semantic,
      "repository": opts.repository,
    });

    let value = cache
      .get_or_compute(query_type, &params, Vec::new(), || async {
        let response = self.search_timed(query, &opts, limit).await?;
        serde_json::to_value(&response).map_err(|e| Error::Validation(e.to_string()))
      })
      .await?;

    serde_json::from_value(value).map_err(|e| Error::Validation(e.to_string()))
  }

  async fn search_timed(&self, query: &str, opts: &SearchOptions, limit: usize) -> Result<SearchResponse> {
    let started = Instant::now();
    let limit_secs = self.config.search_timeout_secs;

    match timeout(self.config.search_timeout(), self.search_inner(query, opts, limit)).await {
      Ok(result) => result,
      Err(_) => Err(Error::Timeout {
        phase: "Search operation",
        limit_secs,
        elapsed_ms: started.elapsed().as_millis() as u64,
      }),
    }
  }

  async fn search_inner(&self, query: &str, opts: &SearchOptions, limit: usize) -> Result<SearchResponse> {
    let semantic_note = opts.semantic.then(|| "unavailable".to_string());

    let mut hits = match opts.repository.as_deref() {
      Some(repo) => self.search_scoped(query, repo, limit).await?,
      None => self.search_local(query, limit).await?,
    };

    hits.truncate(limit);

    for hit in &mut hits {
      hit.file = self.translator.translate(&hit.file);
    }

    let reason = hits.is_empty().then(|| {
      if self.stale.load(Ordering::Relaxed) {
        "stale_index".to_string()
      } else {
        "not_found".to_string()
      }
    });

    Ok(SearchResponse {
      hits,
      semantic: semantic_note,
      reason,
      stale_index: self.stale.load(Ordering::Relaxed),
    })
  }

  /// Plugin-first local search; BM25 when no plugin answers
  async fn search_local(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    if !self.config.use_simple_dispatcher {
      let mut answered = false;
      let mut merged: Vec<SearchHit> = Vec::new();

      for language in self.registry.loaded_languages() {
        let Some(plugin) = self.registry.get(language) else {
          continue;
        };
        let owned_query = query.to_string();
        let opts = SearchOpts { limit };

        match with_plugin(plugin, move |p| p.search(&owned_query, &opts)).await {
          Ok(Some(Ok(hits))) => {
            answered = true;
            merged.extend(hits);
          }
          Ok(Some(Err(e))) => warn!(%language, "Plugin search failed: {e}"),
          Ok(None) => {} // capability absent
          Err(e) => warn!(%language, "Plugin search panicked: {e}"),
        }
      }

      if answered {
        merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        return Ok(merged);
      }
    }

    // BM25 path: always available once the store is initialized
    let store = Arc::clone(&self.store);
    let owned_query = query.to_string();
    run_store(move || bm25_search_hits(&store, &owned_query, limit)).await
  }

  /// Repository-scoped search: numeric id against the local store, anything
  /// else through the multi-repo manager with timeout-guarded fallback
  async fn search_scoped(&self, query: &str, repo: &str, limit: usize) -> Result<Vec<SearchHit>> {
    if let Ok(repo_id) = repo.parse::<i64>() {
      let store = Arc::clone(&self.store);
      let owned_query = query.to_string();
      return run_store(move || {
        store.get_repository(repo_id)?;
        crate::fallback::bm25_search_hits_scoped(&store, &owned_query, limit, repo_id)
      })
      .await;
    }

    let Some(ref manager) = self.multi_repo else {
      return Err(Error::BackendUnavailable("multi-repository mode is not enabled".into()));
    };

    let repos: Vec<String> = repo.split(',').map(|r| r.trim().to_string()).filter(|r| !r.is_empty()).collect();

    // Authorization failures are hard errors, not fallback material
    for r in &repos {
      if !manager.is_authorized(r) {
        return Err(Error::Unauthorized { repo: r.clone() });
      }
    }

    let outer = std::time::Duration::from_secs(self.config.multi_repo_timeout_secs);
    let fan_out = async {
      if repos.len() == 1 {
        manager.search_repo(&repos[0], query, limit).await
      } else {
        Ok(manager.search_many(&repos, query, limit).await)
      }
    };

    match timeout(outer, fan_out).await {
      Ok(Ok(hits)) => Ok(hits),
      Ok(Err(e)) => {
        warn!(repo, "Multi-repo search failed, falling back to local: {e}");
        self.search_local_with_inner_timeout(query, limit).await
      }
      Err(_) => {
        warn!(repo, "Multi-repo search timed out, falling back to local");
        self.search_local_with_inner_timeout(query, limit).await
      }
    }
  }

  async fn search_local_with_inner_timeout(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let inner = std::time::Duration::from_secs(self.config.multi_repo_fallback_timeout_secs);
    let started = Instant::now();

    match timeout(inner, self.search_local(query, limit)).await {
      Ok(result) => result,
      Err(_) => Err(Error::Timeout {
        phase: "Local fallback search",
        limit_secs: self.config.multi_repo_fallback_timeout_secs,
        elapsed_ms: started.elapsed().as_millis() as u64,
      }),
    }
  }

  // --- indexing -------------------------------------------------------

  /// Index one file: plugin extraction (when a plugin is available) plus
  /// the BM25 document. Reindexes only when the content hash changed.
  pub async fn index_file(&self, path: &Path, force: bool) -> Result<IndexSummary> {
    let mut summary = IndexSummary::default();
    self.index_one(path, force, &mut summary).await?;
    summary.total_files = summary.indexed_files + summary.ignored_files + summary.failed_files;
    Ok(summary)
  }

  /// Index a directory tree, honoring ignore files and skipping
  /// version-control internals
  pub async fn index_directory(&self, root: &Path, recursive: bool, force: bool) -> Result<IndexSummary> {
    if !root.exists() {
      return Err(Error::PathNotFound(root.to_string_lossy().into_owned()));
    }

    let mut walker = ignore::WalkBuilder::new(root);
    walker.git_ignore(true).git_global(true).git_exclude(true).hidden(true);
    if !recursive {
      walker.max_depth(Some(1));
    }

    let files: Vec<PathBuf> = walker
      .build()
      .filter_map(|e| e.ok())
      .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
      .map(|e| e.into_path())
      .collect();

    let mut summary = IndexSummary::default();
    for file in files {
      if let Err(e) = self.index_one(&file, force, &mut summary).await {
        warn!(path = %file.display(), "Index failed: {e}");
        summary.failed_files += 1;
      }
    }

    summary.total_files = summary.indexed_files + summary.ignored_files + summary.failed_files;
    info!(
      root = %root.display(),
      indexed = summary.indexed_files,
      ignored = summary.ignored_files,
      failed = summary.failed_files,
      "Directory indexed"
    );
    Ok(summary)
  }

  async fn index_one(&self, path: &Path, force: bool, summary: &mut IndexSummary) -> Result<()> {
    if !path.exists() {
      return Err(Error::PathNotFound(path.to_string_lossy().into_owned()));
    }

    let abs_path = path.to_string_lossy().into_owned();
    let Some(language) = Language::from_path(&abs_path) else {
      summary.ignored_files += 1;
      return Ok(());
    };

    let Ok(content) = tokio::fs::read_to_string(path).await else {
      // Binary or unreadable content is ignored, not failed
      summary.ignored_files += 1;
      return Ok(());
    };

    let symbols = self.extract_symbols(&abs_path, &content, language).await;

    let rel_path = path
      .strip_prefix(&self.workspace_root)
      .map(|p| p.to_string_lossy().into_owned())
      .unwrap_or_else(|_| abs_path.clone());

    let store = Arc::clone(&self.store);
    let repo_id = self.local_repo_id;
    let owned_abs = abs_path.clone();
    let owned_rel = rel_path;
    let owned_content = content;
    let outcome = run_store(move || {
      store.upsert_file(
        repo_id,
        &owned_abs,
        &owned_rel,
        &owned_content,
        Some(language),
        &symbols,
        force,
      )
    })
    .await?;

    match outcome {
      UpsertOutcome::Unchanged => {
        summary.ignored_files += 1;
      }
      UpsertOutcome::Inserted | UpsertOutcome::Updated => {
        summary.indexed_files += 1;
        *summary.by_language.entry(language.as_str().to_string()).or_insert(0) += 1;
        self.counters.files_indexed.fetch_add(1, Ordering::Relaxed);
        self.counters.touch("index");

        if let Some(ref cache) = self.query_cache {
          cache.inner().invalidate_file(&abs_path).await;
        }
      }
    }

    Ok(())
  }

  /// Plugin extraction with the load timeout and panic isolation; plugin
  /// trouble degrades to an empty symbol list
  async fn extract_symbols(&self, path: &str, content: &str, language: Language) -> Vec<ShardSymbol> {
    let Some(plugin) = self.plugin_for(language).await else {
      return Vec::new();
    };

    let owned_path = path.to_string();
    let owned_content = content.to_string();

    match with_plugin(plugin, move |p| p.index_file(&owned_path, &owned_content)).await {
      Ok(Ok(shard)) => shard.symbols,
      Ok(Err(e)) => {
        warn!(%language, path, "Plugin extraction failed: {e}");
        Vec::new()
      }
      Err(e) => {
        warn!(%language, path, "Plugin extraction panicked: {e}");
        Vec::new()
      }
    }
  }

  /// Loaded plugin for a language, loading through the factory under the
  /// configured timeout. A timed-out or failed load marks the language
  /// skipped for the process lifetime.
  pub async fn plugin_for(&self, language: Language) -> Option<SharedPlugin> {
    if self.config.use_simple_dispatcher {
      return None;
    }

    if let Some(plugin) = self.registry.get(language) {
      return Some(plugin);
    }

    if self.registry.is_skipped(language) || !self.registry.has_factory() {
      return None;
    }

    let registry = Arc::clone(&self.registry);
    let load = tokio::task::spawn_blocking(move || registry.load(language));

    match timeout(self.config.plugin_load_timeout(), load).await {
      Ok(Ok(Ok(plugin))) => Some(plugin),
      Ok(Ok(Err(e))) => {
        self.registry.mark_skipped(language, e.to_string());
        None
      }
      Ok(Err(join_err)) => {
        self.registry.mark_skipped(language, format!("load panicked: {join_err}"));
        None
      }
      Err(_) => {
        // The load thread is abandoned; its eventual result is discarded
        self.registry.mark_skipped(language, "load timed out");
        None
      }
    }
  }

  // --- observability --------------------------------------------------

  /// Structured health status; re-runs the staleness probe
  pub async fn health_check(&self) -> Result<HealthStatus> {
    let report = self.validate().await?;
    self.stale.store(!report.valid, Ordering::Relaxed);

    let store = Arc::clone(&self.store);
    let counts = run_store(move || store.counts()).await?;

    Ok(HealthStatus {
      status: if report.valid { "ok" } else { "degraded" },
      mode: if self.config.use_simple_dispatcher {
        "simple"
      } else {
        "plugin"
      },
      languages_loaded: self
        .registry
        .loaded_languages()
        .iter()
        .map(|l| l.as_str().to_string())
        .collect(),
      languages_skipped: self
        .registry
        .skipped_languages()
        .iter()
        .map(|(l, _)| l.as_str().to_string())
        .collect(),
      supported_languages: supported_languages(),
      plugin_count: self.registry.plugin_count(),
      multi_repo_enabled: self.multi_repo.is_some(),
      operations: self.counters.snapshot(),
      index: report,
      store: counts,
      cache: self.query_cache.as_ref().map(|c| c.inner().stats()),
    })
  }

  async fn validate(&self) -> Result<ValidationReport> {
    let store = Arc::clone(&self.store);
    run_store(move || store.validate()).await
  }

  /// Resolve a repository argument: absent → local store; numeric id →
  /// local store scoped to that row; anything else → an authorized
  /// reference repository's own store
  fn resolve_scope(&self, repo: Option<&str>) -> Result<LookupScope> {
    match repo {
      None => Ok(LookupScope::Local),
      Some(raw) => match raw.parse::<i64>() {
        Ok(id) => Ok(LookupScope::LocalRepo(id)),
        Err(_) => {
          let Some(ref manager) = self.multi_repo else {
            return Err(Error::BackendUnavailable("multi-repository mode is not enabled".into()));
          };
          let (_, store) = manager.resolve(raw)?;
          Ok(LookupScope::Reference(store))
        }
      },
    }
  }
}

/// Where a lookup resolves its rows
enum LookupScope {
  Local,
  LocalRepo(i64),
  Reference(Arc<Store>),
}

impl LookupScope {
  fn store(&self, local: &Arc<Store>) -> Arc<Store> {
    match self {
      LookupScope::Reference(store) => Arc::clone(store),
      _ => Arc::clone(local),
    }
  }

  fn repo_id(&self) -> Option<i64> {
    match self {
      LookupScope::LocalRepo(id) => Some(*id),
      _ => None,
    }
  }

  fn is_local(&self) -> bool {
    !matches!(self, LookupScope::Reference(_))
  }
}

/// Languages the built-in factory can instantiate
pub fn supported_languages() -> Vec<String> {
  [Language::Go, Language::JavaScript, Language::Python, Language::Rust]
    .iter()
    .map(|l| l.as_str().to_string())
    .collect()
}

fn symbol_def(symbol: Symbol, file: FileRecord) -> SymbolDef {
  SymbolDef {
    symbol: symbol.name,
    kind: symbol.kind,
    language: file.language.unwrap_or(Language::Markdown),
    signature: symbol.signature,
    doc: symbol.doc,
    defined_in: file.abs_path,
    line: symbol.line_start,
    span: (symbol.line_start, symbol.line_end),
  }
}

/// Store access on the blocking pool, errors translated to the taxonomy
async fn run_store<T: Send + 'static>(
  f: impl FnOnce() -> store::StoreResult<T> + Send + 'static,
) -> Result<T> {
  tokio::task::spawn_blocking(f)
    .await
    .map_err(|e| Error::BackendUnavailable(format!("store task: {e}")))?
    .map_err(store_error)
}

fn store_error(err: store::StoreError) -> Error {
  match err {
    store::StoreError::NotFound(what) => Error::NotFound {
      entity: "store row",
      id: what,
    },
    store::StoreError::SchemaMismatch { found, supported } => Error::SchemaMismatch { found, supported },
    store::StoreError::Io(e) => Error::Io(e),
    store::StoreError::Corrupt(what) => Error::BackendUnavailable(what),
  }
}

/// Run a closure against a plugin on the blocking pool. The registry mutex
/// serializes calls per instance; a panic inside the plugin surfaces as a
/// `PluginFailure` instead of propagating.
async fn with_plugin<T: Send + 'static>(
  plugin: SharedPlugin,
  f: impl FnOnce(&mut dyn plugins::Plugin) -> T + Send + 'static,
) -> std::result::Result<T, Error> {
  tokio::task::spawn_blocking(move || {
    let mut guard = plugin.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(guard.as_mut())
  })
  .await
  .map_err(|e| Error::PluginFailure(e.to_string()))
}
