//! Integration tests for the codescope daemon: end-to-end through the
//! router, with isolated data directories per test.

use codescope_core::{Config, DispatcherConfig, IndexConfig};
use daemon::{Request, Response, Router, build_router};
use std::sync::Arc;
use tempfile::TempDir;

struct TestDaemon {
  _workspace: TempDir,
  _data: TempDir,
  workspace_path: std::path::PathBuf,
  router: Arc<Router>,
}

async fn daemon_with(config_tweak: impl FnOnce(&mut Config)) -> TestDaemon {
  let workspace = TempDir::new().expect("workspace temp dir");
  let data = TempDir::new().expect("data temp dir");

  let mut config = Config {
    index: IndexConfig {
      data_dir: Some(data.path().to_path_buf()),
      ..IndexConfig::default()
    },
    ..Config::default()
  };
  config_tweak(&mut config);

  let built = build_router(&config, workspace.path().to_path_buf())
    .await
    .expect("daemon should build");

  TestDaemon {
    workspace_path: workspace.path().to_path_buf(),
    _workspace: workspace,
    _data: data,
    router: built.router,
  }
}

async fn call(router: &Router, method: &str, params: serde_json::Value) -> Response {
  router
    .handle(Request {
      id: Some(serde_json::json!(1)),
      method: method.to_string(),
      params,
    })
    .await
}

fn write_source(daemon: &TestDaemon, rel: &str, content: &str) {
  let path = daemon.workspace_path.join(rel);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
}

#[tokio::test]
async fn test_reindex_then_symbol_lookup() {
  let daemon = daemon_with(|_| {}).await;
  write_source(&daemon, "src/models.py", "class Invoice:\n    def total(self):\n        return 0\n");

  let reindex = call(&daemon.router, "reindex", serde_json::json!({})).await;
  assert!(reindex.error.is_none(), "reindex failed: {:?}", reindex.error);
  let summary = reindex.result.unwrap();
  assert_eq!(summary["indexed_files"], 1);
  assert_eq!(summary["by_language"]["python"], 1);

  let lookup = call(&daemon.router, "symbol_lookup", serde_json::json!({"symbol": "Invoice"})).await;
  assert!(lookup.error.is_none());
  let body = lookup.result.unwrap();
  assert_eq!(body["symbol"], "Invoice");
  assert_eq!(body["kind"], "class");
  assert_eq!(body["language"], "python");
  assert_eq!(body["line"], 1);
  assert!(
    body["defined_in"].as_str().unwrap().ends_with("src/models.py"),
    "unexpected path: {}",
    body["defined_in"]
  );
  assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_symbol_lookup_miss_has_reason() {
  let daemon = daemon_with(|_| {}).await;

  let lookup = call(&daemon.router, "symbol_lookup", serde_json::json!({"symbol": "Ghost"})).await;
  assert!(lookup.error.is_none());
  let body = lookup.result.unwrap();
  assert_eq!(body["reason"], "not_found");
  assert!(body.get("defined_in").is_none());
}

#[tokio::test]
async fn test_search_code_bm25_fallback_simple_dispatcher() {
  let daemon = daemon_with(|config| {
    config.dispatcher = DispatcherConfig {
      use_simple_dispatcher: true,
      ..DispatcherConfig::default()
    };
  })
  .await;

  write_source(&daemon, "file1.rs", "// TODO x");
  write_source(&daemon, "file2.rs", "// done");
  call(&daemon.router, "reindex", serde_json::json!({})).await;

  let search = call(
    &daemon.router,
    "search_code",
    serde_json::json!({"query": "TODO", "limit": 5}),
  )
  .await;
  assert!(search.error.is_none());

  let body = search.result.unwrap();
  let results = body["results"].as_array().unwrap();
  assert_eq!(results.len(), 1);
  assert!(results[0]["file"].as_str().unwrap().ends_with("file1.rs"));
  assert!(results[0]["score"].is_number());
}

#[tokio::test]
async fn test_search_code_semantic_downgrade() {
  let daemon = daemon_with(|_| {}).await;
  write_source(&daemon, "a.py", "def searchable(): pass\n");
  call(&daemon.router, "reindex", serde_json::json!({})).await;

  let plain = call(&daemon.router, "search_code", serde_json::json!({"query": "searchable"})).await;
  let semantic = call(
    &daemon.router,
    "search_code",
    serde_json::json!({"query": "searchable", "semantic": true}),
  )
  .await;

  let plain_body = plain.result.unwrap();
  let semantic_body = semantic.result.unwrap();
  assert_eq!(semantic_body["semantic"], "unavailable");
  assert_eq!(plain_body["count"], semantic_body["count"]);
}

#[tokio::test]
async fn test_search_code_limit_respected() {
  let daemon = daemon_with(|_| {}).await;
  for i in 0..10 {
    write_source(&daemon, &format!("f{i}.rs"), "// needle content");
  }
  call(&daemon.router, "reindex", serde_json::json!({})).await;

  let limited = call(
    &daemon.router,
    "search_code",
    serde_json::json!({"query": "needle", "limit": 3}),
  )
  .await;
  let body = limited.result.unwrap();
  assert_eq!(body["results"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_get_status_shape() {
  let daemon = daemon_with(|_| {}).await;
  write_source(&daemon, "a.py", "def f(): pass\n");
  call(&daemon.router, "reindex", serde_json::json!({})).await;

  let status = call(&daemon.router, "get_status", serde_json::json!({})).await;
  assert!(status.error.is_none());
  let body = status.result.unwrap();

  assert_eq!(body["status"], "ok");
  assert_eq!(body["mode"], "plugin");
  assert!(body["supported_languages"].as_array().unwrap().len() >= 4);
  assert!(body["index"]["valid"].as_bool().unwrap());
  assert_eq!(body["store"]["files"], 1);
  assert!(body["operations"]["files_indexed"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_list_plugins() {
  let daemon = daemon_with(|_| {}).await;
  write_source(&daemon, "a.py", "def f(): pass\n");
  call(&daemon.router, "reindex", serde_json::json!({})).await;

  let plugins = call(&daemon.router, "list_plugins", serde_json::json!({})).await;
  let body = plugins.result.unwrap();

  let supported: Vec<&str> = body["supported_languages"]
    .as_array()
    .unwrap()
    .iter()
    .map(|v| v.as_str().unwrap())
    .collect();
  assert!(supported.contains(&"python"));
  assert!(supported.contains(&"rust"));

  // Indexing a Python file lazily loaded its plugin
  let loaded: Vec<&str> = body["loaded_plugins"]
    .as_array()
    .unwrap()
    .iter()
    .map(|v| v.as_str().unwrap())
    .collect();
  assert!(loaded.contains(&"python"));
}

#[tokio::test]
async fn test_reindex_is_incremental() {
  let daemon = daemon_with(|_| {}).await;
  write_source(&daemon, "a.py", "def f(): pass\n");

  let first = call(&daemon.router, "reindex", serde_json::json!({})).await;
  assert_eq!(first.result.unwrap()["indexed_files"], 1);

  // Unchanged bytes: nothing rewritten
  let second = call(&daemon.router, "reindex", serde_json::json!({})).await;
  let body = second.result.unwrap();
  assert_eq!(body["indexed_files"], 0);
  assert_eq!(body["ignored_files"], 1);

  // force reindexes regardless
  let forced = call(&daemon.router, "reindex", serde_json::json!({"force": true})).await;
  assert_eq!(forced.result.unwrap()["indexed_files"], 1);
}

#[tokio::test]
async fn test_invalid_params_code() {
  let daemon = daemon_with(|_| {}).await;

  let response = call(&daemon.router, "symbol_lookup", serde_json::json!({"wrong": 1})).await;
  assert_eq!(response.error.unwrap().code, -32602);
}

#[tokio::test]
async fn test_unknown_method_code() {
  let daemon = daemon_with(|_| {}).await;

  let response = call(&daemon.router, "no_such_method", serde_json::json!({})).await;
  assert_eq!(response.error.unwrap().code, -32601);
}

/// A plugin whose search blocks far past the operation timeout
struct HangingPlugin;

impl plugins::Plugin for HangingPlugin {
  fn language(&self) -> codescope_core::Language {
    codescope_core::Language::Ruby
  }
  fn supports(&self, _path: &str) -> bool {
    true
  }
  fn index_file(
    &mut self,
    path: &str,
    _content: &str,
  ) -> Result<codescope_core::IndexShard, plugins::PluginError> {
    Ok(codescope_core::IndexShard {
      file: path.to_string(),
      language: codescope_core::Language::Ruby,
      symbols: Vec::new(),
    })
  }
  fn get_definition(&self, _name: &str) -> Option<codescope_core::SymbolDef> {
    None
  }
  fn find_references(&self, _name: &str) -> Vec<codescope_core::Reference> {
    Vec::new()
  }
  fn search(
    &self,
    _query: &str,
    _opts: &plugins::SearchOpts,
  ) -> Option<Result<Vec<codescope_core::SearchHit>, plugins::PluginError>> {
    std::thread::sleep(std::time::Duration::from_secs(20));
    Some(Ok(Vec::new()))
  }
}

#[tokio::test]
async fn test_search_timeout_result_shape() {
  let workspace = TempDir::new().unwrap();

  let store = Arc::new(store::Store::open_in_memory().unwrap());
  let registry = Arc::new(plugins::PluginRegistry::new());
  registry.register(Box::new(HangingPlugin));

  let config = DispatcherConfig {
    search_timeout_secs: 1,
    ..DispatcherConfig::default()
  };
  let dispatcher = dispatch::Dispatcher::new(store, registry, config, workspace.path().to_path_buf())
    .await
    .unwrap();

  let tools = Arc::new(daemon::ToolHandler::new(Arc::new(dispatcher), None, false));
  let router = Router::new(tools);

  let response = call(&router, "search_code", serde_json::json!({"query": "anything"})).await;
  assert!(response.error.is_none(), "timeout is a structured result, not an RPC error");

  let body = response.result.unwrap();
  assert_eq!(body["error"], "Search timeout");
  assert_eq!(body["details"], "Search operation exceeded 1 second timeout");
  assert_eq!(body["query"], "anything");
}

#[tokio::test]
async fn test_debug_mode_adds_elapsed() {
  let daemon = daemon_with(|config| {
    config.debug = true;
  })
  .await;

  let status = call(&daemon.router, "get_status", serde_json::json!({})).await;
  let body = status.result.unwrap();
  assert!(body["elapsed_ms"].is_number());
}
