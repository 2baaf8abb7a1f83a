//! Handlers for the query tool surface. Each handler deserializes its own
//! params, delegates to the dispatcher, and shapes the response object.
//! Every response carries a timestamp; debug mode adds elapsed_ms.

use crate::router::{Request, Response};
use chrono::Utc;
use codescope_core::Error;
use dispatch::{Dispatcher, SearchOptions};
use distrib::Coordinator;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub struct ToolHandler {
  dispatcher: Arc<Dispatcher>,
  coordinator: Option<Arc<Coordinator>>,
  debug: bool,
}

impl ToolHandler {
  pub fn new(dispatcher: Arc<Dispatcher>, coordinator: Option<Arc<Coordinator>>, debug: bool) -> Self {
    Self {
      dispatcher,
      coordinator,
      debug,
    }
  }

  pub fn dispatcher(&self) -> &Arc<Dispatcher> {
    &self.dispatcher
  }

  /// Stamp the response with a timestamp (and elapsed_ms in debug mode)
  fn finish(&self, mut value: serde_json::Value, started: Instant) -> serde_json::Value {
    if let Some(obj) = value.as_object_mut() {
      obj.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
      if self.debug {
        obj.insert("elapsed_ms".into(), json!(started.elapsed().as_millis() as u64));
      }
    }
    value
  }

  pub async fn symbol_lookup(&self, request: Request) -> Response {
    #[derive(Deserialize)]
    struct Args {
      symbol: String,
      #[serde(default)]
      repository: Option<String>,
    }

    let args: Args = match serde_json::from_value(request.params.clone()) {
      Ok(a) => a,
      Err(e) => return Response::error(request.id, -32602, &format!("Invalid params: {}", e)),
    };

    let started = Instant::now();
    let result = self.dispatcher.lookup(&args.symbol, args.repository.as_deref()).await;

    match result {
      Ok(lookup) => {
        let body = match lookup.definition {
          Some(def) => json!({
            "symbol": def.symbol,
            "kind": def.kind,
            "language": def.language,
            "signature": def.signature,
            "doc": def.doc,
            "defined_in": def.defined_in,
            "line": def.line,
            "span": def.span,
            "match": lookup.match_kind,
            "stale_index": lookup.stale_index,
          }),
          None => json!({
            "symbol": args.symbol,
            "reason": lookup.reason,
            "stale_index": lookup.stale_index,
          }),
        };
        Response::success(request.id, self.finish(body, started))
      }
      Err(e) => Response::error(request.id, -32000, &e.to_string()),
    }
  }

  pub async fn search_code(&self, request: Request) -> Response {
    #[derive(Deserialize)]
    struct Args {
      query: String,
      #[serde(default)]
      repository: Option<String>,
      #[serde(default)]
      semantic: bool,
      #[serde(default)]
      limit: Option<usize>,
    }

    let args: Args = match serde_json::from_value(request.params.clone()) {
      Ok(a) => a,
      Err(e) => return Response::error(request.id, -32602, &format!("Invalid params: {}", e)),
    };

    let started = Instant::now();
    let opts = SearchOptions {
      semantic: args.semantic,
      limit: args.limit,
      repository: args.repository,
    };

    match self.dispatcher.search(&args.query, opts).await {
      Ok(response) => {
        let body = json!({
          "results": response.hits,
          "count": response.hits.len(),
          "semantic": response.semantic,
          "reason": response.reason,
          "stale_index": response.stale_index,
        });
        Response::success(request.id, self.finish(body, started))
      }
      // Timeouts surface as a structured result carrying the query, so
      // callers can retry without re-deriving their input
      Err(Error::Timeout { .. }) => {
        debug!(query = args.query, "Search timed out");
        let body = json!({
          "error": "Search timeout",
          "details": format!(
            "Search operation exceeded {} second timeout",
            self.dispatcher.search_timeout_secs()
          ),
          "query": args.query,
        });
        Response::success(request.id, self.finish(body, started))
      }
      Err(e) => Response::error(request.id, -32000, &e.to_string()),
    }
  }

  pub async fn get_status(&self, request: Request) -> Response {
    let started = Instant::now();

    match self.dispatcher.health_check().await {
      Ok(health) => {
        let mut body = match serde_json::to_value(&health) {
          Ok(v) => v,
          Err(e) => return Response::error(request.id, -32000, &format!("Status serialization: {}", e)),
        };

        if let Some(ref coordinator) = self.coordinator
          && let Some(obj) = body.as_object_mut()
        {
          obj.insert("distributed".into(), json!(coordinator.progress()));
        }

        Response::success(request.id, self.finish(body, started))
      }
      Err(e) => Response::error(request.id, -32000, &e.to_string()),
    }
  }

  pub async fn list_plugins(&self, request: Request) -> Response {
    let started = Instant::now();
    let registry = self.dispatcher.registry();

    let body = json!({
      "supported_languages": dispatch::supported_languages(),
      "loaded_plugins": registry
        .loaded_languages()
        .iter()
        .map(|l| l.as_str())
        .collect::<Vec<_>>(),
    });

    Response::success(request.id, self.finish(body, started))
  }

  pub async fn reindex(&self, request: Request) -> Response {
    #[derive(Deserialize, Default)]
    struct Args {
      #[serde(default)]
      path: Option<String>,
      #[serde(default)]
      force: bool,
    }

    let args: Args = if request.params.is_null() {
      Args::default()
    } else {
      match serde_json::from_value(request.params.clone()) {
        Ok(a) => a,
        Err(e) => return Response::error(request.id, -32602, &format!("Invalid params: {}", e)),
      }
    };

    let started = Instant::now();
    let root = args
      .path
      .map(PathBuf::from)
      .unwrap_or_else(|| self.dispatcher.translator().workspace_root().to_path_buf());

    match self.dispatcher.index_directory(&root, true, args.force).await {
      Ok(summary) => {
        let body = json!({
          "indexed_files": summary.indexed_files,
          "ignored_files": summary.ignored_files,
          "failed_files": summary.failed_files,
          "total_files": summary.total_files,
          "by_language": summary.by_language,
        });
        Response::success(request.id, self.finish(body, started))
      }
      Err(e) => Response::error(request.id, -32000, &e.to_string()),
    }
  }
}
