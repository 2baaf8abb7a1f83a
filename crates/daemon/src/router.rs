use crate::server::ShutdownHandle;
use crate::tools::ToolHandler;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// JSON-RPC style request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
  #[serde(default)]
  pub id: Option<serde_json::Value>,
  pub method: String,
  #[serde(default)]
  pub params: serde_json::Value,
}

/// JSON-RPC style response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
  pub code: i32,
  pub message: String,
}

impl Response {
  pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
    Self {
      id,
      result: Some(result),
      error: None,
    }
  }

  pub fn error(id: Option<serde_json::Value>, code: i32, message: &str) -> Self {
    Self {
      id,
      result: None,
      error: Some(RpcError {
        code,
        message: message.to_string(),
      }),
    }
  }
}

/// Request router for the daemon
pub struct Router {
  tools: Arc<ToolHandler>,
  shutdown_handle: Mutex<Option<ShutdownHandle>>,
}

impl Router {
  pub fn new(tools: Arc<ToolHandler>) -> Self {
    Self {
      tools,
      shutdown_handle: Mutex::new(None),
    }
  }

  /// Set the shutdown handle (called after the server is created)
  pub async fn set_shutdown_handle(&self, handle: ShutdownHandle) {
    let mut guard = self.shutdown_handle.lock().await;
    *guard = Some(handle);
  }

  pub fn tools(&self) -> &Arc<ToolHandler> {
    &self.tools
  }

  /// Handle one incoming request
  pub async fn handle(&self, request: Request) -> Response {
    debug!("Handling request: {}", request.method);

    match request.method.as_str() {
      // Health/meta
      "ping" => Response::success(request.id, serde_json::json!("pong")),
      "shutdown" => self.handle_shutdown(request).await,

      // Query tool surface
      "symbol_lookup" => self.tools.symbol_lookup(request).await,
      "search_code" => self.tools.search_code(request).await,
      "get_status" => self.tools.get_status(request).await,
      "list_plugins" => self.tools.list_plugins(request).await,
      "reindex" => self.tools.reindex(request).await,

      _ => {
        warn!("Unknown method: {}", request.method);
        Response::error(request.id, -32601, &format!("Method not found: {}", request.method))
      }
    }
  }

  async fn handle_shutdown(&self, request: Request) -> Response {
    info!("Shutdown requested via RPC");
    let guard = self.shutdown_handle.lock().await;
    if let Some(ref handle) = *guard {
      handle.shutdown();
      Response::success(request.id, serde_json::json!({"status": "shutting_down"}))
    } else {
      Response::error(request.id, -32000, "Shutdown handle not available")
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_response_success() {
    let response = Response::success(Some(serde_json::json!(1)), serde_json::json!("ok"));
    assert!(response.result.is_some());
    assert!(response.error.is_none());
  }

  #[test]
  fn test_response_error() {
    let response = Response::error(Some(serde_json::json!(1)), -32601, "nope");
    assert!(response.result.is_none());
    assert_eq!(response.error.as_ref().unwrap().code, -32601);
  }

  #[test]
  fn test_request_parsing_defaults() {
    let request: Request = serde_json::from_str(r#"{"method": "ping"}"#).unwrap();
    assert!(request.id.is_none());
    assert_eq!(request.method, "ping");
    assert!(request.params.is_null());
  }
}
