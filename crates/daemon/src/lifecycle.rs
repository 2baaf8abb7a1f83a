//! Daemon lifecycle: wire configuration into components, run the stdio
//! server, and shut everything down cleanly on signal or RPC.

use crate::router::Router;
use crate::server::Server;
use crate::tools::ToolHandler;
use cache::{QueryCache, TieredCache};
use codescope_core::{Config, repo_identifier_for_path};
use dispatch::{Dispatcher, MultiRepoManager};
use distrib::Coordinator;
use plugins::{PluginRegistry, treesitter_factory};
use std::path::PathBuf;
use std::sync::Arc;
use store::{Store, db_path_for, discover_index};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum LifecycleError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Server error: {0}")]
  Server(#[from] crate::server::ServerError),
  #[error("Startup error: {0}")]
  Startup(String),
}

/// Everything the daemon built, returned so tests and the binary can both
/// drive it
pub struct Daemon {
  pub router: Arc<Router>,
  pub cache: Arc<TieredCache>,
  pub coordinator: Option<Arc<Coordinator>>,
  cleanup_tx: tokio::sync::broadcast::Sender<()>,
}

impl Daemon {
  /// Shut down background loops; idempotent
  pub fn shutdown(&self) {
    self.cache.shutdown();
    if let Some(ref coordinator) = self.coordinator {
      coordinator.shutdown();
    }
    let _ = self.cleanup_tx.send(());
  }
}

/// Expired temporary repositories are swept on this period
const REPO_CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Periodically delete temporary repositories past their cleanup window
fn spawn_repo_cleanup(
  store: Arc<Store>,
  mut shutdown_rx: tokio::sync::broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
  tokio::spawn(async move {
    let mut timer = tokio::time::interval(std::time::Duration::from_secs(REPO_CLEANUP_INTERVAL_SECS));
    timer.tick().await;

    loop {
      tokio::select! {
        _ = timer.tick() => {
          let store = Arc::clone(&store);
          let removed = tokio::task::spawn_blocking(move || {
            store.cleanup_expired_repositories(chrono::Utc::now())
          })
          .await;

          match removed {
            Ok(Ok(ids)) if !ids.is_empty() => info!(count = ids.len(), "Expired repositories cleaned up"),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Repository cleanup failed: {e}"),
            Err(e) => warn!("Repository cleanup task failed: {e}"),
          }
        }
        _ = shutdown_rx.recv() => break,
      }
    }
  })
}

/// Build the full component stack for a workspace
pub async fn build_router(config: &Config, workspace_root: PathBuf) -> Result<Daemon, LifecycleError> {
  let data_dir = config.data_dir();

  // One database per repository, named by the deterministic identifier;
  // discovery may find an index built elsewhere
  let identifier = repo_identifier_for_path(&workspace_root);
  let db_path = discover_index(
    &data_dir,
    &identifier,
    &config.index.index_paths,
    config.index.multi_path_discovery,
  )
  .unwrap_or_else(|| db_path_for(&data_dir, &identifier));

  let store = {
    let db_path = db_path.clone();
    tokio::task::spawn_blocking(move || Store::open(&db_path))
      .await
      .map_err(|e| LifecycleError::Startup(e.to_string()))?
      .map_err(|e| LifecycleError::Startup(e.to_string()))?
  };
  let store = Arc::new(store);
  info!(db = %db_path.display(), "Index store ready");

  let registry = if config.dispatcher.use_simple_dispatcher {
    info!("Simple dispatcher requested; plugins disabled");
    Arc::new(PluginRegistry::new())
  } else {
    Arc::new(PluginRegistry::with_factory(treesitter_factory()))
  };

  let cache = Arc::new(
    TieredCache::from_config(&config.cache, &data_dir)
      .await
      .map_err(|e| LifecycleError::Startup(e.to_string()))?,
  );
  let _ = cache.spawn_maintenance();
  let query_cache = Arc::new(QueryCache::new(Arc::clone(&cache)));

  let mut dispatcher = Dispatcher::new(
    store,
    registry,
    config.dispatcher.clone(),
    workspace_root,
  )
  .await
  .map_err(|e| LifecycleError::Startup(e.to_string()))?
  .with_cache(query_cache);

  if !config.index.authorized_reference_repos.is_empty() {
    let manager = MultiRepoManager::new(&config.index, data_dir);
    dispatcher = dispatcher.with_multi_repo(Arc::new(manager));
  }

  // Redis enables the distributed coordinator; without it, direct
  // indexing through the dispatcher is the only path
  let coordinator = match config.cache.redis_url.as_deref() {
    Some(url) => match Coordinator::connect(url, config.coordinator.clone()).await {
      Ok(coordinator) => {
        let coordinator = Arc::new(coordinator);
        let _ = coordinator.spawn_monitor();
        info!("Distributed coordinator connected");
        Some(coordinator)
      }
      Err(e) => {
        warn!("Distributed coordinator unavailable: {e}");
        None
      }
    },
    None => None,
  };

  let dispatcher = Arc::new(dispatcher);

  let (cleanup_tx, cleanup_rx) = tokio::sync::broadcast::channel(1);
  let _ = spawn_repo_cleanup(Arc::clone(dispatcher.store()), cleanup_rx);

  let tools = Arc::new(ToolHandler::new(dispatcher, coordinator.clone(), config.debug));

  Ok(Daemon {
    router: Arc::new(Router::new(tools)),
    cache,
    coordinator,
    cleanup_tx,
  })
}

/// Run the daemon until stdin closes, a shutdown RPC arrives, or SIGTERM
pub async fn run(config: Config) -> Result<(), LifecycleError> {
  let workspace_root = std::env::current_dir()?;
  let daemon = build_router(&config, workspace_root).await?;

  let server = Server::new(Arc::clone(&daemon.router));
  let shutdown = server.shutdown_handle();
  daemon.router.set_shutdown_handle(shutdown.clone()).await;

  let signal_shutdown = shutdown.clone();
  tokio::spawn(async move {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(s) => s,
      Err(e) => {
        warn!("SIGTERM handler unavailable: {e}");
        return;
      }
    };

    tokio::select! {
      _ = sigterm.recv() => {
        info!("SIGTERM received");
        signal_shutdown.shutdown();
      }
      _ = tokio::signal::ctrl_c() => {
        info!("Interrupt received");
        signal_shutdown.shutdown();
      }
    }
  });

  let result = server.run();
  result.await?;

  daemon.shutdown();
  info!("Daemon stopped");
  Ok(())
}
