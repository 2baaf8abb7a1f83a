//! Indexing worker: polls the priority queues, processes each job's files
//! through the appropriate plugin into the store, publishes results and
//! heartbeats, and backs off when the queue is unreachable.

use crate::error::DistribResult;
use crate::models::{
  IndexingJob, JobResult, JobStatus, WorkerState, WorkerStatus, WorkerSymbol, epoch_now,
};
use crate::queue::JobQueue;
use codescope_core::{CoordinatorConfig, Language};
use plugins::PluginRegistry;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use store::Store;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Idle delay between queue polls
const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Backoff ceiling when the queue is unreachable
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Outcome of processing one job's files
#[derive(Debug, Default)]
pub struct ProcessStats {
  pub files_processed: u64,
  pub files_failed: u64,
  pub symbols: Vec<WorkerSymbol>,
}

/// Process every file in a job: plugin extraction plus store commit.
/// Unreadable files and unknown languages are counted, not fatal.
pub async fn process_job_files(
  store: &Arc<Store>,
  registry: &Arc<PluginRegistry>,
  job: &IndexingJob,
) -> DistribResult<ProcessStats> {
  let repo_path = job.repo_path.clone();
  let repo_id = {
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || {
      let name = Path::new(&repo_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repository".to_string());
      store.create_repository(&repo_path, &name, &codescope_core::RepoMetadata::default())
    })
    .await
    .map_err(|e| crate::error::DistribError::Unavailable(format!("store task: {e}")))?
    .map_err(|e| crate::error::DistribError::Unavailable(e.to_string()))?
  };

  let mut stats = ProcessStats::default();

  for file in &job.files {
    match process_one_file(store, registry, repo_id, &job.repo_path, file).await {
      Ok(mut symbols) => {
        stats.files_processed += 1;
        stats.symbols.append(&mut symbols);
      }
      Err(e) => {
        warn!(file, "File processing failed: {e}");
        stats.files_failed += 1;
      }
    }
  }

  Ok(stats)
}

async fn process_one_file(
  store: &Arc<Store>,
  registry: &Arc<PluginRegistry>,
  repo_id: i64,
  repo_path: &str,
  file: &str,
) -> DistribResult<Vec<WorkerSymbol>> {
  let content = tokio::fs::read_to_string(file).await?;
  let language = Language::from_path(file);

  let store = Arc::clone(store);
  let registry = Arc::clone(registry);
  let owned_file = file.to_string();
  let owned_repo = repo_path.to_string();

  let symbols = tokio::task::spawn_blocking(move || -> DistribResult<Vec<WorkerSymbol>> {
    let shard_symbols = match language {
      Some(lang) => match registry.load(lang) {
        Ok(plugin) => {
          let mut guard = plugin.lock().unwrap_or_else(|p| p.into_inner());
          match guard.index_file(&owned_file, &content) {
            Ok(shard) => shard.symbols,
            Err(e) => {
              debug!(file = owned_file, "Extraction failed, indexing text only: {e}");
              Vec::new()
            }
          }
        }
        Err(_) => Vec::new(),
      },
      None => Vec::new(),
    };

    let rel_path = Path::new(&owned_file)
      .strip_prefix(&owned_repo)
      .map(|p| p.to_string_lossy().into_owned())
      .unwrap_or_else(|_| owned_file.clone());

    store
      .upsert_file(repo_id, &owned_file, &rel_path, &content, language, &shard_symbols, false)
      .map_err(|e| crate::error::DistribError::Unavailable(e.to_string()))?;

    Ok(
      shard_symbols
        .into_iter()
        .map(|s| WorkerSymbol {
          file: owned_file.clone(),
          name: s.name,
          kind: s.kind,
          line: s.line_start,
        })
        .collect(),
    )
  })
  .await
  .map_err(|e| crate::error::DistribError::Unavailable(format!("processing task: {e}")))??;

  Ok(symbols)
}

pub struct Worker {
  id: String,
  queue: JobQueue,
  registry: Arc<PluginRegistry>,
  store: Arc<Store>,
  config: CoordinatorConfig,
  status: Mutex<WorkerStatus>,
  shutdown_tx: broadcast::Sender<()>,
}

impl Worker {
  pub fn new(
    id: &str,
    queue: JobQueue,
    registry: Arc<PluginRegistry>,
    store: Arc<Store>,
    config: CoordinatorConfig,
  ) -> Self {
    let (shutdown_tx, _) = broadcast::channel(1);
    Self {
      id: id.to_string(),
      queue,
      registry,
      store,
      config,
      status: Mutex::new(WorkerStatus::new(id)),
      shutdown_tx,
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn status(&self) -> WorkerStatus {
    self.status.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }

  fn update_status(&self, f: impl FnOnce(&mut WorkerStatus)) -> WorkerStatus {
    let mut status = self.status.lock().unwrap_or_else(|p| p.into_inner());
    f(&mut status);
    status.last_heartbeat = epoch_now();
    status.clone()
  }

  /// Signal the run loop and heartbeat task to stop; idempotent
  pub fn shutdown(&self) {
    let _ = self.shutdown_tx.send(());
  }

  /// Run until shutdown: heartbeats in the background, jobs in priority
  /// order in the foreground, exponential backoff when Redis is away
  pub async fn run(self: Arc<Self>) {
    let heartbeat = self.spawn_heartbeat();
    let mut shutdown_rx = self.shutdown_tx.subscribe();
    let mut backoff = POLL_INTERVAL;

    info!(worker_id = self.id, "Worker started");

    loop {
      tokio::select! {
        _ = shutdown_rx.recv() => {
          debug!(worker_id = self.id, "Worker received shutdown signal");
          break;
        }
        popped = self.queue.pop_any_job() => {
          match popped {
            Ok(Some(job)) => {
              backoff = POLL_INTERVAL;
              self.handle_job(job).await;
            }
            Ok(None) => {
              tokio::time::sleep(POLL_INTERVAL).await;
            }
            Err(e) => {
              warn!(worker_id = self.id, "Queue unavailable, backing off {backoff:?}: {e}");
              tokio::time::sleep(backoff).await;
              backoff = (backoff * 2).min(MAX_BACKOFF);
            }
          }
        }
      }
    }

    let final_status = self.update_status(|s| s.state = WorkerState::Offline);
    let _ = self.queue.publish_worker_status(&final_status).await;
    heartbeat.abort();
    info!(worker_id = self.id, "Worker stopped");
  }

  async fn handle_job(&self, mut job: IndexingJob) {
    let started = epoch_now();
    job.worker_id = Some(self.id.clone());
    job.status = JobStatus::Processing;
    job.assigned_at = Some(started);
    job.started_at = Some(started);

    let status = self.update_status(|s| {
      s.state = WorkerState::Busy;
      s.current_job_id = Some(job.job_id.clone());
    });
    let _ = self.queue.publish_worker_status(&status).await;

    debug!(worker_id = self.id, job_id = job.job_id, files = job.file_count(), "Processing job");

    let result = match process_job_files(&self.store, &self.registry, &job).await {
      Ok(stats) => {
        self.update_status(|s| {
          s.jobs_completed += 1;
          s.total_files_processed += stats.files_processed;
          s.total_symbols_found += stats.symbols.len() as u64;
        });

        JobResult {
          job_id: job.job_id.clone(),
          worker_id: self.id.clone(),
          status: JobStatus::Completed,
          files_processed: stats.files_processed,
          symbols_found: stats.symbols.len() as u64,
          processing_time: epoch_now() - started,
          error_message: None,
          symbols: stats.symbols,
          completed_at: epoch_now(),
        }
      }
      Err(e) => {
        self.update_status(|s| {
          s.jobs_failed += 1;
          s.state = WorkerState::Error;
          s.error_message = Some(e.to_string());
        });

        JobResult {
          job_id: job.job_id.clone(),
          worker_id: self.id.clone(),
          status: JobStatus::Failed,
          files_processed: 0,
          symbols_found: 0,
          processing_time: epoch_now() - started,
          error_message: Some(e.to_string()),
          symbols: Vec::new(),
          completed_at: epoch_now(),
        }
      }
    };

    if let Err(e) = self.queue.push_result(job.priority, &result).await {
      warn!(worker_id = self.id, job_id = job.job_id, "Failed to publish result: {e}");
    }

    let status = self.update_status(|s| {
      if s.state == WorkerState::Busy {
        s.state = WorkerState::Idle;
      }
      s.current_job_id = None;
    });
    let _ = self.queue.publish_worker_status(&status).await;
  }

  fn spawn_heartbeat(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
    let worker = Arc::clone(self);
    let mut shutdown_rx = self.shutdown_tx.subscribe();
    let period = Duration::from_secs(self.config.heartbeat_interval_secs);

    tokio::spawn(async move {
      let mut timer = tokio::time::interval(period);

      loop {
        tokio::select! {
          _ = timer.tick() => {
            let status = worker.update_status(|_| {});
            if let Err(e) = worker.queue.publish_worker_status(&status).await {
              debug!(worker_id = worker.id, "Heartbeat publish failed: {e}");
            }
          }
          _ = shutdown_rx.recv() => break,
        }
      }
    })
  }
}
