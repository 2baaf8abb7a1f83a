//! The indexing coordinator: turns a repository tree into priority-ordered
//! jobs, tracks them through workers via the result queues, retries
//! failures, and publishes typed job events.

use crate::error::DistribResult;
use crate::models::{IndexingJob, JobMetadata, JobPriority, JobResult, JobStatus, WorkerStatus, epoch_now};
use crate::queue::JobQueue;
use codescope_core::{CoordinatorConfig, Language};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Directories never walked during job creation
const IGNORED_DIRS: &[&str] = &[
  ".git",
  ".hg",
  ".svn",
  "node_modules",
  "__pycache__",
  ".venv",
  "venv",
  "target",
  "build",
  "dist",
  ".cache",
];

const LARGE_FILE_BYTES: u64 = 100 * 1024;
const MEDIUM_FILE_BYTES: u64 = 10 * 1024;

/// Typed job-completion notifications; any number of consumers subscribe
#[derive(Debug, Clone)]
pub enum JobEvent {
  Completed(JobResult),
  Failed(IndexingJob),
  WorkerLost { worker_id: String, job_id: String },
}

/// Aggregated progress counters
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ProgressSummary {
  pub active_jobs: usize,
  pub completed_jobs: usize,
  pub failed_jobs: usize,
  pub files_processed: u64,
  pub symbols_found: u64,
  pub healthy_workers: usize,
  pub known_workers: usize,
}

/// Walk a repository and pack its indexable files into jobs.
///
/// Files are bucketed by size for observability, sorted size-descending so
/// large files start first, and packed into at most `2 × max_workers` jobs
/// of up to `batch_size` files each.
pub fn plan_jobs(repo_path: &Path, priority: JobPriority, config: &CoordinatorConfig) -> Vec<IndexingJob> {
  let mut walker = ignore::WalkBuilder::new(repo_path);
  walker
    .git_ignore(true)
    .git_global(true)
    .git_exclude(true)
    .hidden(true)
    .filter_entry(|entry| {
      let name = entry.file_name().to_string_lossy();
      !IGNORED_DIRS.contains(&name.as_ref())
    });

  let mut files: Vec<(String, u64)> = walker
    .build()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
    .filter_map(|entry| {
      let path = entry.path().to_string_lossy().into_owned();
      Language::from_path(&path)?;
      let size = entry.metadata().ok()?.len();
      Some((path, size))
    })
    .collect();

  if files.is_empty() {
    return Vec::new();
  }

  let (mut large, mut medium, mut small) = (0u64, 0u64, 0u64);
  for (_, size) in &files {
    match *size {
      s if s > LARGE_FILE_BYTES => large += 1,
      s if s > MEDIUM_FILE_BYTES => medium += 1,
      _ => small += 1,
    }
  }
  debug!(large, medium, small, total = files.len(), "File size buckets");

  // Large files first so they are not all stuck at the tail of one job
  files.sort_by(|a, b| b.1.cmp(&a.1));

  // Keep the queue shallow: no more jobs than twice the worker pool
  let max_jobs = (config.max_workers * 2).max(1);
  let batch_size = config.batch_size.max(files.len().div_ceil(max_jobs));

  let repo = repo_path.to_string_lossy();
  files
    .chunks(batch_size)
    .map(|chunk| {
      let total_bytes: u64 = chunk.iter().map(|(_, s)| s).sum();
      let mut job = IndexingJob::new(
        &repo,
        chunk.iter().map(|(p, _)| p.clone()).collect(),
        priority,
        config.max_retries,
      );
      job.metadata = JobMetadata {
        total_bytes,
        size_bucket: chunk.first().map(|(_, s)| bucket_name(*s).to_string()),
        ..JobMetadata::default()
      };
      job
    })
    .collect()
}

fn bucket_name(size: u64) -> &'static str {
  if size > LARGE_FILE_BYTES {
    "large"
  } else if size > MEDIUM_FILE_BYTES {
    "medium"
  } else {
    "small"
  }
}

/// The coordinator's three job maps and worker view.
///
/// A job is in exactly one of {active, completed, failed} at any time; all
/// transitions run on the monitor loop, so a plain mutex serializes them.
#[derive(Default)]
pub struct JobTracker {
  active: Mutex<HashMap<String, IndexingJob>>,
  completed: Mutex<HashMap<String, JobResult>>,
  failed: Mutex<HashMap<String, IndexingJob>>,
  workers: Mutex<HashMap<String, WorkerStatus>>,
}

impl JobTracker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn track(&self, job: IndexingJob) {
    let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
    active.insert(job.job_id.clone(), job);
  }

  /// Apply one worker result. Returns a job to re-enqueue when the failure
  /// is retryable; results for unknown (cancelled) jobs are discarded.
  pub fn apply_result(&self, result: JobResult) -> ResultOutcome {
    let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());

    let Some(mut job) = active.remove(&result.job_id) else {
      debug!(job_id = result.job_id, "Discarding result for unknown job");
      return ResultOutcome::Discarded;
    };

    if result.success() {
      job.status = JobStatus::Completed;
      let mut completed = self.completed.lock().unwrap_or_else(|p| p.into_inner());
      completed.insert(result.job_id.clone(), result.clone());
      return ResultOutcome::Completed(result);
    }

    job.error_message = result.error_message.clone();

    if job.can_retry() {
      job.prepare_retry();
      // Back into the active map once re-enqueued; caller owns the push
      ResultOutcome::Retry(job)
    } else {
      job.status = JobStatus::Failed;
      let mut failed = self.failed.lock().unwrap_or_else(|p| p.into_inner());
      failed.insert(job.job_id.clone(), job.clone());
      ResultOutcome::Failed(job)
    }
  }

  /// Update the worker view and collect jobs stranded on dead workers
  pub fn apply_worker_statuses(&self, statuses: Vec<WorkerStatus>, now: f64) -> Vec<IndexingJob> {
    {
      let mut workers = self.workers.lock().unwrap_or_else(|p| p.into_inner());
      for status in statuses {
        workers.insert(status.worker_id.clone(), status);
      }
    }

    let lost_workers: Vec<String> = {
      let workers = self.workers.lock().unwrap_or_else(|p| p.into_inner());
      workers
        .values()
        .filter(|w| !w.is_healthy(now))
        .map(|w| w.worker_id.clone())
        .collect()
    };

    if lost_workers.is_empty() {
      return Vec::new();
    }

    let mut stranded = Vec::new();
    let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
    let job_ids: Vec<String> = active
      .values()
      .filter(|j| j.worker_id.as_deref().is_some_and(|w| lost_workers.iter().any(|l| l == w)))
      .map(|j| j.job_id.clone())
      .collect();

    for job_id in job_ids {
      if let Some(mut job) = active.remove(&job_id) {
        job.error_message = Some("worker_lost".to_string());
        stranded.push(job);
      }
    }

    stranded
  }

  /// Fail every active job (cancellation); returns the failed jobs
  pub fn fail_all_active(&self, reason: &str) -> Vec<IndexingJob> {
    let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
    let mut failed = self.failed.lock().unwrap_or_else(|p| p.into_inner());

    let mut out = Vec::new();
    for (_, mut job) in active.drain() {
      job.status = JobStatus::Failed;
      job.error_message = Some(reason.to_string());
      failed.insert(job.job_id.clone(), job.clone());
      out.push(job);
    }
    out
  }

  /// Drop completed results older than `ttl_secs`
  pub fn purge_completed(&self, ttl_secs: u64, now: f64) -> usize {
    let mut completed = self.completed.lock().unwrap_or_else(|p| p.into_inner());
    let before = completed.len();
    completed.retain(|_, r| now - r.completed_at < ttl_secs as f64);
    before - completed.len()
  }

  pub fn progress(&self, now: f64) -> ProgressSummary {
    let active = self.active.lock().unwrap_or_else(|p| p.into_inner());
    let completed = self.completed.lock().unwrap_or_else(|p| p.into_inner());
    let failed = self.failed.lock().unwrap_or_else(|p| p.into_inner());
    let workers = self.workers.lock().unwrap_or_else(|p| p.into_inner());

    ProgressSummary {
      active_jobs: active.len(),
      completed_jobs: completed.len(),
      failed_jobs: failed.len(),
      files_processed: completed.values().map(|r| r.files_processed).sum(),
      symbols_found: completed.values().map(|r| r.symbols_found).sum(),
      healthy_workers: workers.values().filter(|w| w.is_healthy(now)).count(),
      known_workers: workers.len(),
    }
  }

  pub fn is_tracked(&self, job_id: &str) -> (bool, bool, bool) {
    let active = self.active.lock().unwrap_or_else(|p| p.into_inner());
    let completed = self.completed.lock().unwrap_or_else(|p| p.into_inner());
    let failed = self.failed.lock().unwrap_or_else(|p| p.into_inner());
    (
      active.contains_key(job_id),
      completed.contains_key(job_id),
      failed.contains_key(job_id),
    )
  }
}

/// What applying one result decided
#[derive(Debug)]
pub enum ResultOutcome {
  Completed(JobResult),
  Retry(IndexingJob),
  Failed(IndexingJob),
  Discarded,
}

pub struct Coordinator {
  queue: JobQueue,
  config: CoordinatorConfig,
  tracker: JobTracker,
  events_tx: broadcast::Sender<JobEvent>,
  shutdown_tx: broadcast::Sender<()>,
}

impl Coordinator {
  /// Connect to Redis. Without a reachable queue the coordinator refuses
  /// to exist; direct (non-distributed) indexing stays available upstream.
  pub async fn connect(redis_url: &str, config: CoordinatorConfig) -> DistribResult<Self> {
    let queue = JobQueue::connect(redis_url).await?;
    let (events_tx, _) = broadcast::channel(256);
    let (shutdown_tx, _) = broadcast::channel(1);

    Ok(Self {
      queue,
      config,
      tracker: JobTracker::new(),
      events_tx,
      shutdown_tx,
    })
  }

  pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
    self.events_tx.subscribe()
  }

  pub fn tracker(&self) -> &JobTracker {
    &self.tracker
  }

  pub fn progress(&self) -> ProgressSummary {
    self.tracker.progress(epoch_now())
  }

  /// Create and enqueue jobs for a repository; returns the job ids
  pub async fn submit(&self, repo_path: &Path, priority: JobPriority) -> DistribResult<Vec<String>> {
    let jobs = plan_jobs(repo_path, priority, &self.config);
    if jobs.is_empty() {
      return Ok(Vec::new());
    }

    let mut ids = Vec::with_capacity(jobs.len());
    for job in jobs {
      self.queue.push_job(&job).await?;
      ids.push(job.job_id.clone());
      self.tracker.track(job);
    }

    info!(repo = %repo_path.display(), jobs = ids.len(), priority = priority.as_str(), "Jobs submitted");
    Ok(ids)
  }

  /// One monitor pass: drain results, recompute worker health, retry
  /// retryable failures, purge aged results
  pub async fn monitor_tick(&self) -> DistribResult<()> {
    for priority in JobPriority::POLL_ORDER {
      for result in self.queue.drain_results(priority).await? {
        match self.tracker.apply_result(result) {
          ResultOutcome::Completed(result) => {
            debug!(job_id = result.job_id, files = result.files_processed, "Job completed");
            let _ = self.events_tx.send(JobEvent::Completed(result));
          }
          ResultOutcome::Retry(job) => {
            warn!(job_id = job.job_id, retry = job.retry_count, "Retrying failed job");
            self.queue.push_job(&job).await?;
            self.tracker.track(job);
          }
          ResultOutcome::Failed(job) => {
            warn!(job_id = job.job_id, "Job failed terminally");
            let _ = self.events_tx.send(JobEvent::Failed(job));
          }
          ResultOutcome::Discarded => {}
        }
      }
    }

    let now = epoch_now();
    let statuses = self.queue.read_worker_statuses().await?;
    for mut job in self.tracker.apply_worker_statuses(statuses, now) {
      let worker_id = job.worker_id.take().unwrap_or_default();
      let _ = self.events_tx.send(JobEvent::WorkerLost {
        worker_id,
        job_id: job.job_id.clone(),
      });

      if job.can_retry() {
        job.prepare_retry();
        self.queue.push_job(&job).await?;
        self.tracker.track(job);
      } else {
        job.status = JobStatus::Failed;
        let _ = self.events_tx.send(JobEvent::Failed(job));
      }
    }

    self.tracker.purge_completed(self.config.result_ttl_secs, now);
    Ok(())
  }

  /// Run the monitor loop until shutdown
  pub fn spawn_monitor(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
    let coordinator = Arc::clone(self);
    let mut shutdown_rx = self.shutdown_tx.subscribe();
    let period = std::time::Duration::from_secs(self.config.health_check_interval_secs);

    tokio::spawn(async move {
      let mut timer = interval(period);
      timer.tick().await;

      loop {
        tokio::select! {
          _ = timer.tick() => {
            if let Err(e) = coordinator.monitor_tick().await {
              warn!("Monitor tick failed: {e}");
            }
          }
          _ = shutdown_rx.recv() => {
            debug!("Coordinator monitor received shutdown signal");
            break;
          }
        }
      }
    })
  }

  /// Delete all priority queues and fail every active job with reason
  /// "cancelled". Late results for cancelled jobs are discarded by the
  /// monitor loop.
  pub async fn cancel_all_jobs(&self) -> DistribResult<usize> {
    let dropped = self.queue.clear_job_queues().await?;
    let failed = self.tracker.fail_all_active("cancelled");

    for job in &failed {
      let _ = self.events_tx.send(JobEvent::Failed(job.clone()));
    }

    info!(queued_dropped = dropped, active_failed = failed.len(), "All jobs cancelled");
    Ok(dropped as usize + failed.len())
  }

  /// Stop the monitor loop; idempotent
  pub fn shutdown(&self) {
    let _ = self.shutdown_tx.send(());
  }
}

impl Drop for Coordinator {
  fn drop(&mut self) {
    self.shutdown();
  }
}
