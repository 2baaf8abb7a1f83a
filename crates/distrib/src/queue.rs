//! Redis queue plumbing.
//!
//! Key layout: `jobs:{priority}` and `results:{priority}` lists, plus
//! `worker:{id}` status strings with a TTL so stale workers disappear.

use crate::error::DistribResult;
use crate::models::{IndexingJob, JobPriority, JobResult, WorkerStatus};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, warn};

/// Worker status keys expire after this many seconds without a heartbeat
const WORKER_STATUS_TTL_SECS: u64 = 30;

#[derive(Clone)]
pub struct JobQueue {
  manager: ConnectionManager,
}

impl JobQueue {
  pub async fn connect(url: &str) -> DistribResult<Self> {
    let client = redis::Client::open(url)?;
    let manager = client.get_connection_manager().await?;
    debug!(url, "Job queue connected");
    Ok(Self { manager })
  }

  fn jobs_key(priority: JobPriority) -> String {
    format!("jobs:{}", priority.as_str())
  }

  fn results_key(priority: JobPriority) -> String {
    format!("results:{}", priority.as_str())
  }

  fn worker_key(worker_id: &str) -> String {
    format!("worker:{worker_id}")
  }

  /// Enqueue a job onto its priority list
  pub async fn push_job(&self, job: &IndexingJob) -> DistribResult<()> {
    let mut conn = self.manager.clone();
    let payload = serde_json::to_string(job)?;
    let _: () = conn.lpush(Self::jobs_key(job.priority), payload).await?;
    Ok(())
  }

  /// Non-blocking pop from one priority queue
  pub async fn pop_job(&self, priority: JobPriority) -> DistribResult<Option<IndexingJob>> {
    let mut conn = self.manager.clone();
    let raw: Option<String> = conn.rpop(Self::jobs_key(priority), None).await?;

    match raw {
      Some(payload) => match serde_json::from_str(&payload) {
        Ok(job) => Ok(Some(job)),
        Err(e) => {
          warn!(priority = priority.as_str(), "Dropping undecodable job payload: {e}");
          Ok(None)
        }
      },
      None => Ok(None),
    }
  }

  /// Pop the highest-priority available job
  pub async fn pop_any_job(&self) -> DistribResult<Option<IndexingJob>> {
    for priority in JobPriority::POLL_ORDER {
      if let Some(job) = self.pop_job(priority).await? {
        return Ok(Some(job));
      }
    }
    Ok(None)
  }

  pub async fn push_result(&self, priority: JobPriority, result: &JobResult) -> DistribResult<()> {
    let mut conn = self.manager.clone();
    let payload = serde_json::to_string(result)?;
    let _: () = conn.lpush(Self::results_key(priority), payload).await?;
    Ok(())
  }

  /// Drain every queued result for one priority
  pub async fn drain_results(&self, priority: JobPriority) -> DistribResult<Vec<JobResult>> {
    let mut conn = self.manager.clone();
    let mut results = Vec::new();

    loop {
      let raw: Option<String> = conn.rpop(Self::results_key(priority), None).await?;
      let Some(payload) = raw else {
        break;
      };
      match serde_json::from_str(&payload) {
        Ok(result) => results.push(result),
        Err(e) => warn!(priority = priority.as_str(), "Dropping undecodable result payload: {e}"),
      }
    }

    Ok(results)
  }

  /// Publish a worker status with the stale-worker TTL
  pub async fn publish_worker_status(&self, status: &WorkerStatus) -> DistribResult<()> {
    let mut conn = self.manager.clone();
    let payload = serde_json::to_string(status)?;
    let _: () = conn
      .set_ex(Self::worker_key(&status.worker_id), payload, WORKER_STATUS_TTL_SECS)
      .await?;
    Ok(())
  }

  /// Read every live worker status key
  pub async fn read_worker_statuses(&self) -> DistribResult<Vec<WorkerStatus>> {
    let mut conn = self.manager.clone();
    let keys: Vec<String> = conn.keys("worker:*").await?;

    let mut statuses = Vec::new();
    for key in keys {
      let raw: Option<String> = conn.get(&key).await?;
      if let Some(payload) = raw {
        match serde_json::from_str(&payload) {
          Ok(status) => statuses.push(status),
          Err(e) => warn!(key, "Dropping undecodable worker status: {e}"),
        }
      }
    }

    Ok(statuses)
  }

  /// Remove every priority queue; returns how many queued jobs were dropped
  pub async fn clear_job_queues(&self) -> DistribResult<u64> {
    let mut conn = self.manager.clone();
    let mut dropped = 0u64;

    for priority in JobPriority::POLL_ORDER {
      let key = Self::jobs_key(priority);
      let len: u64 = conn.llen(&key).await?;
      dropped += len;
      let _: () = conn.del(&key).await?;
    }

    Ok(dropped)
  }

  pub async fn queue_lengths(&self) -> DistribResult<Vec<(JobPriority, u64)>> {
    let mut conn = self.manager.clone();
    let mut lengths = Vec::new();

    for priority in JobPriority::POLL_ORDER {
      let len: u64 = conn.llen(Self::jobs_key(priority)).await?;
      lengths.push((priority, len));
    }

    Ok(lengths)
  }
}
