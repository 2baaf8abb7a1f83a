//! Shared models for distributed indexing. These travel over Redis as JSON,
//! so every field keeps a stable wire shape; timestamps are epoch seconds.

use codescope_core::SymbolKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub(crate) fn epoch_now() -> f64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs_f64()
}

/// A worker is healthy while its heartbeat is younger than this
pub const WORKER_HEALTH_TIMEOUT_SECS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
  Pending,
  Assigned,
  Processing,
  Completed,
  Failed,
  Retrying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
  Low = 1,
  Normal = 2,
  High = 3,
  Urgent = 4,
}

impl JobPriority {
  pub fn as_str(&self) -> &'static str {
    match self {
      JobPriority::Low => "low",
      JobPriority::Normal => "normal",
      JobPriority::High => "high",
      JobPriority::Urgent => "urgent",
    }
  }

  /// Poll order for workers: highest priority first
  pub const POLL_ORDER: [JobPriority; 4] = [
    JobPriority::Urgent,
    JobPriority::High,
    JobPriority::Normal,
    JobPriority::Low,
  ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
  Idle,
  Busy,
  Offline,
  Error,
}

/// Known job metadata fields plus an extension map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobMetadata {
  pub total_bytes: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub size_bucket: Option<String>,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub extra: BTreeMap<String, String>,
}

/// A unit of distributed indexing work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingJob {
  pub job_id: String,
  pub repo_path: String,
  pub files: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub worker_id: Option<String>,
  pub status: JobStatus,
  pub priority: JobPriority,
  pub created_at: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub assigned_at: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub started_at: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<f64>,
  pub retry_count: u32,
  pub max_retries: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error_message: Option<String>,
  #[serde(default)]
  pub metadata: JobMetadata,
}

impl IndexingJob {
  pub fn new(repo_path: &str, files: Vec<String>, priority: JobPriority, max_retries: u32) -> Self {
    Self {
      job_id: Uuid::new_v4().to_string(),
      repo_path: repo_path.to_string(),
      files,
      worker_id: None,
      status: JobStatus::Pending,
      priority,
      created_at: epoch_now(),
      assigned_at: None,
      started_at: None,
      completed_at: None,
      retry_count: 0,
      max_retries,
      error_message: None,
      metadata: JobMetadata::default(),
    }
  }

  pub fn file_count(&self) -> usize {
    self.files.len()
  }

  pub fn processing_time(&self) -> Option<f64> {
    match (self.started_at, self.completed_at) {
      (Some(start), Some(end)) => Some(end - start),
      _ => None,
    }
  }

  /// Whether another retry attempt is allowed
  pub fn can_retry(&self) -> bool {
    self.retry_count < self.max_retries
  }

  /// Reset for re-enqueueing after a failure
  pub fn prepare_retry(&mut self) {
    self.retry_count += 1;
    self.status = JobStatus::Retrying;
    self.worker_id = None;
    self.assigned_at = None;
    self.started_at = None;
    self.completed_at = None;
  }
}

/// A symbol extracted by a worker, denormalized for aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSymbol {
  pub file: String,
  pub name: String,
  pub kind: SymbolKind,
  pub line: u32,
}

/// Result of one processed job, pushed to the per-priority result queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
  pub job_id: String,
  pub worker_id: String,
  pub status: JobStatus,
  pub files_processed: u64,
  pub symbols_found: u64,
  pub processing_time: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error_message: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub symbols: Vec<WorkerSymbol>,
  pub completed_at: f64,
}

impl JobResult {
  pub fn success(&self) -> bool {
    self.status == JobStatus::Completed
  }
}

/// Worker status, published to a keyed Redis slot with a TTL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
  pub worker_id: String,
  pub state: WorkerState,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub current_job_id: Option<String>,
  pub jobs_completed: u64,
  pub jobs_failed: u64,
  pub total_files_processed: u64,
  pub total_symbols_found: u64,
  pub last_heartbeat: f64,
  pub start_time: f64,
  pub cpu_usage: f64,
  pub memory_usage: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error_message: Option<String>,
}

impl WorkerStatus {
  pub fn new(worker_id: &str) -> Self {
    let now = epoch_now();
    Self {
      worker_id: worker_id.to_string(),
      state: WorkerState::Idle,
      current_job_id: None,
      jobs_completed: 0,
      jobs_failed: 0,
      total_files_processed: 0,
      total_symbols_found: 0,
      last_heartbeat: now,
      start_time: now,
      cpu_usage: 0.0,
      memory_usage: 0.0,
      error_message: None,
    }
  }

  pub fn uptime(&self, now: f64) -> f64 {
    now - self.start_time
  }

  pub fn is_healthy(&self, now: f64) -> bool {
    now - self.last_heartbeat < WORKER_HEALTH_TIMEOUT_SECS
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_job_serde_roundtrip_every_priority_and_state() {
    for priority in JobPriority::POLL_ORDER {
      for status in [
        JobStatus::Pending,
        JobStatus::Assigned,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Retrying,
      ] {
        let mut job = IndexingJob::new("/repo", vec!["/repo/a.py".into()], priority, 3);
        job.status = status;

        let json = serde_json::to_string(&job).unwrap();
        let back: IndexingJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
      }
    }
  }

  #[test]
  fn test_job_serde_empty_files() {
    let job = IndexingJob::new("/repo", Vec::new(), JobPriority::Normal, 3);
    let json = serde_json::to_string(&job).unwrap();
    let back: IndexingJob = serde_json::from_str(&json).unwrap();
    assert_eq!(back, job);
    assert_eq!(back.file_count(), 0);
  }

  #[test]
  fn test_priority_ordering_and_names() {
    assert!(JobPriority::Urgent > JobPriority::High);
    assert!(JobPriority::High > JobPriority::Normal);
    assert!(JobPriority::Normal > JobPriority::Low);
    assert_eq!(JobPriority::POLL_ORDER[0], JobPriority::Urgent);
    assert_eq!(JobPriority::Low.as_str(), "low");
  }

  #[test]
  fn test_retry_bookkeeping() {
    let mut job = IndexingJob::new("/repo", vec!["/repo/a.py".into()], JobPriority::Normal, 2);
    job.worker_id = Some("w1".into());
    job.status = JobStatus::Failed;

    assert!(job.can_retry());
    job.prepare_retry();
    assert_eq!(job.retry_count, 1);
    assert_eq!(job.status, JobStatus::Retrying);
    assert!(job.worker_id.is_none());

    job.status = JobStatus::Failed;
    job.prepare_retry();
    assert_eq!(job.retry_count, 2);
    assert!(!job.can_retry());
  }

  #[test]
  fn test_processing_time() {
    let mut job = IndexingJob::new("/repo", Vec::new(), JobPriority::Low, 3);
    assert!(job.processing_time().is_none());

    job.started_at = Some(100.0);
    job.completed_at = Some(107.5);
    assert_eq!(job.processing_time(), Some(7.5));
  }

  #[test]
  fn test_worker_health_threshold() {
    let mut status = WorkerStatus::new("w1");
    let now = status.last_heartbeat;

    assert!(status.is_healthy(now + 29.0));
    assert!(!status.is_healthy(now + 30.0));

    status.last_heartbeat = now + 60.0;
    assert!(status.is_healthy(now + 61.0));
  }

  #[test]
  fn test_job_result_roundtrip() {
    let result = JobResult {
      job_id: "j1".into(),
      worker_id: "w1".into(),
      status: JobStatus::Completed,
      files_processed: 10,
      symbols_found: 42,
      processing_time: 1.25,
      error_message: None,
      symbols: vec![WorkerSymbol {
        file: "/repo/a.py".into(),
        name: "Foo".into(),
        kind: SymbolKind::Class,
        line: 3,
      }],
      completed_at: epoch_now(),
    };

    let json = serde_json::to_string(&result).unwrap();
    let back: JobResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
    assert!(back.success());
  }
}
