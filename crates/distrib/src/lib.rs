//! Distributed bulk indexing: a Redis-queue-backed coordinator that batches
//! files into priority-ordered jobs, workers that process them and publish
//! heartbeats, and the shared job/worker/result models.

mod coordinator;
mod error;
mod models;
mod queue;
mod worker;

pub use coordinator::{Coordinator, JobEvent, JobTracker, ProgressSummary, ResultOutcome, plan_jobs};
pub use error::{DistribError, DistribResult};
pub use models::{IndexingJob, JobMetadata, JobPriority, JobResult, JobStatus, WorkerState, WorkerStatus, WorkerSymbol};
pub use queue::JobQueue;
pub use worker::{ProcessStats, Worker, process_job_files};
