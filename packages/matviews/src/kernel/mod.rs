//! Orchestration kernel - jobs that wrap the DDL services with run
//! bookkeeping, and the backend-agnostic enqueue adapter.

pub mod job_queue;
pub mod jobs;

pub use job_queue::{perform_now, JobKind, JobPayload, JobQueue, QueuedJob};
pub use jobs::{CreateViewJob, DeleteViewJob, JobOptions, RefreshViewJob};
