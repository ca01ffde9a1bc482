//! Enqueue adapter - routes a job-kind-plus-arguments tuple to the
//! configured task runtime.
//!
//! The backend set is closed: a durable Postgres queue table, a NATS
//! subject, or inline in-process execution. The backend is chosen once at
//! construction from configuration and never auto-detected per call.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;

use crate::common::{DefinitionId, JobId, MatViewError, ServiceResponse};
use crate::config::{Config, JobBackendKind};
use crate::domains::matviews::services::Services;
use crate::kernel::jobs::{CreateViewJob, DeleteViewJob, JobOptions, RefreshViewJob};

/// The closed set of orchestration job kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Create,
    Refresh,
    Delete,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Create => write!(f, "create"),
            JobKind::Refresh => write!(f, "refresh"),
            JobKind::Delete => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "create" => Ok(JobKind::Create),
            "refresh" => Ok(JobKind::Refresh),
            "delete" => Ok(JobKind::Delete),
            _ => Err(anyhow::anyhow!("Invalid job kind: {}", s)),
        }
    }
}

/// The wire form of one enqueued job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub id: JobId,
    pub kind: JobKind,
    pub definition_id: DefinitionId,
    #[serde(default)]
    pub options: JobOptions,
}

/// A row in the durable `mat_view_jobs` queue table, drained by an
/// external worker.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueuedJob {
    pub id: JobId,
    pub queue: String,
    pub job_kind: String,
    pub args: serde_json::Value,
    pub status: String,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedJob {
    async fn insert(payload: &JobPayload, queue: &str, pool: &PgPool) -> Result<Self, MatViewError> {
        let args = json!({
            "definition_id": payload.definition_id,
            "options": payload.options,
        });

        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO mat_view_jobs (id, queue, job_kind, args, status, enqueued_at)
            VALUES ($1, $2, $3, $4, 'pending', NOW())
            RETURNING *
            "#,
        )
        .bind(payload.id)
        .bind(queue)
        .bind(payload.kind.to_string())
        .bind(args)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Pending jobs on a queue, oldest first.
    pub async fn find_pending(queue: &str, pool: &PgPool) -> Result<Vec<Self>, MatViewError> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM mat_view_jobs
            WHERE queue = $1 AND status = 'pending'
            ORDER BY enqueued_at
            "#,
        )
        .bind(queue)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}

/// The configured enqueue backend.
#[derive(Debug)]
pub enum JobQueue {
    Postgres(PgPool),
    Nats(async_nats::Client),
    Inline(Services),
}

impl JobQueue {
    /// Build the adapter for the configured backend. Fails fast when the
    /// backend's own requirements are missing (e.g. NATS without a URL).
    pub async fn from_config(config: &Config, pool: PgPool) -> Result<Self, MatViewError> {
        match config.job_backend {
            JobBackendKind::Postgres => Ok(JobQueue::Postgres(pool)),
            JobBackendKind::Inline => Ok(JobQueue::Inline(Services::with_schema(
                pool,
                config.schema.clone(),
            ))),
            JobBackendKind::Nats => {
                let url = config.nats_url.as_deref().ok_or_else(|| {
                    MatViewError::BackendNotConfigured("NATS_URL is not set".to_string())
                })?;
                let client = async_nats::connect(url)
                    .await
                    .map_err(|e| anyhow::Error::new(e).context("Failed to connect to NATS"))?;
                Ok(JobQueue::Nats(client))
            }
        }
    }

    /// Route one job to the configured backend and return its id.
    ///
    /// The Postgres and NATS backends hand the payload off for a worker to
    /// pick up later; the inline backend performs it immediately and
    /// propagates any job error.
    pub async fn enqueue(
        &self,
        kind: JobKind,
        queue: &str,
        definition_id: DefinitionId,
        options: JobOptions,
    ) -> Result<JobId, MatViewError> {
        let payload = JobPayload {
            id: JobId::new(),
            kind,
            definition_id,
            options,
        };

        tracing::debug!(job_id = %payload.id, kind = %kind, queue, "Enqueueing job");

        match self {
            JobQueue::Postgres(pool) => {
                QueuedJob::insert(&payload, queue, pool).await?;
            }
            JobQueue::Nats(client) => {
                let subject = format!("matviews.jobs.{}", queue);
                let body = serde_json::to_vec(&payload)
                    .context("Failed to serialize job payload")
                    .map_err(MatViewError::Internal)?;
                client
                    .publish(subject, bytes::Bytes::from(body))
                    .await
                    .map_err(|e| anyhow::Error::new(e).context("Failed to publish job to NATS"))?;
            }
            JobQueue::Inline(services) => {
                perform_now(services, &payload).await?;
            }
        }

        Ok(payload.id)
    }
}

/// Invoke the matching orchestration job for a payload.
///
/// Used by the inline backend and by workers draining the Postgres queue
/// or a NATS subscription.
pub async fn perform_now(
    services: &Services,
    payload: &JobPayload,
) -> Result<ServiceResponse, MatViewError> {
    match payload.kind {
        JobKind::Create => {
            CreateViewJob::perform(services, payload.definition_id, payload.options.clone()).await
        }
        JobKind::Refresh => {
            RefreshViewJob::perform(services, payload.definition_id, payload.options.clone()).await
        }
        JobKind::Delete => {
            DeleteViewJob::perform(services, payload.definition_id, payload.options.clone()).await
        }
    }
}
