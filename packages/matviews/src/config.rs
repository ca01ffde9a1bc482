use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;

/// Which task runtime receives enqueued jobs.
///
/// The set is closed and explicit; the backend is selected once from
/// configuration and never auto-detected per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobBackendKind {
    /// Durable queue table drained by an external worker.
    Postgres,
    /// Publish job payloads to a NATS subject.
    Nats,
    /// Perform the job immediately in-process (dev/test).
    Inline,
}

impl std::fmt::Display for JobBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobBackendKind::Postgres => write!(f, "postgres"),
            JobBackendKind::Nats => write!(f, "nats"),
            JobBackendKind::Inline => write!(f, "inline"),
        }
    }
}

impl std::str::FromStr for JobBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "postgres" => Ok(JobBackendKind::Postgres),
            "nats" => Ok(JobBackendKind::Nats),
            "inline" => Ok(JobBackendKind::Inline),
            _ => Err(anyhow::anyhow!(
                "Invalid job backend: {} (expected postgres, nats, or inline)",
                s
            )),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Schema the managed views live in.
    pub schema: String,
    pub job_backend: JobBackendKind,
    /// Queue name jobs are enqueued onto.
    pub job_queue: String,
    pub nats_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Fails fast when `MATVIEWS_JOB_BACKEND` is unset or unknown — the
    /// enqueue adapter never guesses a task runtime.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let job_backend: JobBackendKind = env::var("MATVIEWS_JOB_BACKEND")
            .context("MATVIEWS_JOB_BACKEND must be set (postgres, nats, or inline)")?
            .parse()?;

        let nats_url = env::var("NATS_URL").ok();
        if job_backend == JobBackendKind::Nats && nats_url.is_none() {
            bail!("NATS_URL must be set when MATVIEWS_JOB_BACKEND=nats");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            schema: env::var("MATVIEWS_SCHEMA").unwrap_or_else(|_| "public".to_string()),
            job_backend,
            job_queue: env::var("MATVIEWS_JOB_QUEUE").unwrap_or_else(|_| "mat_views".to_string()),
            nats_url,
        })
    }
}
