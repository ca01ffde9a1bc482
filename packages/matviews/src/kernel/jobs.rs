//! Orchestration jobs - the stable entry points a task runtime invokes.
//!
//! Each job binds a definition to its service and wraps the call with run
//! lifecycle bookkeeping: open a run, invoke the service, finalize the run
//! with timing and outcome. Exceptions are recorded on the run and then
//! re-raised so the hosting runtime's retry policy applies - the core
//! itself never retries.
//!
//! No per-definition mutual exclusion is provided: two jobs against the
//! same definition may run concurrently, and PostgreSQL's own locking
//! decides the outcome. Callers wanting at-most-one-operation-per-
//! definition need an external advisory lock.

use std::future::Future;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::common::{
    DefinitionId, EnvelopeError, MatViewError, RowCountStrategy, ServiceResponse,
};
use crate::domains::matviews::models::{
    MatViewDefinition, MatViewRun, RefreshStrategy, RunOperation,
};
use crate::domains::matviews::services::Services;

/// Strategy options recognized by the jobs. Unknown fields in a payload
/// are ignored; missing fields take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOptions {
    /// Create only: drop and rebuild an existing view.
    #[serde(default)]
    pub force: bool,
    /// Delete only: drop dependent objects too.
    #[serde(default)]
    pub cascade: bool,
    #[serde(default)]
    pub row_count_strategy: RowCountStrategy,
}

/// Shared lifecycle wrapper: `pending → running → {success | failed}`.
///
/// A missing definition id is fatal and unretried - it propagates
/// immediately and no run row is created.
async fn run_with_lifecycle<F, Fut>(
    services: &Services,
    definition_id: DefinitionId,
    operation: RunOperation,
    call: F,
) -> Result<ServiceResponse, MatViewError>
where
    F: FnOnce(MatViewDefinition) -> Fut,
    Fut: Future<Output = Result<ServiceResponse, MatViewError>>,
{
    let pool = services.pool();

    let definition = MatViewDefinition::find_by_id_optional(definition_id, pool)
        .await?
        .ok_or(MatViewError::DefinitionNotFound(definition_id))?;

    let run = MatViewRun::start(definition.id, operation, pool).await?;
    tracing::info!(
        run_id = %run.id,
        definition = %definition.name,
        operation = %operation,
        "Starting run"
    );
    let started = Instant::now();

    match call(definition).await {
        Ok(envelope) => {
            let duration_ms = started.elapsed().as_millis() as i64;
            let meta = json!({
                "request": envelope.request,
                "response": envelope.response,
            });
            if envelope.is_success() {
                MatViewRun::finish_success(run.id, duration_ms, meta, pool).await?;
                tracing::info!(run_id = %run.id, status = %envelope.status, duration_ms, "Run succeeded");
            } else {
                let error = envelope.error.clone().unwrap_or_else(|| {
                    EnvelopeError::new("service reported failure without detail", "unknown")
                });
                MatViewRun::finish_failed(run.id, duration_ms, &error, Some(meta), pool).await?;
                tracing::warn!(run_id = %run.id, duration_ms, error = %error.message, "Run failed");
            }
            Ok(envelope)
        }
        Err(err) => {
            let duration_ms = started.elapsed().as_millis() as i64;
            let error = EnvelopeError::from_error(&err);
            // Record the failure, then re-raise so the hosting task
            // runtime decides whether to retry. If the run row itself
            // cannot be written, that failure propagates instead - never
            // swallowed.
            if let Err(persist_err) =
                MatViewRun::finish_failed(run.id, duration_ms, &error, None, pool).await
            {
                tracing::error!(
                    run_id = %run.id,
                    error = %persist_err,
                    original = %err,
                    "Failed to persist failed run"
                );
                return Err(persist_err);
            }
            tracing::warn!(run_id = %run.id, error = %err, "Run failed with exception");
            Err(err)
        }
    }
}

/// Create the definition's view, recording a `create` run.
pub struct CreateViewJob;

impl CreateViewJob {
    pub async fn perform(
        services: &Services,
        definition_id: DefinitionId,
        options: JobOptions,
    ) -> Result<ServiceResponse, MatViewError> {
        run_with_lifecycle(services, definition_id, RunOperation::Create, |def| async move {
            services
                .create(&def, options.force, options.row_count_strategy)
                .await
        })
        .await
    }
}

/// Refresh the definition's view by its configured strategy, recording a
/// `refresh` run.
pub struct RefreshViewJob;

impl RefreshViewJob {
    pub async fn perform(
        services: &Services,
        definition_id: DefinitionId,
        options: JobOptions,
    ) -> Result<ServiceResponse, MatViewError> {
        run_with_lifecycle(services, definition_id, RunOperation::Refresh, |def| async move {
            // The one strategy switch: adding a strategy means one new
            // variant and one new arm here.
            match def.refresh_strategy {
                RefreshStrategy::Regular => {
                    services
                        .refresh_regular(&def, options.row_count_strategy)
                        .await
                }
                RefreshStrategy::Concurrent => {
                    services
                        .refresh_concurrent(&def, options.row_count_strategy)
                        .await
                }
                RefreshStrategy::Swap => {
                    services.refresh_swap(&def, options.row_count_strategy).await
                }
            }
        })
        .await
    }
}

/// Drop the definition's view, recording a `drop` run.
///
/// Always passes `if_exists = true` so the job is idempotent under retry.
pub struct DeleteViewJob;

impl DeleteViewJob {
    pub async fn perform(
        services: &Services,
        definition_id: DefinitionId,
        options: JobOptions,
    ) -> Result<ServiceResponse, MatViewError> {
        run_with_lifecycle(services, definition_id, RunOperation::Drop, |def| async move {
            services
                .delete(&def, options.cascade, true, options.row_count_strategy)
                .await
        })
        .await
    }
}
