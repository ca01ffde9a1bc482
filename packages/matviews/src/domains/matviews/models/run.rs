use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use crate::common::{DefinitionId, EnvelopeError, MatViewError, RunId};

/// Which lifecycle mutation a run recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum RunOperation {
    Create = 0,
    Refresh = 1,
    Drop = 2,
}

impl RunOperation {
    pub fn code(&self) -> i16 {
        *self as i16
    }

    pub fn from_code(code: i16) -> Result<Self, MatViewError> {
        match code {
            0 => Ok(RunOperation::Create),
            1 => Ok(RunOperation::Refresh),
            2 => Ok(RunOperation::Drop),
            _ => Err(MatViewError::UnknownCode {
                field: "operation",
                code,
            }),
        }
    }
}

impl std::fmt::Display for RunOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOperation::Create => write!(f, "create"),
            RunOperation::Refresh => write!(f, "refresh"),
            RunOperation::Drop => write!(f, "drop"),
        }
    }
}

/// Run state machine: `pending → running → {success | failed}`, terminal
/// states immutable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending = 0,
    Running = 1,
    Success = 2,
    Failed = 3,
}

impl RunStatus {
    pub fn code(&self) -> i16 {
        *self as i16
    }

    pub fn from_code(code: i16) -> Result<Self, MatViewError> {
        match code {
            0 => Ok(RunStatus::Pending),
            1 => Ok(RunStatus::Running),
            2 => Ok(RunStatus::Success),
            3 => Ok(RunStatus::Failed),
            _ => Err(MatViewError::UnknownCode {
                field: "status",
                code,
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One recorded attempt to mutate a physical view.
///
/// `finished_at` and `duration_ms` are set iff the status is terminal;
/// `error` is non-null only on failure. Runs are never deleted by the core -
/// retention is an external concern, so `definition_id` carries no foreign
/// key and runs outlive their definition.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MatViewRun {
    pub id: RunId,
    pub definition_id: DefinitionId,
    pub operation: RunOperation,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error: Option<Value>,
    /// Request parameters and response payload of the service call.
    pub meta: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatViewRun {
    /// Open a run in `running` state at the start of a job invocation.
    pub async fn start(
        definition_id: DefinitionId,
        operation: RunOperation,
        pool: &PgPool,
    ) -> Result<Self, MatViewError> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO mat_view_runs (id, definition_id, operation, status, started_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING *
            "#,
        )
        .bind(RunId::new())
        .bind(definition_id)
        .bind(operation)
        .bind(RunStatus::Running)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Finalize as `success`. The `status = running` guard makes the
    /// transition happen exactly once; a second attempt is an error.
    pub async fn finish_success(
        id: RunId,
        duration_ms: i64,
        meta: Value,
        pool: &PgPool,
    ) -> Result<Self, MatViewError> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE mat_view_runs
            SET status = $2, finished_at = NOW(), duration_ms = $3, meta = $4, updated_at = NOW()
            WHERE id = $1 AND status = $5
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(RunStatus::Success)
        .bind(duration_ms)
        .bind(meta)
        .bind(RunStatus::Running)
        .fetch_optional(pool)
        .await?
        .ok_or(MatViewError::RunAlreadyFinalized(id))
    }

    /// Finalize as `failed` with structured error detail.
    pub async fn finish_failed(
        id: RunId,
        duration_ms: i64,
        error: &EnvelopeError,
        meta: Option<Value>,
        pool: &PgPool,
    ) -> Result<Self, MatViewError> {
        let error_json =
            serde_json::to_value(error).map_err(|e| MatViewError::Internal(e.into()))?;

        sqlx::query_as::<_, Self>(
            r#"
            UPDATE mat_view_runs
            SET status = $2, finished_at = NOW(), duration_ms = $3, error = $4, meta = $5,
                updated_at = NOW()
            WHERE id = $1 AND status = $6
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(RunStatus::Failed)
        .bind(duration_ms)
        .bind(error_json)
        .bind(meta)
        .bind(RunStatus::Running)
        .fetch_optional(pool)
        .await?
        .ok_or(MatViewError::RunAlreadyFinalized(id))
    }

    pub async fn find_by_id(id: RunId, pool: &PgPool) -> Result<Self, MatViewError> {
        sqlx::query_as::<_, Self>("SELECT * FROM mat_view_runs WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }

    /// Full run history for a definition, newest first.
    pub async fn find_for_definition(
        definition_id: DefinitionId,
        pool: &PgPool,
    ) -> Result<Vec<Self>, MatViewError> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM mat_view_runs WHERE definition_id = $1 ORDER BY started_at DESC",
        )
        .bind(definition_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_latest_for(
        definition_id: DefinitionId,
        pool: &PgPool,
    ) -> Result<Option<Self>, MatViewError> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM mat_view_runs
            WHERE definition_id = $1
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(definition_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping_is_total() {
        for status in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Success,
            RunStatus::Failed,
        ] {
            assert_eq!(RunStatus::from_code(status.code()).unwrap(), status);
        }
    }

    #[test]
    fn operation_code_mapping_is_total() {
        for op in [RunOperation::Create, RunOperation::Refresh, RunOperation::Drop] {
            assert_eq!(RunOperation::from_code(op.code()).unwrap(), op);
        }
    }

    #[test]
    fn unknown_codes_are_corruption_errors() {
        assert!(matches!(
            RunStatus::from_code(9),
            Err(MatViewError::UnknownCode { field: "status", code: 9 })
        ));
        assert!(matches!(
            RunOperation::from_code(-1),
            Err(MatViewError::UnknownCode { field: "operation", code: -1 })
        ));
    }

    #[test]
    fn only_success_and_failed_are_terminal() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }
}
