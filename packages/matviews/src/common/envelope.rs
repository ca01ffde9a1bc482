//! Uniform result envelope returned by every DDL service call.
//!
//! An envelope is not persisted directly; the orchestration jobs fold it
//! into a run's terminal fields (`meta` and `error`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::MatViewError;

/// Symbolic outcome of a service call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Created,
    Skipped,
    Refreshed,
    Swapped,
    Dropped,
    Checked,
    Error,
}

impl ServiceStatus {
    /// Whether this status denotes a successful outcome.
    pub fn is_success(&self) -> bool {
        !matches!(self, ServiceStatus::Error)
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceStatus::Created => "created",
            ServiceStatus::Skipped => "skipped",
            ServiceStatus::Refreshed => "refreshed",
            ServiceStatus::Swapped => "swapped",
            ServiceStatus::Dropped => "dropped",
            ServiceStatus::Checked => "checked",
            ServiceStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Structured error detail carried by failed envelopes and failed runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvelopeError {
    pub message: String,
    /// Symbolic error class; database errors carry their SQLSTATE as
    /// `sqlstate_XXXXX`.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl EnvelopeError {
    pub fn new(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
            trace: None,
        }
    }

    /// Build from a database error, preserving the SQLSTATE when present.
    ///
    /// PostgreSQL puts the useful specifics (which object depends on the
    /// view, how to get a unique index) in the detail and hint fields, so
    /// those are folded into the message for the audit trail.
    pub fn from_db(err: &sqlx::Error) -> Self {
        let kind = match err {
            sqlx::Error::Database(db) => db
                .code()
                .map(|c| format!("sqlstate_{}", c))
                .unwrap_or_else(|| "database".to_string()),
            sqlx::Error::RowNotFound => "row_not_found".to_string(),
            sqlx::Error::PoolTimedOut => "pool_timeout".to_string(),
            sqlx::Error::Io(_) => "io".to_string(),
            _ => "database".to_string(),
        };

        let message = match err {
            sqlx::Error::Database(db) => {
                let mut message = db.message().to_string();
                if let Some(pg) = db.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
                    if let Some(detail) = pg.detail() {
                        message = format!("{} ({})", message, detail);
                    }
                    if let Some(hint) = pg.hint() {
                        message = format!("{} (hint: {})", message, hint);
                    }
                }
                message
            }
            _ => err.to_string(),
        };

        Self::new(message, kind)
    }

    /// Serialize a crate error for a failed run, capturing a backtrace so
    /// the run row is auditable on its own.
    pub fn from_error(err: &MatViewError) -> Self {
        let kind = match err {
            MatViewError::InvalidDefinition(_) => "invalid_definition".to_string(),
            MatViewError::DefinitionNotFound(_) => "definition_not_found".to_string(),
            MatViewError::UnknownCode { .. } => "data_corruption".to_string(),
            MatViewError::RunAlreadyFinalized(_) => "run_already_finalized".to_string(),
            MatViewError::BackendNotConfigured(_) => "backend_not_configured".to_string(),
            MatViewError::Database(db) => return Self::from_db(db).with_backtrace(),
            MatViewError::Internal(_) => "internal".to_string(),
        };
        Self {
            message: err.to_string(),
            kind,
            trace: None,
        }
        .with_backtrace()
    }

    fn with_backtrace(mut self) -> Self {
        self.trace = Some(std::backtrace::Backtrace::force_capture().to_string());
        self
    }
}

/// The return value of every DDL service call.
///
/// `request` describes what was attempted (target view, SQL fragments,
/// chosen strategy); `response` describes the outcome (row count, whether
/// an index was built). Exactly one of {normal outcome, `error`} applies —
/// the constructors enforce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub status: ServiceStatus,
    pub request: Value,
    pub response: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
}

impl ServiceResponse {
    /// A successful envelope. `status` must not be `Error`.
    pub fn ok(status: ServiceStatus, request: Value, response: Value) -> Self {
        debug_assert!(status.is_success());
        Self {
            status,
            request,
            response,
            error: None,
        }
    }

    /// A failed envelope.
    pub fn error(request: Value, error: EnvelopeError) -> Self {
        Self {
            status: ServiceStatus::Error,
            request,
            response: Value::Null,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
