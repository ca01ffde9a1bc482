use thiserror::Error;

use super::entity_ids::DefinitionId;

/// Errors surfaced by the materialized view lifecycle core.
///
/// Database errors that happen while a service executes DDL are *not*
/// returned through this type — services fold them into the result
/// envelope's `error` field. `MatViewError` covers everything that must
/// stop an operation before or around the DDL: bad definitions, corrupt
/// persisted state, and infrastructure failures.
#[derive(Error, Debug)]
pub enum MatViewError {
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("Definition not found: {0}")]
    DefinitionNotFound(DefinitionId),

    #[error("Unknown {field} code {code} in stored row (data corruption)")]
    UnknownCode { field: &'static str, code: i16 },

    #[error("Run {0} is already finalized")]
    RunAlreadyFinalized(super::entity_ids::RunId),

    #[error("No job backend configured: {0}")]
    BackendNotConfigured(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
