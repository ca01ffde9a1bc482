//! Typed ID aliases for the crate's entities.

pub use super::id::Id;

/// Marker type for MatViewDefinition entities.
pub struct MatViewDefinitionEntity;

/// Marker type for MatViewRun entities.
pub struct MatViewRunEntity;

/// Marker type for queued jobs.
pub struct QueuedJobEntity;

/// Typed ID for materialized view definitions.
pub type DefinitionId = Id<MatViewDefinitionEntity>;

/// Typed ID for run records.
pub type RunId = Id<MatViewRunEntity>;

/// Typed ID for enqueued jobs.
pub type JobId = Id<QueuedJobEntity>;
