//! Materialized view domain - definitions, run history, and DDL services

pub mod models;
pub mod services;

pub use models::{
    DefinitionInput, MatViewDefinition, MatViewRun, RefreshStrategy, RunOperation, RunStatus,
};
pub use services::Services;
