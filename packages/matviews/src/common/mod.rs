// Common types and utilities shared across the crate

pub mod entity_ids;
pub mod envelope;
pub mod error;
pub mod id;
pub mod row_count;
pub mod sql;

pub use entity_ids::*;
pub use envelope::{EnvelopeError, ServiceResponse, ServiceStatus};
pub use error::MatViewError;
pub use id::Id;
pub use row_count::RowCountStrategy;
pub use sql::{qualified_name, quote_ident};
