pub mod definition;
pub mod run;

pub use definition::{DefinitionInput, MatViewDefinition, RefreshStrategy};
pub use run::{MatViewRun, RunOperation, RunStatus};
