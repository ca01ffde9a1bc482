use serde_json::json;

use super::Services;
use crate::common::{
    EnvelopeError, MatViewError, RowCountStrategy, ServiceResponse, ServiceStatus,
};
use crate::domains::matviews::models::MatViewDefinition;

impl Services {
    /// `REFRESH MATERIALIZED VIEW CONCURRENTLY` - rebuild without blocking
    /// readers.
    ///
    /// PostgreSQL requires this statement to run outside any transaction
    /// block (same rule as `CREATE INDEX CONCURRENTLY`), so it executes on
    /// a dedicated connection in autocommit mode - never inside `begin()`.
    /// It also requires a pre-existing unique index on the view; the
    /// service does not duplicate that check, PostgreSQL's own error
    /// surfaces verbatim in the envelope.
    pub async fn refresh_concurrent(
        &self,
        definition: &MatViewDefinition,
        row_count_strategy: RowCountStrategy,
    ) -> Result<ServiceResponse, MatViewError> {
        let target = self.qualified(&definition.name);
        let statement = format!("REFRESH MATERIALIZED VIEW CONCURRENTLY {}", target);
        let request = json!({
            "view": target,
            "operation": "refresh",
            "strategy": "concurrent",
            "row_count_strategy": row_count_strategy,
            "sql": statement,
        });

        tracing::info!(view = %definition.name, "Concurrently refreshing materialized view");

        let outcome: Result<_, sqlx::Error> = async {
            // Dedicated connection, no open transaction.
            let mut conn = self.pool().acquire().await?;
            sqlx::query(&statement).execute(&mut *conn).await?;
            drop(conn);
            self.row_count(&definition.name, row_count_strategy).await
        }
        .await;

        match outcome {
            Ok(row_count) => Ok(ServiceResponse::ok(
                ServiceStatus::Refreshed,
                request,
                json!({ "row_count": row_count }),
            )),
            Err(err) => {
                tracing::warn!(view = %definition.name, error = %err, "Concurrent refresh failed");
                Ok(ServiceResponse::error(request, EnvelopeError::from_db(&err)))
            }
        }
    }
}
