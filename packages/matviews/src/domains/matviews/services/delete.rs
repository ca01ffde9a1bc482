use serde_json::json;

use super::Services;
use crate::common::{
    EnvelopeError, MatViewError, RowCountStrategy, ServiceResponse, ServiceStatus,
};
use crate::domains::matviews::models::MatViewDefinition;

impl Services {
    /// Drop the definition's materialized view.
    ///
    /// The row count is captured before the drop for the audit trail.
    /// `cascade` is required when other objects depend on this view;
    /// without it PostgreSQL refuses the drop and the refusal (naming the
    /// dependency) surfaces in the error envelope. Jobs always pass
    /// `if_exists = true` so deletes are idempotent under retry.
    pub async fn delete(
        &self,
        definition: &MatViewDefinition,
        cascade: bool,
        if_exists: bool,
        row_count_strategy: RowCountStrategy,
    ) -> Result<ServiceResponse, MatViewError> {
        let target = self.qualified(&definition.name);
        let statement = format!(
            "DROP MATERIALIZED VIEW {}{}{}",
            if if_exists { "IF EXISTS " } else { "" },
            target,
            if cascade { " CASCADE" } else { "" },
        );
        let request = json!({
            "view": target,
            "operation": "drop",
            "cascade": cascade,
            "if_exists": if_exists,
            "row_count_strategy": row_count_strategy,
            "sql": statement,
        });

        tracing::info!(view = %definition.name, cascade, "Dropping materialized view");

        let outcome: Result<_, sqlx::Error> = async {
            let existed = self.matview_exists(&definition.name).await?;
            let row_count = if existed {
                self.row_count(&definition.name, row_count_strategy).await?
            } else {
                None
            };
            sqlx::query(&statement).execute(self.pool()).await?;
            Ok((existed, row_count))
        }
        .await;

        match outcome {
            Ok((existed, row_count)) => Ok(ServiceResponse::ok(
                ServiceStatus::Dropped,
                request,
                json!({
                    "existed": existed,
                    "row_count_before_drop": row_count,
                }),
            )),
            Err(err) => {
                tracing::warn!(view = %definition.name, error = %err, "Drop failed");
                Ok(ServiceResponse::error(request, EnvelopeError::from_db(&err)))
            }
        }
    }
}
