use serde_json::json;

use super::Services;
use crate::common::{
    EnvelopeError, MatViewError, RowCountStrategy, ServiceResponse, ServiceStatus,
};
use crate::domains::matviews::models::MatViewDefinition;

impl Services {
    /// `REFRESH MATERIALIZED VIEW` - full rebuild under an exclusive lock.
    ///
    /// The statement blocks concurrent reads of the view for its duration,
    /// which is acceptable only under the `regular` strategy.
    pub async fn refresh_regular(
        &self,
        definition: &MatViewDefinition,
        row_count_strategy: RowCountStrategy,
    ) -> Result<ServiceResponse, MatViewError> {
        let target = self.qualified(&definition.name);
        let statement = format!("REFRESH MATERIALIZED VIEW {}", target);
        let request = json!({
            "view": target,
            "operation": "refresh",
            "strategy": "regular",
            "row_count_strategy": row_count_strategy,
            "sql": statement,
        });

        tracing::info!(view = %definition.name, "Refreshing materialized view");

        let outcome: Result<_, sqlx::Error> = async {
            sqlx::query(&statement).execute(self.pool()).await?;
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
                tracing::warn!(view = %definition.name, error = %err, "Regular refresh failed");
                Ok(ServiceResponse::error(request, EnvelopeError::from_db(&err)))
            }
        }
    }
}
