use serde_json::{json, Value};

use super::Services;
use crate::common::{
    quote_ident, EnvelopeError, MatViewError, RowCountStrategy, ServiceResponse, ServiceStatus,
};
use crate::domains::matviews::models::MatViewDefinition;

impl Services {
    /// Create the definition's materialized view.
    ///
    /// Idempotent under retry: an existing view yields `skipped` unless
    /// `force` is set, in which case it is dropped and rebuilt. A non-empty
    /// `unique_index_columns` list gets a non-concurrent unique index - the
    /// view was just populated inside this same operation and is not yet
    /// visible to readers, so there is nothing to avoid blocking.
    ///
    /// No partial-state cleanup on failure; the caller decides whether to
    /// retry with `force`.
    pub async fn create(
        &self,
        definition: &MatViewDefinition,
        force: bool,
        row_count_strategy: RowCountStrategy,
    ) -> Result<ServiceResponse, MatViewError> {
        let target = self.qualified(&definition.name);
        let request = json!({
            "view": target,
            "operation": "create",
            "force": force,
            "row_count_strategy": row_count_strategy,
            "sql": definition.sql,
        });

        tracing::info!(view = %definition.name, force, "Creating materialized view");

        match self
            .create_inner(definition, &target, force, row_count_strategy)
            .await
        {
            Ok(envelope) => Ok(ServiceResponse {
                request,
                ..envelope
            }),
            Err(err) => {
                tracing::warn!(view = %definition.name, error = %err, "Create failed");
                Ok(ServiceResponse::error(request, EnvelopeError::from_db(&err)))
            }
        }
    }

    async fn create_inner(
        &self,
        definition: &MatViewDefinition,
        target: &str,
        force: bool,
        row_count_strategy: RowCountStrategy,
    ) -> Result<ServiceResponse, sqlx::Error> {
        let exists = self.matview_exists(&definition.name).await?;

        if exists && !force {
            tracing::info!(view = %definition.name, "View already exists, skipping");
            return Ok(ServiceResponse::ok(
                ServiceStatus::Skipped,
                Value::Null,
                json!({ "exists": true }),
            ));
        }

        let mut conn = self.pool().acquire().await?;

        if exists {
            sqlx::query(&format!("DROP MATERIALIZED VIEW IF EXISTS {}", target))
                .execute(&mut *conn)
                .await?;
        }

        sqlx::query(&format!(
            "CREATE MATERIALIZED VIEW {} AS {}",
            target, definition.sql
        ))
        .execute(&mut *conn)
        .await?;

        let mut unique_index_created = false;
        if !definition.unique_index_columns.is_empty() {
            let columns = definition
                .unique_index_columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            let index_name = quote_ident(&format!("{}_uniq_idx", definition.name));
            sqlx::query(&format!(
                "CREATE UNIQUE INDEX {} ON {} ({})",
                index_name, target, columns
            ))
            .execute(&mut *conn)
            .await?;
            unique_index_created = true;
        }

        drop(conn);

        let row_count = self.row_count(&definition.name, row_count_strategy).await?;

        Ok(ServiceResponse::ok(
            ServiceStatus::Created,
            Value::Null,
            json!({
                "exists": false,
                "recreated": exists,
                "unique_index_created": unique_index_created,
                "row_count": row_count,
            }),
        ))
    }
}
