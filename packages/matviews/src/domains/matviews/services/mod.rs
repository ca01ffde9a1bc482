//! DDL services - each translates a definition into a sequence of
//! PostgreSQL statements and returns a result envelope.
//!
//! Services capture database errors into the envelope's `error` field
//! rather than returning `Err`; only validation and infrastructure
//! failures propagate. Expected "already in desired state" conditions
//! (create on an existing view) are normal `skipped` outcomes, never
//! errors.

pub mod create;
pub mod delete;
pub mod existence;
pub mod refresh_concurrent;
pub mod refresh_regular;
pub mod refresh_swap;

use sqlx::PgPool;

use crate::common::{qualified_name, RowCountStrategy};

/// Handle to the DDL services, bound to a pool and a target schema at
/// construction time. No ambient global configuration.
#[derive(Debug, Clone)]
pub struct Services {
    pool: PgPool,
    schema: String,
}

impl Services {
    /// Services against the `public` schema.
    pub fn new(pool: PgPool) -> Self {
        Self::with_schema(pool, "public")
    }

    pub fn with_schema(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Schema-qualified, quoted name of a view.
    pub(crate) fn qualified(&self, name: &str) -> String {
        qualified_name(&self.schema, name)
    }

    /// Whether a materialized view with this name exists in the target
    /// schema.
    pub(crate) async fn matview_exists(&self, name: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pg_matviews WHERE schemaname = $1 AND matviewname = $2)",
        )
        .bind(&self.schema)
        .bind(name)
        .fetch_one(&self.pool)
        .await
    }

    /// Row count per strategy. `Estimated` reads catalog statistics
    /// (clamped at zero - `reltuples` is -1 before the first analyze),
    /// `Exact` scans, `None` skips.
    pub(crate) async fn row_count(
        &self,
        name: &str,
        strategy: RowCountStrategy,
    ) -> Result<Option<i64>, sqlx::Error> {
        let target = self.qualified(name);
        match strategy {
            RowCountStrategy::None => Ok(None),
            RowCountStrategy::Exact => {
                let count = sqlx::query_scalar::<_, i64>(&format!(
                    "SELECT COUNT(*) FROM {}",
                    target
                ))
                .fetch_one(&self.pool)
                .await?;
                Ok(Some(count))
            }
            RowCountStrategy::Estimated => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT GREATEST(reltuples, 0)::BIGINT FROM pg_class WHERE oid = to_regclass($1)",
                )
                .bind(&target)
                .fetch_optional(&self.pool)
                .await
            }
        }
    }
}
