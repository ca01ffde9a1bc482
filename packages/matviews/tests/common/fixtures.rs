//! Shared fixtures: base tables, definitions, and direct catalog probes.

use matviews_core::domains::matviews::models::{
    DefinitionInput, MatViewDefinition, RefreshStrategy,
};
use sqlx::PgPool;
use uuid::Uuid;

/// Unique object name so tests sharing one database never collide.
pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Create a populated source table: `(id BIGINT PK, amount BIGINT)` with
/// ids `1..=rows`.
pub async fn create_base_table(pool: &PgPool, rows: i64) -> String {
    let table = unique_name("orders");
    sqlx::query(&format!(
        "CREATE TABLE \"{}\" (id BIGINT PRIMARY KEY, amount BIGINT NOT NULL)",
        table
    ))
    .execute(pool)
    .await
    .expect("Failed to create base table");
    if rows > 0 {
        insert_rows(pool, &table, 1, rows).await;
    }
    table
}

/// Insert `count` rows starting at id `start`.
pub async fn insert_rows(pool: &PgPool, table: &str, start: i64, count: i64) {
    sqlx::query(&format!(
        "INSERT INTO \"{}\" (id, amount) SELECT g, g * 10 FROM generate_series($1::BIGINT, $2::BIGINT) g",
        table
    ))
    .bind(start)
    .bind(start + count - 1)
    .execute(pool)
    .await
    .expect("Failed to insert rows");
}

/// Persist a definition selecting everything from `table`.
pub async fn definition_for(
    pool: &PgPool,
    table: &str,
    strategy: RefreshStrategy,
    unique_index_columns: &[&str],
) -> MatViewDefinition {
    MatViewDefinition::create(
        DefinitionInput {
            name: unique_name("mv"),
            sql: format!("SELECT id, amount FROM \"{}\"", table),
            refresh_strategy: strategy,
            unique_index_columns: unique_index_columns.iter().map(|c| c.to_string()).collect(),
            dependencies: vec![table.to_string()],
            schedule_cron: None,
        },
        pool,
    )
    .await
    .expect("Failed to create definition")
}

/// Count rows of a relation by name, bypassing the services.
pub async fn count_rows(pool: &PgPool, name: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM \"{}\"", name))
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}

/// Whether a materialized view exists in `public`, straight from the
/// catalog.
pub async fn matview_in_catalog(pool: &PgPool, name: &str) -> bool {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM pg_matviews WHERE schemaname = 'public' AND matviewname = $1)",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .expect("Failed to query pg_matviews")
}

/// Index definitions on a relation in `public`.
pub async fn indexes_on(pool: &PgPool, name: &str) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT indexdef FROM pg_indexes WHERE schemaname = 'public' AND tablename = $1",
    )
    .bind(name)
    .fetch_all(pool)
    .await
    .expect("Failed to query pg_indexes")
}
