//! Integration tests for the regular and concurrent refresh services.

mod common;

use crate::common::{count_rows, create_base_table, definition_for, insert_rows, TestHarness};
use matviews_core::common::{quote_ident, RowCountStrategy, ServiceStatus};
use matviews_core::domains::matviews::models::RefreshStrategy;
use test_context::test_context;

#[test_context(TestHarness)]
#[tokio::test]
async fn regular_refresh_picks_up_new_rows(ctx: &TestHarness) {
    let table = create_base_table(&ctx.db_pool, 3).await;
    let def = definition_for(&ctx.db_pool, &table, RefreshStrategy::Regular, &[]).await;
    let services = ctx.services();

    services
        .create(&def, false, RowCountStrategy::None)
        .await
        .unwrap();
    insert_rows(&ctx.db_pool, &table, 4, 2).await;
    assert_eq!(count_rows(&ctx.db_pool, &def.name).await, 3);

    let envelope = services
        .refresh_regular(&def, RowCountStrategy::Exact)
        .await
        .unwrap();
    assert_eq!(envelope.status, ServiceStatus::Refreshed);
    assert_eq!(envelope.response["row_count"], 5);
    assert_eq!(count_rows(&ctx.db_pool, &def.name).await, 5);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn regular_refresh_of_missing_view_fails(ctx: &TestHarness) {
    let table = create_base_table(&ctx.db_pool, 1).await;
    let def = definition_for(&ctx.db_pool, &table, RefreshStrategy::Regular, &[]).await;
    let services = ctx.services();

    let envelope = services
        .refresh_regular(&def, RowCountStrategy::None)
        .await
        .unwrap();
    assert_eq!(envelope.status, ServiceStatus::Error);
    assert_eq!(envelope.error.unwrap().kind, "sqlstate_42P01");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_refresh_with_unique_index_succeeds(ctx: &TestHarness) {
    let table = create_base_table(&ctx.db_pool, 3).await;
    let def = definition_for(&ctx.db_pool, &table, RefreshStrategy::Concurrent, &["id"]).await;
    let services = ctx.services();

    services
        .create(&def, false, RowCountStrategy::None)
        .await
        .unwrap();
    insert_rows(&ctx.db_pool, &table, 4, 4).await;

    let envelope = services
        .refresh_concurrent(&def, RowCountStrategy::Exact)
        .await
        .unwrap();
    assert_eq!(envelope.status, ServiceStatus::Refreshed);
    assert_eq!(envelope.response["row_count"], 7);
    assert_eq!(count_rows(&ctx.db_pool, &def.name).await, 7);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_refresh_without_unique_index_fails(ctx: &TestHarness) {
    let table = create_base_table(&ctx.db_pool, 3).await;
    // Built without any unique index.
    let def = definition_for(&ctx.db_pool, &table, RefreshStrategy::Regular, &[]).await;
    let services = ctx.services();

    services
        .create(&def, false, RowCountStrategy::None)
        .await
        .unwrap();

    let envelope = services
        .refresh_concurrent(&def, RowCountStrategy::None)
        .await
        .unwrap();
    assert_eq!(envelope.status, ServiceStatus::Error);
    let error = envelope.error.expect("error detail");
    // feature_not_supported, hint tells the operator to add a unique index
    assert_eq!(error.kind, "sqlstate_55000");
    assert!(
        error.message.contains("concurrently"),
        "unexpected message: {}",
        error.message
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_refresh_is_rejected_inside_a_transaction(ctx: &TestHarness) {
    let table = create_base_table(&ctx.db_pool, 3).await;
    let def = definition_for(&ctx.db_pool, &table, RefreshStrategy::Concurrent, &["id"]).await;
    let services = ctx.services();

    services
        .create(&def, false, RowCountStrategy::None)
        .await
        .unwrap();

    // PostgreSQL's own rule, demonstrated directly: the statement the
    // service runs in autocommit mode fails inside a transaction block.
    let mut tx = ctx.db_pool.begin().await.unwrap();
    let result = sqlx::query(&format!(
        "REFRESH MATERIALIZED VIEW CONCURRENTLY \"public\".{}",
        quote_ident(&def.name)
    ))
    .execute(&mut *tx)
    .await;
    let err = result.expect_err("must fail in transaction block");
    assert!(
        err.to_string().contains("transaction"),
        "unexpected error: {}",
        err
    );
    tx.rollback().await.unwrap();

    // The service path, which never opens a transaction, succeeds.
    let envelope = services
        .refresh_concurrent(&def, RowCountStrategy::Exact)
        .await
        .unwrap();
    assert_eq!(envelope.status, ServiceStatus::Refreshed);
    assert_eq!(envelope.response["row_count"], 3);
}
