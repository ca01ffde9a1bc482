//! Integration tests for the enqueue adapter backends.

mod common;

use crate::common::{create_base_table, definition_for, matview_in_catalog, unique_name, TestHarness};
use matviews_core::common::{DefinitionId, MatViewError, RowCountStrategy};
use matviews_core::config::{Config, JobBackendKind};
use matviews_core::domains::matviews::models::{MatViewRun, RefreshStrategy, RunStatus};
use matviews_core::kernel::{JobKind, JobOptions, JobQueue, QueuedJob};
use test_context::test_context;

fn config_for(ctx: &TestHarness, backend: JobBackendKind, queue: &str) -> Config {
    Config {
        database_url: ctx.db_url.clone(),
        schema: "public".to_string(),
        job_backend: backend,
        job_queue: queue.to_string(),
        nats_url: None,
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn postgres_backend_inserts_a_pending_row(ctx: &TestHarness) {
    let table = create_base_table(&ctx.db_pool, 1).await;
    let def = definition_for(&ctx.db_pool, &table, RefreshStrategy::Regular, &[]).await;
    let queue = unique_name("queue");
    let config = config_for(ctx, JobBackendKind::Postgres, &queue);

    let adapter = JobQueue::from_config(&config, ctx.db_pool.clone())
        .await
        .unwrap();
    let job_id = adapter
        .enqueue(
            JobKind::Refresh,
            &queue,
            def.id,
            JobOptions {
                row_count_strategy: RowCountStrategy::Exact,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let pending = QueuedJob::find_pending(&queue, &ctx.db_pool).await.unwrap();
    assert_eq!(pending.len(), 1);
    let job = &pending[0];
    assert_eq!(job.id, job_id);
    assert_eq!(job.job_kind, "refresh");
    assert_eq!(job.status, "pending");
    assert_eq!(
        job.args["definition_id"].as_str().unwrap(),
        def.id.to_string()
    );
    assert_eq!(job.args["options"]["row_count_strategy"], "exact");

    // Enqueue only hands off: nothing was executed.
    assert!(!matview_in_catalog(&ctx.db_pool, &def.name).await);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn inline_backend_performs_the_job_immediately(ctx: &TestHarness) {
    let table = create_base_table(&ctx.db_pool, 2).await;
    let def = definition_for(&ctx.db_pool, &table, RefreshStrategy::Regular, &[]).await;
    let queue = unique_name("queue");
    let config = config_for(ctx, JobBackendKind::Inline, &queue);

    let adapter = JobQueue::from_config(&config, ctx.db_pool.clone())
        .await
        .unwrap();
    adapter
        .enqueue(JobKind::Create, &queue, def.id, JobOptions::default())
        .await
        .unwrap();

    assert!(matview_in_catalog(&ctx.db_pool, &def.name).await);
    let run = MatViewRun::find_latest_for(def.id, &ctx.db_pool)
        .await
        .unwrap()
        .expect("run recorded");
    assert_eq!(run.status, RunStatus::Success);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn inline_backend_propagates_job_errors(ctx: &TestHarness) {
    let queue = unique_name("queue");
    let config = config_for(ctx, JobBackendKind::Inline, &queue);

    let adapter = JobQueue::from_config(&config, ctx.db_pool.clone())
        .await
        .unwrap();
    let err = adapter
        .enqueue(
            JobKind::Create,
            &queue,
            DefinitionId::new(),
            JobOptions::default(),
        )
        .await
        .expect_err("missing definition must propagate");
    assert!(matches!(err, MatViewError::DefinitionNotFound(_)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn nats_backend_without_url_fails_fast(ctx: &TestHarness) {
    let config = config_for(ctx, JobBackendKind::Nats, "mat_views");

    let err = JobQueue::from_config(&config, ctx.db_pool.clone())
        .await
        .expect_err("must refuse to construct");
    assert!(matches!(err, MatViewError::BackendNotConfigured(_)));
}
