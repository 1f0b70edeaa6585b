//! Integration tests for the operations repository.
//!
//! Exercises the repository layer against a real database:
//! - Atomic admission (one active operation per tenant)
//! - Lifecycle transitions and idempotent terminal writes
//! - Undo flagging
//! - History listing filters and stats

use bulkpress_db::models::{CreateOperation, OperationFilters, OperationKind, OperationStatus};
use bulkpress_db::repositories::OperationRepo;
use chrono::Utc;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_operation(tenant: &str) -> CreateOperation {
    CreateOperation {
        tenant: tenant.to_string(),
        kind: OperationKind::PriceAdjustment,
        payload: serde_json::json!({ "version": 1, "items": [] }),
        inverse_payload: Some(serde_json::json!({ "version": 1, "items": [] })),
    }
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn admission_is_exclusive_per_tenant(pool: PgPool) {
    let first = OperationRepo::create_active(&pool, &new_operation("shop-1"))
        .await
        .unwrap()
        .expect("first admission");
    assert_eq!(first.status, OperationStatus::Created);

    // Second insert for the same tenant hits the partial unique index.
    let second = OperationRepo::create_active(&pool, &new_operation("shop-1"))
        .await
        .unwrap();
    assert!(second.is_none());

    // A different tenant is unaffected.
    let other = OperationRepo::create_active(&pool, &new_operation("shop-2"))
        .await
        .unwrap();
    assert!(other.is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn terminal_operation_frees_the_tenant(pool: PgPool) {
    let first = OperationRepo::create_active(&pool, &new_operation("shop-1"))
        .await
        .unwrap()
        .expect("admitted");

    OperationRepo::complete(
        &pool,
        first.id,
        OperationStatus::Failed,
        None,
        Some("remote job failed"),
        Utc::now(),
    )
    .await
    .unwrap()
    .expect("terminal write");

    let next = OperationRepo::create_active(&pool, &new_operation("shop-1"))
        .await
        .unwrap();
    assert!(next.is_some());
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn running_then_completed_with_summary(pool: PgPool) {
    let operation = OperationRepo::create_active(&pool, &new_operation("shop-1"))
        .await
        .unwrap()
        .expect("admitted");

    let running = OperationRepo::mark_running(&pool, operation.id, "gid://catalog/Job/1")
        .await
        .unwrap();
    assert_eq!(running.status, OperationStatus::Running);
    assert_eq!(running.remote_job_id.as_deref(), Some("gid://catalog/Job/1"));

    let summary = serde_json::json!({ "successful": 2, "failed": 0, "errors": [] });
    let completed = OperationRepo::complete(
        &pool,
        operation.id,
        OperationStatus::Completed,
        Some(&summary),
        None,
        Utc::now(),
    )
    .await
    .unwrap()
    .expect("terminal write");

    assert_eq!(completed.status, OperationStatus::Completed);
    assert_eq!(completed.result_summary, Some(summary));
    assert!(completed.completed_at.is_some());

    let found = OperationRepo::find_by_remote_job_id(&pool, "gid://catalog/Job/1")
        .await
        .unwrap()
        .expect("webhook lookup");
    assert_eq!(found.id, operation.id);
}

#[sqlx::test(migrations = "./migrations")]
async fn conflicting_terminal_write_returns_none(pool: PgPool) {
    let operation = OperationRepo::create_active(&pool, &new_operation("shop-1"))
        .await
        .unwrap()
        .expect("admitted");

    OperationRepo::complete(
        &pool,
        operation.id,
        OperationStatus::Completed,
        None,
        None,
        Utc::now(),
    )
    .await
    .unwrap()
    .expect("first terminal write");

    // Same status again: idempotent, matched.
    let again = OperationRepo::complete(
        &pool,
        operation.id,
        OperationStatus::Completed,
        None,
        None,
        Utc::now(),
    )
    .await
    .unwrap();
    assert!(again.is_some());

    // A different terminal status loses the race and must re-read.
    let flipped = OperationRepo::complete(
        &pool,
        operation.id,
        OperationStatus::Failed,
        None,
        Some("late poll"),
        Utc::now(),
    )
    .await
    .unwrap();
    assert!(flipped.is_none());

    let row = OperationRepo::find_by_id(&pool, operation.id)
        .await
        .unwrap()
        .expect("still present");
    assert_eq!(row.status, OperationStatus::Completed);
}

#[sqlx::test(migrations = "./migrations")]
async fn stale_lookup_only_sees_active_rows(pool: PgPool) {
    let operation = OperationRepo::create_active(&pool, &new_operation("shop-1"))
        .await
        .unwrap()
        .expect("admitted");

    // Everything is "stale" against a future cutoff.
    let future = Utc::now() + chrono::Duration::hours(1);
    let stale = OperationRepo::find_stale(&pool, "shop-1", future).await.unwrap();
    assert_eq!(stale.len(), 1);

    OperationRepo::mark_failed(&pool, operation.id, "submission never finished")
        .await
        .unwrap();
    let stale = OperationRepo::find_stale(&pool, "shop-1", future).await.unwrap();
    assert!(stale.is_empty());
}

// ---------------------------------------------------------------------------
// Undo
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn undo_flags_point_at_the_new_operation(pool: PgPool) {
    let original = OperationRepo::create_active(&pool, &new_operation("shop-1"))
        .await
        .unwrap()
        .expect("admitted");
    OperationRepo::complete(
        &pool,
        original.id,
        OperationStatus::Completed,
        None,
        None,
        Utc::now(),
    )
    .await
    .unwrap()
    .expect("terminal write");

    let undo = OperationRepo::create_active(&pool, &new_operation("shop-1"))
        .await
        .unwrap()
        .expect("undo admitted");

    let flagged = OperationRepo::mark_undone(&pool, original.id, undo.id, Utc::now())
        .await
        .unwrap();
    assert!(flagged.undone);
    assert_eq!(flagged.undone_by_operation_id, Some(undo.id));
    assert!(flagged.undone_at.is_some());
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn listing_filters_by_kind_and_status(pool: PgPool) {
    let price_op = OperationRepo::create_active(&pool, &new_operation("shop-1"))
        .await
        .unwrap()
        .expect("admitted");
    OperationRepo::complete(
        &pool,
        price_op.id,
        OperationStatus::Completed,
        None,
        None,
        Utc::now(),
    )
    .await
    .unwrap()
    .expect("terminal write");

    let mut tag_op = new_operation("shop-1");
    tag_op.kind = OperationKind::TagUpdate;
    OperationRepo::create_active(&pool, &tag_op)
        .await
        .unwrap()
        .expect("second admitted");

    let (all, total) = OperationRepo::list(
        &pool,
        "shop-1",
        &OperationFilters::default(),
        None,
        None,
    )
    .await
    .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(total, 2);

    let by_kind = OperationFilters {
        kind: Some(OperationKind::TagUpdate),
        status: None,
    };
    let (tagged, total) = OperationRepo::list(&pool, "shop-1", &by_kind, None, None)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(tagged[0].kind, OperationKind::TagUpdate);

    let by_status = OperationFilters {
        kind: None,
        status: Some(OperationStatus::Completed),
    };
    let (completed, total) = OperationRepo::list(&pool, "shop-1", &by_status, None, None)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(completed[0].id, price_op.id);

    // Other tenants never leak into a listing.
    let (other, total) = OperationRepo::list(
        &pool,
        "shop-9",
        &OperationFilters::default(),
        None,
        None,
    )
    .await
    .unwrap();
    assert!(other.is_empty());
    assert_eq!(total, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn stats_count_by_lifecycle(pool: PgPool) {
    let op = OperationRepo::create_active(&pool, &new_operation("shop-1"))
        .await
        .unwrap()
        .expect("admitted");
    OperationRepo::mark_running(&pool, op.id, "gid://catalog/Job/7")
        .await
        .unwrap();

    let stats = OperationRepo::stats(&pool, "shop-1").await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.running, 1);
    assert_eq!(stats.completed, 0);
    assert_eq!(stats.failed, 0);
}
