//! Quota accounting against a real database.

mod common;

use common::create_project;
use herald_core::entities::plan::Metric;
use herald_core::entities::subscription::UserSubscription;
use herald_core::entities::usage::UsageAggregate;
use herald_core::processors::{DeleteProjectDataHandler, DeleteProjectDataPayload};
use herald_core::queue::{TaskContext, TaskHandler};
use herald_core::quota::{QuotaError, UsageEvent, check_and_consume};
use sqlx::PgPool;
use time::OffsetDateTime;

const USER: i64 = 42;

fn event(project_id: i64, amount: i64) -> UsageEvent {
    UsageEvent {
        user_id: USER,
        project_id,
        metric: Metric::Notifications,
        amount,
    }
}

async fn consume(pool: &PgPool, event: UsageEvent) -> Result<i64, QuotaError> {
    let mut tx = pool.begin().await?;
    let consumption = check_and_consume(&mut tx, &event, OffsetDateTime::now_utc()).await?;
    tx.commit().await?;
    Ok(consumption.used_after)
}

async fn used(pool: &PgPool) -> i64 {
    let mut tx = pool.begin().await.unwrap();
    let sub = UserSubscription::lock_or_create_tx(&mut tx, USER, OffsetDateTime::now_utc())
        .await
        .unwrap();
    let used = UsageAggregate::sum_for_user(
        &mut *tx,
        USER,
        Metric::Notifications,
        sub.current_period_start,
        sub.current_period_end,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    used
}

#[sqlx::test(migrations = "../migrations")]
async fn test_concurrent_consumers_never_overshoot_limit(pool: PgPool) {
    let project_id = create_project(&pool, USER, "acme").await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move { consume(&pool, event(project_id, 1500)).await }));
    }
    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(QuotaError::QuotaExceeded { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    // 6 x 1500 fits the free 10 000, a seventh would not.
    assert_eq!(admitted, 6);
    assert_eq!(used(&pool).await, 9000);
}

#[sqlx::test(migrations = "../migrations")]
async fn test_usage_survives_project_deletion(pool: PgPool) {
    let first = create_project(&pool, USER, "first").await;
    assert_eq!(consume(&pool, event(first, 10_000)).await.unwrap(), 10_000);

    let ctx = TaskContext {
        task_id: 1,
        retry_count: 0,
        max_retry: 3,
    };
    let payload = serde_json::to_value(DeleteProjectDataPayload { project_id: first }).unwrap();
    DeleteProjectDataHandler::new(pool.clone())
        .handle(&ctx, payload)
        .await
        .unwrap();

    let second = create_project(&pool, USER, "second").await;
    assert_eq!(used(&pool).await, 10_000);
    assert!(matches!(
        consume(&pool, event(second, 1)).await,
        Err(QuotaError::QuotaExceeded { used: 10_000, .. })
    ));
}
