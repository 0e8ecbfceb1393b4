//! Broadcast settlement against a real database: the terminal status is
//! written once, and batches that run out of retries still settle.

mod common;

use common::{create_broadcast, create_project, load_broadcast, processor, target};
use herald_core::entities::broadcast::Broadcast;
use herald_core::entities::broadcast_batch::{BroadcastBatch, ListBroadcastBatches};
use herald_core::entities::{BatchStatus, BroadcastStatus};
use herald_core::processors::broadcast::settle_broadcast;
use herald_core::processors::{
    BroadcastDeliveryHandler, BroadcastDeliveryPayload, PrepareBatchesHandler,
    PrepareBatchesPayload,
};
use herald_core::queue::{TaskContext, TaskHandler, TaskQueue};
use kanau::processor::Processor;
use sqlx::PgPool;
use time::macros::datetime;

fn final_attempt() -> TaskContext {
    TaskContext {
        task_id: 1,
        retry_count: 4,
        max_retry: 3,
    }
}

async fn batch_statuses(pool: &PgPool, broadcast_id: i64) -> Vec<BatchStatus> {
    processor(pool)
        .process(ListBroadcastBatches { broadcast_id })
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.status)
        .collect()
}

#[sqlx::test(migrations = "../migrations")]
async fn test_finish_keeps_first_terminal_write(pool: PgPool) {
    let project_id = create_project(&pool, 1, "acme").await;
    let (broadcast_id, _) = create_broadcast(&pool, project_id, &[]).await;
    let first = datetime!(2024-05-01 12:00 UTC);
    let second = datetime!(2024-05-01 13:00 UTC);

    let finished = Broadcast::finish(&pool, broadcast_id, BroadcastStatus::Completed, first);
    assert!(finished.await.unwrap());
    let finished_again = Broadcast::finish(&pool, broadcast_id, BroadcastStatus::Failed, second);
    assert!(!finished_again.await.unwrap());

    let broadcast = load_broadcast(&pool, project_id, broadcast_id).await;
    assert_eq!(broadcast.status, BroadcastStatus::Completed);
    assert_eq!(broadcast.completed_at, Some(first));
}

#[sqlx::test(migrations = "../migrations")]
async fn test_settling_twice_is_harmless(pool: PgPool) {
    let project_id = create_project(&pool, 1, "acme").await;
    let recipients = vec!["alice".to_string(), "bob".to_string()];
    let (broadcast_id, batch_ids) =
        create_broadcast(&pool, project_id, &[recipients.as_slice()]).await;

    // Nothing settles while a batch is still pending.
    settle_broadcast(&pool, broadcast_id).await.unwrap();
    let pending = load_broadcast(&pool, project_id, broadcast_id).await;
    assert_eq!(pending.status, BroadcastStatus::Enqueued);

    BroadcastBatch::mark_attempted(&pool, batch_ids[0], BatchStatus::Completed, 1, 5)
        .await
        .unwrap();
    settle_broadcast(&pool, broadcast_id).await.unwrap();
    let settled = load_broadcast(&pool, project_id, broadcast_id).await;
    assert_eq!(settled.status, BroadcastStatus::Completed);
    assert!(settled.completed_at.is_some());

    settle_broadcast(&pool, broadcast_id).await.unwrap();
    let again = load_broadcast(&pool, project_id, broadcast_id).await;
    assert_eq!(again.status, BroadcastStatus::Completed);
    assert_eq!(again.completed_at, settled.completed_at);
}

#[sqlx::test(migrations = "../migrations")]
async fn test_exhausted_delivery_fails_stranded_batch(pool: PgPool) {
    let project_id = create_project(&pool, 1, "acme").await;
    let first = vec!["alice".to_string()];
    let second = vec!["bob".to_string()];
    let (broadcast_id, batch_ids) =
        create_broadcast(&pool, project_id, &[first.as_slice(), second.as_slice()]).await;

    BroadcastBatch::mark_attempted(&pool, batch_ids[0], BatchStatus::Completed, 1, 5)
        .await
        .unwrap();
    // The worker died mid-delivery on its last attempt.
    assert!(BroadcastBatch::mark_processing(&pool, batch_ids[1], 4).await.unwrap());

    let payload = BroadcastDeliveryPayload {
        project_id,
        broadcast_id,
        batch_id: batch_ids[1],
        recipients: second.clone(),
        target: target(),
        payload: serde_json::json!({"title": "hi"}),
        expires_at: 1_900_000_000,
    };
    BroadcastDeliveryHandler::new(pool.clone())
        .on_exhausted(&final_attempt(), serde_json::to_value(&payload).unwrap())
        .await
        .unwrap();

    assert_eq!(
        batch_statuses(&pool, broadcast_id).await,
        vec![BatchStatus::Completed, BatchStatus::Failed]
    );
    let broadcast = load_broadcast(&pool, project_id, broadcast_id).await;
    assert_eq!(broadcast.status, BroadcastStatus::Failed);
    assert!(broadcast.completed_at.is_some());
}

#[sqlx::test(migrations = "../migrations")]
async fn test_exhausted_delivery_keeps_completed_batch(pool: PgPool) {
    let project_id = create_project(&pool, 1, "acme").await;
    let recipients = vec!["alice".to_string()];
    let (broadcast_id, batch_ids) =
        create_broadcast(&pool, project_id, &[recipients.as_slice()]).await;
    BroadcastBatch::mark_attempted(&pool, batch_ids[0], BatchStatus::Completed, 4, 5)
        .await
        .unwrap();

    let payload = BroadcastDeliveryPayload {
        project_id,
        broadcast_id,
        batch_id: batch_ids[0],
        recipients,
        target: target(),
        payload: serde_json::json!({}),
        expires_at: 1_900_000_000,
    };
    BroadcastDeliveryHandler::new(pool.clone())
        .on_exhausted(&final_attempt(), serde_json::to_value(&payload).unwrap())
        .await
        .unwrap();

    assert_eq!(batch_statuses(&pool, broadcast_id).await, vec![BatchStatus::Completed]);
    let broadcast = load_broadcast(&pool, project_id, broadcast_id).await;
    assert_eq!(broadcast.status, BroadcastStatus::Completed);
}

#[sqlx::test(migrations = "../migrations")]
async fn test_exhausted_preparation_fails_broadcast(pool: PgPool) {
    let project_id = create_project(&pool, 1, "acme").await;
    let (broadcast_id, _) = create_broadcast(&pool, project_id, &[]).await;
    let payload = PrepareBatchesPayload {
        user_id: 1,
        project_id,
        broadcast_id,
    };

    PrepareBatchesHandler::new(pool.clone(), TaskQueue::new(pool.clone(), 3))
        .on_exhausted(&final_attempt(), serde_json::to_value(&payload).unwrap())
        .await
        .unwrap();

    let broadcast = load_broadcast(&pool, project_id, broadcast_id).await;
    assert_eq!(broadcast.status, BroadcastStatus::Failed);
    assert!(broadcast.completed_at.is_some());
}

#[sqlx::test(migrations = "../migrations")]
async fn test_exhausted_preparation_leaves_prepared_broadcast_to_its_batches(pool: PgPool) {
    let project_id = create_project(&pool, 1, "acme").await;
    let recipients = vec!["alice".to_string()];
    let (broadcast_id, _) = create_broadcast(&pool, project_id, &[recipients.as_slice()]).await;
    let payload = PrepareBatchesPayload {
        user_id: 1,
        project_id,
        broadcast_id,
    };

    PrepareBatchesHandler::new(pool.clone(), TaskQueue::new(pool.clone(), 3))
        .on_exhausted(&final_attempt(), serde_json::to_value(&payload).unwrap())
        .await
        .unwrap();

    let broadcast = load_broadcast(&pool, project_id, broadcast_id).await;
    assert_eq!(broadcast.status, BroadcastStatus::Enqueued);
    assert_eq!(broadcast.completed_at, None);
}
