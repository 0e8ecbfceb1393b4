//! Fixtures shared by the database-backed tests.
//!
//! Each test gets a fresh database with the workspace migrations applied by
//! `#[sqlx::test]`.

#![allow(dead_code)]

use herald_core::entities::broadcast::{Broadcast, GetBroadcast};
use herald_core::entities::broadcast_batch::BroadcastBatch;
use herald_core::entities::project::CreateProject;
use herald_core::entities::recipient::CreateRecipient;
use herald_core::framework::DatabaseProcessor;
use herald_sdk::objects::Target;
use kanau::processor::Processor;
use sqlx::PgPool;

pub fn processor(pool: &PgPool) -> DatabaseProcessor {
    DatabaseProcessor { pool: pool.clone() }
}

pub async fn create_project(pool: &PgPool, user_id: i64, name: &str) -> i64 {
    processor(pool)
        .process(CreateProject {
            user_id,
            name: name.to_string(),
        })
        .await
        .unwrap()
        .id
}

pub async fn create_recipients(pool: &PgPool, project_id: i64, ids: &[&str]) {
    let db = processor(pool);
    for id in ids {
        db.process(CreateRecipient {
            project_id,
            external_id: id.to_string(),
            name: None,
        })
        .await
        .unwrap();
    }
}

pub fn target() -> Target {
    Target::new("posts", "rust", "new_comment")
}

/// An `enqueued` broadcast with one pending batch per recipient slice.
pub async fn create_broadcast(
    pool: &PgPool,
    project_id: i64,
    batches: &[&[String]],
) -> (i64, Vec<i64>) {
    let mut tx = pool.begin().await.unwrap();
    let payload = serde_json::json!({"title": "hi"});
    let broadcast = Broadcast::insert_tx(&mut tx, project_id, &target(), &payload)
        .await
        .unwrap();
    let batch_ids = BroadcastBatch::insert_many_tx(&mut tx, broadcast.id, batches)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    (broadcast.id, batch_ids)
}

pub async fn load_broadcast(pool: &PgPool, project_id: i64, broadcast_id: i64) -> Broadcast {
    processor(pool)
        .process(GetBroadcast {
            project_id,
            broadcast_id,
        })
        .await
        .unwrap()
        .unwrap()
}
