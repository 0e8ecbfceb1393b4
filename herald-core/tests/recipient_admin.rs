//! Bulk recipient writes and broadcast deletion against a real database.

mod common;

use common::{create_broadcast, create_project, create_recipients, processor};
use herald_core::entities::BroadcastStatus;
use herald_core::entities::broadcast::{Broadcast, DeleteBroadcasts, GetBroadcast};
use herald_core::entities::recipient::{
    GetRecipient, UpdateRecipient, UpsertRecipients, UpsertedRecipient,
};
use kanau::processor::Processor;
use sqlx::PgPool;
use time::OffsetDateTime;

#[sqlx::test(migrations = "../migrations")]
async fn test_upsert_reports_inserted_and_updated(pool: PgPool) {
    let project_id = create_project(&pool, 1, "acme").await;
    create_recipients(&pool, project_id, &["alice"]).await;
    let db = processor(&pool);

    let mut written = db
        .process(UpsertRecipients {
            project_id,
            recipients: vec![
                ("alice".to_string(), Some("Alice".to_string())),
                ("bob".to_string(), None),
            ],
        })
        .await
        .unwrap();
    written.sort_by(|a, b| a.external_id.cmp(&b.external_id));
    assert_eq!(
        written,
        vec![
            UpsertedRecipient {
                external_id: "alice".to_string(),
                inserted: false,
            },
            UpsertedRecipient {
                external_id: "bob".to_string(),
                inserted: true,
            },
        ]
    );

    let alice = db
        .process(GetRecipient {
            project_id,
            external_id: "alice".to_string(),
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice.name.as_deref(), Some("Alice"));
}

#[sqlx::test(migrations = "../migrations")]
async fn test_update_recipient_sets_and_clears_name(pool: PgPool) {
    let project_id = create_project(&pool, 1, "acme").await;
    create_recipients(&pool, project_id, &["alice"]).await;
    let db = processor(&pool);

    let named = db
        .process(UpdateRecipient {
            project_id,
            external_id: "alice".to_string(),
            name: Some("Alice".to_string()),
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(named.name.as_deref(), Some("Alice"));

    let cleared = db
        .process(UpdateRecipient {
            project_id,
            external_id: "alice".to_string(),
            name: None,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cleared.name, None);

    let missing = db
        .process(UpdateRecipient {
            project_id,
            external_id: "nobody".to_string(),
            name: None,
        })
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[sqlx::test(migrations = "../migrations")]
async fn test_delete_broadcasts_skips_enqueued(pool: PgPool) {
    let project_id = create_project(&pool, 1, "acme").await;
    let other = create_project(&pool, 2, "other").await;
    let recipients = vec!["alice".to_string()];
    let (settled, _) = create_broadcast(&pool, project_id, &[recipients.as_slice()]).await;
    let (running, _) = create_broadcast(&pool, project_id, &[recipients.as_slice()]).await;
    let (foreign, _) = create_broadcast(&pool, other, &[]).await;
    let now = OffsetDateTime::now_utc();
    Broadcast::finish(&pool, settled, BroadcastStatus::Completed, now).await.unwrap();
    Broadcast::finish(&pool, foreign, BroadcastStatus::Completed, now).await.unwrap();
    let db = processor(&pool);

    let deleted = db
        .process(DeleteBroadcasts {
            project_id,
            ids: Some(vec![settled, running, foreign]),
        })
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let exists = |project_id, broadcast_id| {
        let db = db.clone();
        async move {
            db.process(GetBroadcast {
                project_id,
                broadcast_id,
            })
            .await
            .unwrap()
            .is_some()
        }
    };
    assert!(!exists(project_id, settled).await);
    assert!(exists(project_id, running).await);
    assert!(exists(other, foreign).await);

    // Deleting everything still leaves the running broadcast alone.
    let deleted = db
        .process(DeleteBroadcasts {
            project_id,
            ids: None,
        })
        .await
        .unwrap();
    assert_eq!(deleted, 0);
    assert!(exists(project_id, running).await);
}
