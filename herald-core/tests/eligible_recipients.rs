//! The broadcast audience query must pick exactly the recipients that
//! single-recipient resolution opts in.

mod common;

use common::{create_project, create_recipients, processor};
use herald_core::entities::preference::{CreateProjectPreference, UpsertRecipientPreference};
use herald_core::resolution::{list_eligible_recipients, resolve_for_recipient};
use herald_sdk::objects::Target;
use kanau::processor::Processor;
use sqlx::PgPool;

const RECIPIENTS: [&str; 4] = ["alice", "bob", "carol", "dave"];

fn posts(topic: &str) -> Target {
    Target::new("posts", topic, "new_comment")
}

async fn project_default(pool: &PgPool, project_id: i64, target: Target, enabled: bool) {
    processor(pool)
        .process(CreateProjectPreference {
            project_id,
            target,
            label: "Comments".to_string(),
            default_enabled: enabled,
        })
        .await
        .unwrap();
}

async fn override_(
    pool: &PgPool,
    project_id: i64,
    external_id: &str,
    target: Target,
    enabled: bool,
) {
    processor(pool)
        .process(UpsertRecipientPreference {
            project_id,
            external_id: external_id.to_string(),
            target,
            enabled,
        })
        .await
        .unwrap();
}

/// Project defaults: `any` off, `rust` on.
/// alice turned `rust` off, bob turned `any` on, carol turned `any` off but
/// `rust` on, dave kept the defaults.
async fn seed(pool: &PgPool) -> i64 {
    let project_id = create_project(pool, 1, "acme").await;
    create_recipients(pool, project_id, &RECIPIENTS).await;
    project_default(pool, project_id, posts("any"), false).await;
    project_default(pool, project_id, posts("rust"), true).await;
    override_(pool, project_id, "alice", posts("rust"), false).await;
    override_(pool, project_id, "bob", posts("any"), true).await;
    override_(pool, project_id, "carol", posts("any"), false).await;
    override_(pool, project_id, "carol", posts("rust"), true).await;

    // Another tenant's recipients and overrides stay out of the audience.
    let other = create_project(pool, 2, "other").await;
    create_recipients(pool, other, &["alice", "erin"]).await;
    override_(pool, other, "alice", posts("go"), true).await;
    project_id
}

async fn resolved_audience(pool: &PgPool, project_id: i64, target: &Target) -> Vec<String> {
    let mut db = processor(pool);
    let mut audience = Vec::new();
    for id in RECIPIENTS {
        if resolve_for_recipient(&mut db, project_id, id, target)
            .await
            .unwrap()
            .enabled
        {
            audience.push(id.to_string());
        }
    }
    audience
}

#[sqlx::test(migrations = "../migrations")]
async fn test_audience_matches_single_resolution(pool: PgPool) {
    let project_id = seed(&pool).await;
    let targets = [
        posts("rust"),
        posts("go"),
        posts("any"),
        posts("none"),
        Target::new("posts", "rust", "new_post"),
        Target::new("billing", "rust", "new_comment"),
    ];
    for target in &targets {
        let listed = list_eligible_recipients(&pool, project_id, target).await.unwrap();
        assert_eq!(listed, resolved_audience(&pool, project_id, target).await, "{target:?}");
    }
}

#[sqlx::test(migrations = "../migrations")]
async fn test_audience_follows_topic_specificity(pool: PgPool) {
    let project_id = seed(&pool).await;

    let rust = list_eligible_recipients(&pool, project_id, &posts("rust")).await.unwrap();
    assert_eq!(rust, vec!["bob", "carol", "dave"]);

    // No `go` preferences anywhere in this project, so `any` decides.
    let go = list_eligible_recipients(&pool, project_id, &posts("go")).await.unwrap();
    assert_eq!(go, vec!["bob"]);

    // Reserved topics only match themselves.
    let none = list_eligible_recipients(&pool, project_id, &posts("none")).await.unwrap();
    assert_eq!(none, RECIPIENTS.to_vec());
}
