//! Preference rows at project scope (`recipient_external_id IS NULL`) and
//! recipient scope. Both live in one table so that resolution can fetch
//! every candidate in a single query.

use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use herald_sdk::objects::Target;
use herald_sdk::objects::preference::{ProjectPreference, RecipientPreference};
use kanau::processor::Processor;
use time::OffsetDateTime;

pub(crate) const PREFERENCE_COLUMNS: &str = "id, project_id, recipient_external_id, channel, topic, event, label, enabled, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Preference {
    pub id: i64,
    pub project_id: i64,
    /// `None` for project-level preferences.
    pub recipient_external_id: Option<String>,
    pub channel: CompactString,
    pub topic: CompactString,
    pub event: CompactString,
    pub label: Option<String>,
    pub enabled: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Preference {
    pub fn target(&self) -> Target {
        Target::new(self.channel.clone(), self.topic.clone(), self.event.clone())
    }

    pub fn is_project_level(&self) -> bool {
        self.recipient_external_id.is_none()
    }

    pub fn to_project_object(&self) -> ProjectPreference {
        ProjectPreference {
            id: self.id,
            target: self.target(),
            label: self.label.clone().unwrap_or_default(),
            default_enabled: self.enabled,
            created_at: super::unix(self.created_at),
        }
    }

    pub fn to_recipient_object(&self) -> RecipientPreference {
        RecipientPreference {
            id: self.id,
            recipient_id: self.recipient_external_id.clone().unwrap_or_default(),
            target: self.target(),
            enabled: self.enabled,
            updated_at: super::unix(self.updated_at),
        }
    }

    pub async fn delete_for_recipient_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        project_id: i64,
        external_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM preferences WHERE project_id = $1 AND recipient_external_id = $2",
        )
        .bind(project_id)
        .bind(external_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_project_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        project_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM preferences WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Define a project-level target. A duplicate target is a unique violation.
pub struct CreateProjectPreference {
    pub project_id: i64,
    pub target: Target,
    pub label: String,
    pub default_enabled: bool,
}

impl Processor<CreateProjectPreference> for DatabaseProcessor {
    type Output = Preference;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreateProjectPreference")]
    async fn process(&self, insert: CreateProjectPreference) -> Result<Preference, sqlx::Error> {
        let sql = format!(
            "INSERT INTO preferences (project_id, channel, topic, event, label, enabled) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PREFERENCE_COLUMNS}"
        );
        sqlx::query_as::<_, Preference>(&sql)
            .bind(insert.project_id)
            .bind(insert.target.channel.as_str())
            .bind(insert.target.topic.as_str())
            .bind(insert.target.event.as_str())
            .bind(insert.label)
            .bind(insert.default_enabled)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct ListProjectPreferences {
    pub project_id: i64,
}

impl Processor<ListProjectPreferences> for DatabaseProcessor {
    type Output = Vec<Preference>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListProjectPreferences")]
    async fn process(&self, query: ListProjectPreferences) -> Result<Vec<Preference>, sqlx::Error> {
        let sql = format!(
            "SELECT {PREFERENCE_COLUMNS} FROM preferences \
             WHERE project_id = $1 AND recipient_external_id IS NULL \
             ORDER BY channel, topic, event"
        );
        sqlx::query_as::<_, Preference>(&sql)
            .bind(query.project_id)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct DeleteProjectPreference {
    pub project_id: i64,
    pub preference_id: i64,
}

impl Processor<DeleteProjectPreference> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteProjectPreference")]
    async fn process(&self, query: DeleteProjectPreference) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM preferences \
             WHERE id = $1 AND project_id = $2 AND recipient_external_id IS NULL",
        )
        .bind(query.preference_id)
        .bind(query.project_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
/// Whether the project defines the target, either exactly or through the
/// `any` topic wildcard of the same channel and event.
pub struct ProjectPreferenceExists {
    pub project_id: i64,
    pub target: Target,
}

impl Processor<ProjectPreferenceExists> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ProjectPreferenceExists")]
    async fn process(&self, query: ProjectPreferenceExists) -> Result<bool, sqlx::Error> {
        let topics = crate::resolution::topic_order(&query.target);
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM preferences
                WHERE project_id = $1
                  AND recipient_external_id IS NULL
                  AND channel = $2
                  AND event = $3
                  AND topic = ANY($4)
            )
            "#,
        )
        .bind(query.project_id)
        .bind(query.target.channel.as_str())
        .bind(query.target.event.as_str())
        .bind(topics)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Create or replace a recipient's override for one target.
pub struct UpsertRecipientPreference {
    pub project_id: i64,
    /// Must already be normalized.
    pub external_id: String,
    pub target: Target,
    pub enabled: bool,
}

impl Processor<UpsertRecipientPreference> for DatabaseProcessor {
    type Output = Preference;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertRecipientPreference")]
    async fn process(&self, upsert: UpsertRecipientPreference) -> Result<Preference, sqlx::Error> {
        let sql = format!(
            "INSERT INTO preferences (project_id, recipient_external_id, channel, topic, event, enabled) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (project_id, recipient_external_id, channel, topic, event) \
                 WHERE recipient_external_id IS NOT NULL \
             DO UPDATE SET enabled = EXCLUDED.enabled, updated_at = now() \
             RETURNING {PREFERENCE_COLUMNS}"
        );
        sqlx::query_as::<_, Preference>(&sql)
            .bind(upsert.project_id)
            .bind(upsert.external_id)
            .bind(upsert.target.channel.as_str())
            .bind(upsert.target.topic.as_str())
            .bind(upsert.target.event.as_str())
            .bind(upsert.enabled)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct ListRecipientPreferences {
    pub project_id: i64,
    pub external_id: String,
}

impl Processor<ListRecipientPreferences> for DatabaseProcessor {
    type Output = Vec<Preference>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListRecipientPreferences")]
    async fn process(
        &self,
        query: ListRecipientPreferences,
    ) -> Result<Vec<Preference>, sqlx::Error> {
        let sql = format!(
            "SELECT {PREFERENCE_COLUMNS} FROM preferences \
             WHERE project_id = $1 AND recipient_external_id = $2 \
             ORDER BY channel, topic, event"
        );
        sqlx::query_as::<_, Preference>(&sql)
            .bind(query.project_id)
            .bind(query.external_id)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Drop a recipient override so the target falls back to the project default.
pub struct DeleteRecipientPreference {
    pub project_id: i64,
    pub external_id: String,
    pub target: Target,
}

impl Processor<DeleteRecipientPreference> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteRecipientPreference")]
    async fn process(&self, query: DeleteRecipientPreference) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM preferences
            WHERE project_id = $1
              AND recipient_external_id = $2
              AND channel = $3
              AND topic = $4
              AND event = $5
            "#,
        )
        .bind(query.project_id)
        .bind(query.external_id)
        .bind(query.target.channel.as_str())
        .bind(query.target.topic.as_str())
        .bind(query.target.event.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
