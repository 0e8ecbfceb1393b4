use crate::framework::{DatabaseAccessor, DatabaseProcessor};
use herald_sdk::objects::recipient::Recipient as SdkRecipient;
use kanau::processor::Processor;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

const RECIPIENT_COLUMNS: &str = "id, project_id, external_id, name, created_at, updated_at";

/// Normalize a client-supplied recipient id.
///
/// Every lookup by external id goes through this, so rows and queries
/// always agree on case.
pub fn normalize_external_id(external_id: &str) -> String {
    external_id.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Recipient {
    pub id: i64,
    pub project_id: i64,
    /// Always lower-cased, see [`normalize_external_id`].
    pub external_id: String,
    pub name: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Recipient {
    pub fn to_object(&self) -> SdkRecipient {
        SdkRecipient {
            recipient_id: self.external_id.clone(),
            name: self.name.clone(),
            created_at: super::unix(self.created_at),
            updated_at: super::unix(self.updated_at),
        }
    }

    /// Insert the recipient unless it already exists.
    ///
    /// `external_id` must already be normalized.
    pub async fn create_if_missing(
        db: &mut impl DatabaseAccessor,
        project_id: i64,
        external_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO recipients (project_id, external_id)
            VALUES ($1, $2)
            ON CONFLICT (project_id, external_id) DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(external_id)
        .execute(db.acquire())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        project_id: i64,
        external_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM recipients WHERE project_id = $1 AND external_id = $2")
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
        let result = sqlx::query("DELETE FROM recipients WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Create a recipient. Fails with a unique violation on a duplicate id.
pub struct CreateRecipient {
    pub project_id: i64,
    /// Must already be normalized.
    pub external_id: String,
    pub name: Option<String>,
}

impl Processor<CreateRecipient> for DatabaseProcessor {
    type Output = Recipient;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreateRecipient")]
    async fn process(&self, insert: CreateRecipient) -> Result<Recipient, sqlx::Error> {
        let sql = format!(
            "INSERT INTO recipients (project_id, external_id, name) VALUES ($1, $2, $3) \
             RETURNING {RECIPIENT_COLUMNS}"
        );
        sqlx::query_as::<_, Recipient>(&sql)
            .bind(insert.project_id)
            .bind(insert.external_id)
            .bind(insert.name)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetRecipient {
    pub project_id: i64,
    pub external_id: String,
}

impl Processor<GetRecipient> for DatabaseProcessor {
    type Output = Option<Recipient>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetRecipient")]
    async fn process(&self, query: GetRecipient) -> Result<Option<Recipient>, sqlx::Error> {
        let sql = format!(
            "SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE project_id = $1 AND external_id = $2"
        );
        sqlx::query_as::<_, Recipient>(&sql)
            .bind(query.project_id)
            .bind(query.external_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct ListRecipients {
    pub project_id: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Processor<ListRecipients> for DatabaseProcessor {
    type Output = Vec<Recipient>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListRecipients")]
    async fn process(&self, query: ListRecipients) -> Result<Vec<Recipient>, sqlx::Error> {
        let sql = format!(
            "SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE project_id = $1 \
             ORDER BY id DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Recipient>(&sql)
            .bind(query.project_id)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Replace a recipient's name. `None` clears it.
pub struct UpdateRecipient {
    pub project_id: i64,
    /// Must already be normalized.
    pub external_id: String,
    pub name: Option<String>,
}

impl Processor<UpdateRecipient> for DatabaseProcessor {
    type Output = Option<Recipient>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateRecipient")]
    async fn process(&self, update: UpdateRecipient) -> Result<Option<Recipient>, sqlx::Error> {
        let sql = format!(
            "UPDATE recipients SET name = $3, updated_at = now() \
             WHERE project_id = $1 AND external_id = $2 RETURNING {RECIPIENT_COLUMNS}"
        );
        sqlx::query_as::<_, Recipient>(&sql)
            .bind(update.project_id)
            .bind(update.external_id)
            .bind(update.name)
            .fetch_optional(&self.pool)
            .await
    }
}

/// One row written by [`UpsertRecipients`].
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UpsertedRecipient {
    pub external_id: String,
    /// `false` when an existing recipient was updated.
    pub inserted: bool,
}

#[derive(Debug, Clone)]
/// Insert recipients, or replace the name of those that already exist.
///
/// External ids must be normalized and unique within the batch.
pub struct UpsertRecipients {
    pub project_id: i64,
    pub recipients: Vec<(String, Option<String>)>,
}

impl Processor<UpsertRecipients> for DatabaseProcessor {
    type Output = Vec<UpsertedRecipient>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertRecipients")]
    async fn process(&self, upsert: UpsertRecipients) -> Result<Vec<UpsertedRecipient>, sqlx::Error> {
        if upsert.recipients.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipients (project_id, external_id, name) ");
        builder.push_values(&upsert.recipients, |mut row, (external_id, name)| {
            row.push_bind(upsert.project_id)
                .push_bind(external_id.clone())
                .push_bind(name.clone());
        });
        // xmax is zero only on rows this statement inserted.
        builder.push(
            " ON CONFLICT (project_id, external_id) \
             DO UPDATE SET name = EXCLUDED.name, updated_at = now() \
             RETURNING external_id, (xmax = 0) AS inserted",
        );
        builder
            .build_query_as::<UpsertedRecipient>()
            .fetch_all(&self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_external_id() {
        assert_eq!(normalize_external_id("  Alice@Example.COM "), "alice@example.com");
        assert_eq!(normalize_external_id("user-42"), "user-42");
    }
}
