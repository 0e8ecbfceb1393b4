use crate::entities::ApiKeyScope;
use crate::framework::DatabaseProcessor;
use herald_sdk::objects::admin::ApiKey as SdkApiKey;
use kanau::processor::Processor;
use time::OffsetDateTime;

/// A stored API key. Only the HMAC hash of the token is kept.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ApiKey {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub token_hash: String,
    pub scope: ApiKeyScope,
    pub created_at: OffsetDateTime,
}

/// The caller identity an API key resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct ApiKeyOwner {
    pub api_key_id: i64,
    pub project_id: i64,
    pub user_id: i64,
    pub scope: ApiKeyScope,
}

#[derive(Debug, Clone)]
pub struct CreateApiKey {
    pub project_id: i64,
    pub name: String,
    pub token_hash: String,
    pub scope: ApiKeyScope,
}

impl Processor<CreateApiKey> for DatabaseProcessor {
    type Output = ApiKey;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreateApiKey")]
    async fn process(&self, insert: CreateApiKey) -> Result<ApiKey, sqlx::Error> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (project_id, name, token_hash, scope)
            VALUES ($1, $2, $3, $4)
            RETURNING id, project_id, name, token_hash, scope, created_at
            "#,
        )
        .bind(insert.project_id)
        .bind(insert.name)
        .bind(insert.token_hash)
        .bind(insert.scope)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Resolve a token hash to the key's project, owning user and scope.
pub struct GetApiKeyOwner {
    pub token_hash: String,
}

impl Processor<GetApiKeyOwner> for DatabaseProcessor {
    type Output = Option<ApiKeyOwner>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetApiKeyOwner")]
    async fn process(&self, query: GetApiKeyOwner) -> Result<Option<ApiKeyOwner>, sqlx::Error> {
        sqlx::query_as::<_, ApiKeyOwner>(
            r#"
            SELECT k.id AS api_key_id, k.project_id, p.user_id, k.scope
            FROM api_keys k
            JOIN projects p ON p.id = k.project_id
            WHERE k.token_hash = $1
            "#,
        )
        .bind(query.token_hash)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListApiKeys {
    pub project_id: i64,
}

impl Processor<ListApiKeys> for DatabaseProcessor {
    type Output = Vec<ApiKey>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListApiKeys")]
    async fn process(&self, query: ListApiKeys) -> Result<Vec<ApiKey>, sqlx::Error> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT id, project_id, name, token_hash, scope, created_at
            FROM api_keys
            WHERE project_id = $1
            ORDER BY id
            "#,
        )
        .bind(query.project_id)
        .fetch_all(&self.pool)
        .await
    }
}

impl ApiKey {
    pub fn to_object(&self) -> SdkApiKey {
        SdkApiKey {
            id: self.id,
            project_id: self.project_id,
            name: self.name.clone(),
            scope: self.scope.into(),
            created_at: super::unix(self.created_at),
        }
    }

    pub async fn delete_for_project_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        project_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM api_keys WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }
}
