use crate::framework::DatabaseProcessor;
use herald_sdk::objects::admin::Project as SdkProject;
use kanau::processor::Processor;
use time::OffsetDateTime;

const PROJECT_COLUMNS: &str = "id, user_id, name, created_at";

/// Tenant root. Every other tenant row hangs off a project.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: OffsetDateTime,
}

impl Project {
    pub fn to_object(&self) -> SdkProject {
        SdkProject {
            id: self.id,
            user_id: self.user_id,
            name: self.name.clone(),
            created_at: super::unix(self.created_at),
        }
    }

    /// Delete the project row itself. Children must be gone already.
    pub async fn delete_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        project_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(project_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Create a project. Fails with a unique violation when the user already
/// owns a project with the same name.
pub struct CreateProject {
    pub user_id: i64,
    pub name: String,
}

impl Processor<CreateProject> for DatabaseProcessor {
    type Output = Project;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreateProject")]
    async fn process(&self, insert: CreateProject) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (user_id, name) VALUES ($1, $2) RETURNING {PROJECT_COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(insert.user_id)
            .bind(insert.name)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetProjectById {
    pub project_id: i64,
}

impl Processor<GetProjectById> for DatabaseProcessor {
    type Output = Option<Project>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetProjectById")]
    async fn process(&self, query: GetProjectById) -> Result<Option<Project>, sqlx::Error> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&sql)
            .bind(query.project_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct ListProjectsForUser {
    pub user_id: i64,
}

impl Processor<ListProjectsForUser> for DatabaseProcessor {
    type Output = Vec<Project>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListProjectsForUser")]
    async fn process(&self, query: ListProjectsForUser) -> Result<Vec<Project>, sqlx::Error> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = $1 ORDER BY id");
        sqlx::query_as::<_, Project>(&sql)
            .bind(query.user_id)
            .fetch_all(&self.pool)
            .await
    }
}
