//! Project administration and API-key authentication.

use super::{ProjectContext, ServiceError, conflict_on_unique};
use crate::config::ApiKeysConfig;
use crate::entities::api_key::{
    ApiKey as ApiKeyRow, ApiKeyOwner, CreateApiKey, GetApiKeyOwner, ListApiKeys,
};
use crate::entities::project::{CreateProject, GetProjectById, ListProjectsForUser, Project as ProjectRow};
use crate::entities::{ApiKeyScope, unix};
use crate::framework::DatabaseProcessor;
use crate::processors::DeleteProjectDataPayload;
use crate::queue::TaskQueue;
use herald_sdk::api_key::generate_token;
use herald_sdk::objects::Validate;
use herald_sdk::objects::admin::{
    ApiKey, CreateApiKeyRequest, CreateProjectRequest, CreatedApiKey, Project,
};
use kanau::processor::Processor;
use tracing::info;

pub struct ProjectService {
    db: DatabaseProcessor,
    queue: TaskQueue,
}

impl ProjectService {
    pub fn new(db: DatabaseProcessor, queue: TaskQueue) -> Self {
        Self { db, queue }
    }

    pub async fn create(&self, request: CreateProjectRequest) -> Result<Project, ServiceError> {
        request.validate()?;
        let project = self
            .db
            .process(CreateProject {
                user_id: request.user_id,
                name: request.name.trim().to_string(),
            })
            .await
            .map_err(|e| conflict_on_unique(e, "A project with this name already exists"))?;
        info!(project_id = project.id, user_id = project.user_id, "Project created");
        Ok(project.to_object())
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Project>, ServiceError> {
        let projects = self.db.process(ListProjectsForUser { user_id }).await?;
        Ok(projects.iter().map(ProjectRow::to_object).collect())
    }

    /// Schedule deletion of the project and everything under it.
    pub async fn delete(&self, project_id: i64) -> Result<(), ServiceError> {
        self.db
            .process(GetProjectById { project_id })
            .await?
            .ok_or(ServiceError::NotFound("project"))?;
        let task_id = self.queue.enqueue(&DeleteProjectDataPayload { project_id }).await?;
        info!(project_id, task_id, "Project deletion scheduled");
        Ok(())
    }

    /// Issue a new key. The plaintext token is only returned here.
    pub async fn create_api_key(
        &self,
        project_id: i64,
        request: CreateApiKeyRequest,
        keys: &ApiKeysConfig,
    ) -> Result<CreatedApiKey, ServiceError> {
        request.validate()?;
        self.db
            .process(GetProjectById { project_id })
            .await?
            .ok_or(ServiceError::NotFound("project"))?;

        let token = generate_token();
        let key = self
            .db
            .process(CreateApiKey {
                project_id,
                name: request.name.trim().to_string(),
                token_hash: keys.hash_token(&token),
                scope: request.scope.into(),
            })
            .await?;
        info!(project_id, api_key_id = key.id, scope = ?key.scope, "API key created");
        Ok(CreatedApiKey {
            id: key.id,
            project_id: key.project_id,
            name: key.name,
            scope: key.scope.into(),
            token,
            created_at: unix(key.created_at),
        })
    }

    /// Keys of a project, oldest first, without their tokens.
    pub async fn list_api_keys(&self, project_id: i64) -> Result<Vec<ApiKey>, ServiceError> {
        self.db
            .process(GetProjectById { project_id })
            .await?
            .ok_or(ServiceError::NotFound("project"))?;
        let keys = self.db.process(ListApiKeys { project_id }).await?;
        Ok(keys.iter().map(ApiKeyRow::to_object).collect())
    }
}

/// The authenticated caller of a tenant endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub api_key_id: i64,
    pub context: ProjectContext,
    pub scope: ApiKeyScope,
}

impl Caller {
    /// Full-scope keys may do everything, recipient keys only
    /// recipient-facing operations.
    pub fn require_full_scope(&self) -> Result<(), ServiceError> {
        match self.scope {
            ApiKeyScope::Full => Ok(()),
            ApiKeyScope::Recipient => Err(ServiceError::Forbidden),
        }
    }
}

impl From<ApiKeyOwner> for Caller {
    fn from(owner: ApiKeyOwner) -> Self {
        Caller {
            api_key_id: owner.api_key_id,
            context: ProjectContext {
                project_id: owner.project_id,
                user_id: owner.user_id,
            },
            scope: owner.scope,
        }
    }
}

/// Resolve a bearer token to its caller.
pub async fn authenticate(
    db: &DatabaseProcessor,
    keys: &ApiKeysConfig,
    token: &str,
) -> Result<Caller, ServiceError> {
    db.process(GetApiKeyOwner {
        token_hash: keys.hash_token(token),
    })
    .await?
    .map(Caller::from)
    .ok_or(ServiceError::Unauthorized)
}
