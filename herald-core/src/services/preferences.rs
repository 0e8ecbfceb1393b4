use super::{ProjectContext, ServiceError, conflict_on_unique};
use crate::entities::preference::{
    CreateProjectPreference, DeleteProjectPreference, DeleteRecipientPreference,
    ListProjectPreferences, ListRecipientPreferences, Preference, UpsertRecipientPreference,
};
use crate::entities::recipient::{GetRecipient, normalize_external_id};
use crate::framework::DatabaseProcessor;
use crate::resolution::{Candidate, ResolvePreference, Scope, resolve};
use herald_sdk::objects::Validate;
use herald_sdk::objects::preference::{
    CreateProjectPreferenceRequest, EffectivePreference, PreferenceCheckResponse,
    ProjectPreference, RecipientPreference, TargetQuery, UpsertRecipientPreferenceRequest,
};
use kanau::processor::Processor;

pub struct PreferenceService {
    db: DatabaseProcessor,
}

impl PreferenceService {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }

    pub async fn create_project_preference(
        &self,
        ctx: ProjectContext,
        request: CreateProjectPreferenceRequest,
    ) -> Result<ProjectPreference, ServiceError> {
        request.validate()?;
        let preference = self
            .db
            .process(CreateProjectPreference {
                project_id: ctx.project_id,
                target: request.target,
                label: request.label.trim().to_string(),
                default_enabled: request.default_enabled,
            })
            .await
            .map_err(|e| conflict_on_unique(e, "A preference for this target already exists"))?;
        Ok(preference.to_project_object())
    }

    pub async fn list_project_preferences(
        &self,
        ctx: ProjectContext,
    ) -> Result<Vec<ProjectPreference>, ServiceError> {
        let preferences = self
            .db
            .process(ListProjectPreferences {
                project_id: ctx.project_id,
            })
            .await?;
        Ok(preferences.iter().map(Preference::to_project_object).collect())
    }

    pub async fn delete_project_preference(
        &self,
        ctx: ProjectContext,
        preference_id: i64,
    ) -> Result<(), ServiceError> {
        let deleted = self
            .db
            .process(DeleteProjectPreference {
                project_id: ctx.project_id,
                preference_id,
            })
            .await?;
        if deleted {
            Ok(())
        } else {
            Err(ServiceError::NotFound("preference"))
        }
    }

    async fn require_recipient(
        &self,
        ctx: ProjectContext,
        recipient_id: &str,
    ) -> Result<String, ServiceError> {
        let external_id = normalize_external_id(recipient_id);
        self.db
            .process(GetRecipient {
                project_id: ctx.project_id,
                external_id: external_id.clone(),
            })
            .await?
            .ok_or(ServiceError::NotFound("recipient"))?;
        Ok(external_id)
    }

    /// Set the recipient's override for one target.
    pub async fn upsert_recipient_preference(
        &self,
        ctx: ProjectContext,
        recipient_id: &str,
        request: UpsertRecipientPreferenceRequest,
    ) -> Result<RecipientPreference, ServiceError> {
        request.validate()?;
        let external_id = self.require_recipient(ctx, recipient_id).await?;
        let preference = self
            .db
            .process(UpsertRecipientPreference {
                project_id: ctx.project_id,
                external_id,
                target: request.target(),
                enabled: request.enabled,
            })
            .await?;
        Ok(preference.to_recipient_object())
    }

    /// The recipient's effective state for every target the project defines.
    pub async fn list_recipient_preferences(
        &self,
        ctx: ProjectContext,
        recipient_id: &str,
    ) -> Result<Vec<EffectivePreference>, ServiceError> {
        let external_id = self.require_recipient(ctx, recipient_id).await?;
        let project = self
            .db
            .process(ListProjectPreferences {
                project_id: ctx.project_id,
            })
            .await?;
        let overrides = self
            .db
            .process(ListRecipientPreferences {
                project_id: ctx.project_id,
                external_id,
            })
            .await?;
        Ok(effective_preferences(&project, &overrides))
    }

    /// Remove an override so the target falls back to the project default.
    pub async fn delete_recipient_preference(
        &self,
        ctx: ProjectContext,
        recipient_id: &str,
        query: TargetQuery,
    ) -> Result<(), ServiceError> {
        query.validate_as_preference()?;
        let external_id = self.require_recipient(ctx, recipient_id).await?;
        let deleted = self
            .db
            .process(DeleteRecipientPreference {
                project_id: ctx.project_id,
                external_id,
                target: query.into_target(),
            })
            .await?;
        if deleted {
            Ok(())
        } else {
            Err(ServiceError::NotFound("preference"))
        }
    }

    /// Resolve one target for a recipient.
    ///
    /// Unknown recipients resolve like recipients without overrides.
    pub async fn check(
        &self,
        ctx: ProjectContext,
        recipient_id: &str,
        query: TargetQuery,
    ) -> Result<PreferenceCheckResponse, ServiceError> {
        query.validate_as_notification()?;
        let target = query.into_target();
        let resolution = self
            .db
            .process(ResolvePreference {
                project_id: ctx.project_id,
                external_id: normalize_external_id(recipient_id),
                target: target.clone(),
            })
            .await?;
        Ok(PreferenceCheckResponse {
            target,
            state: resolution.into(),
        })
    }
}

/// Resolve each project-level target against the project rows plus the
/// recipient's overrides.
///
/// A wildcard project target such as `(posts, any, new_comment)` resolves
/// through the same order as a notification would, so a recipient's `any`
/// override governs it.
fn effective_preferences(
    project: &[Preference],
    overrides: &[Preference],
) -> Vec<EffectivePreference> {
    project
        .iter()
        .map(|definition| {
            let target = definition.target();
            let candidates: Vec<Candidate> = project
                .iter()
                .chain(overrides)
                .filter(|p| p.channel == target.channel && p.event == target.event)
                .map(|p| Candidate {
                    scope: if p.is_project_level() {
                        Scope::Project
                    } else {
                        Scope::Recipient
                    },
                    topic: p.topic.clone(),
                    enabled: p.enabled,
                })
                .collect();
            EffectivePreference {
                state: resolve(&candidates, &target).into(),
                label: definition.label.clone().unwrap_or_default(),
                target,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn row(recipient: Option<&str>, topic: &str, enabled: bool) -> Preference {
        Preference {
            id: 0,
            project_id: 1,
            recipient_external_id: recipient.map(str::to_owned),
            channel: "posts".into(),
            topic: topic.into(),
            event: "new_comment".into(),
            label: recipient.is_none().then(|| format!("Comments on {topic}")),
            enabled,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_effective_state_without_overrides_is_inherited() {
        let project = [row(None, "any", false)];
        let effective = effective_preferences(&project, &[]);
        assert_eq!(effective.len(), 1);
        assert!(!effective[0].state.enabled);
        assert!(effective[0].state.inherited);
        assert_eq!(effective[0].label, "Comments on any");
    }

    #[test]
    fn test_effective_state_with_override() {
        let project = [row(None, "rust", false), row(None, "go", true)];
        let overrides = [row(Some("alice"), "rust", true), row(Some("alice"), "any", false)];
        let effective = effective_preferences(&project, &overrides);

        let rust = &effective[0];
        assert_eq!(rust.target.topic, "rust");
        assert!(rust.state.enabled);
        assert!(!rust.state.inherited);

        // The recipient's wildcard override wins over the project's exact default.
        let go = &effective[1];
        assert_eq!(go.target.topic, "go");
        assert!(!go.state.enabled);
        assert!(!go.state.inherited);
    }
}
