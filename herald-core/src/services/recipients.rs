use super::{ProjectContext, ServiceError, conflict_on_unique};
use crate::entities::recipient::{
    CreateRecipient, GetRecipient, ListRecipients, Recipient as RecipientRow, UpdateRecipient,
    UpsertRecipients, normalize_external_id,
};
use crate::framework::DatabaseProcessor;
use crate::processors::DeleteRecipientDataPayload;
use crate::queue::TaskQueue;
use herald_sdk::objects::recipient::{
    BatchCreateRecipientsRequest, BatchCreateRecipientsResult, BatchRecipientFailure,
    BatchRecipientRef, CreateRecipientRequest, Recipient, UpdateRecipientRequest,
};
use herald_sdk::objects::{PageQuery, Validate, ValidationErrors, clamp_pagination};
use kanau::processor::Processor;
use std::collections::HashSet;
use tracing::info;

pub struct RecipientService {
    db: DatabaseProcessor,
    queue: TaskQueue,
}

impl RecipientService {
    pub fn new(db: DatabaseProcessor, queue: TaskQueue) -> Self {
        Self { db, queue }
    }

    pub async fn create(
        &self,
        ctx: ProjectContext,
        request: CreateRecipientRequest,
    ) -> Result<Recipient, ServiceError> {
        request.validate()?;
        let name = clean_name(request.name);
        let recipient = self
            .db
            .process(CreateRecipient {
                project_id: ctx.project_id,
                external_id: normalize_external_id(&request.recipient_id),
                name,
            })
            .await
            .map_err(|e| conflict_on_unique(e, "A recipient with this ID already exists"))?;
        Ok(recipient.to_object())
    }

    pub async fn get(&self, ctx: ProjectContext, recipient_id: &str) -> Result<Recipient, ServiceError> {
        let recipient = self
            .db
            .process(GetRecipient {
                project_id: ctx.project_id,
                external_id: normalize_external_id(recipient_id),
            })
            .await?
            .ok_or(ServiceError::NotFound("recipient"))?;
        Ok(recipient.to_object())
    }

    pub async fn list(&self, ctx: ProjectContext, page: PageQuery) -> Result<Vec<Recipient>, ServiceError> {
        let (limit, offset) = clamp_pagination(page.limit, page.offset);
        let recipients = self
            .db
            .process(ListRecipients {
                project_id: ctx.project_id,
                limit,
                offset,
            })
            .await?;
        Ok(recipients.iter().map(RecipientRow::to_object).collect())
    }

    pub async fn update(
        &self,
        ctx: ProjectContext,
        recipient_id: &str,
        request: UpdateRecipientRequest,
    ) -> Result<Recipient, ServiceError> {
        request.validate()?;
        let recipient = self
            .db
            .process(UpdateRecipient {
                project_id: ctx.project_id,
                external_id: normalize_external_id(recipient_id),
                name: clean_name(request.name),
            })
            .await?
            .ok_or(ServiceError::NotFound("recipient"))?;
        Ok(recipient.to_object())
    }

    /// Create or update every valid entry; invalid ones are reported back
    /// instead of failing the whole batch.
    pub async fn batch_create(
        &self,
        ctx: ProjectContext,
        request: BatchCreateRecipientsRequest,
    ) -> Result<BatchCreateRecipientsResult, ServiceError> {
        request.validate()?;
        let (rows, failed) = plan_batch(request.recipients);
        let written = self
            .db
            .process(UpsertRecipients {
                project_id: ctx.project_id,
                recipients: rows,
            })
            .await?;

        let mut result = BatchCreateRecipientsResult {
            failed,
            ..Default::default()
        };
        for row in written {
            let entry = BatchRecipientRef {
                recipient_id: row.external_id,
            };
            if row.inserted {
                result.created.push(entry);
            } else {
                result.updated.push(entry);
            }
        }
        info!(
            project_id = ctx.project_id,
            created = result.created.len(),
            updated = result.updated.len(),
            failed = result.failed.len(),
            "Recipients batch written"
        );
        Ok(result)
    }

    /// Schedule deletion of the recipient and all of their data.
    pub async fn delete(&self, ctx: ProjectContext, recipient_id: &str) -> Result<(), ServiceError> {
        let external_id = normalize_external_id(recipient_id);
        self.db
            .process(GetRecipient {
                project_id: ctx.project_id,
                external_id: external_id.clone(),
            })
            .await?
            .ok_or(ServiceError::NotFound("recipient"))?;
        let task_id = self
            .queue
            .enqueue(&DeleteRecipientDataPayload {
                project_id: ctx.project_id,
                recipient_id: external_id,
            })
            .await?;
        info!(project_id = ctx.project_id, task_id, "Recipient deletion scheduled");
        Ok(())
    }
}

fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Split a batch into rows to upsert and entries rejected up front.
///
/// An id repeated within the batch is kept at its first position; later
/// copies are rejected.
fn plan_batch(
    entries: Vec<CreateRecipientRequest>,
) -> (Vec<(String, Option<String>)>, Vec<BatchRecipientFailure>) {
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(entries.len());
    let mut failed = Vec::new();
    for (batch_index, entry) in entries.into_iter().enumerate() {
        if let Err(errors) = entry.validate() {
            failed.push(BatchRecipientFailure {
                recipient_id: entry.recipient_id,
                batch_index,
                errors: errors.into_inner(),
            });
            continue;
        }
        let external_id = normalize_external_id(&entry.recipient_id);
        if !seen.insert(external_id.clone()) {
            let errors = ValidationErrors::single(
                "Duplicate recipient ID",
                "The same recipient appears earlier in this batch",
                "recipient_id",
                &entry.recipient_id,
            );
            failed.push(BatchRecipientFailure {
                recipient_id: entry.recipient_id,
                batch_index,
                errors: errors.into_inner(),
            });
            continue;
        }
        rows.push((external_id, clean_name(entry.name)));
    }
    (rows, failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: Option<&str>) -> CreateRecipientRequest {
        CreateRecipientRequest {
            recipient_id: id.to_string(),
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_plan_batch_reports_invalid_entries_by_index() {
        let (rows, failed) = plan_batch(vec![
            entry("Alice", Some(" Alice ")),
            entry("", None),
            entry("bob", Some("  ")),
        ]);
        assert_eq!(
            rows,
            vec![
                ("alice".to_string(), Some("Alice".to_string())),
                ("bob".to_string(), None),
            ]
        );
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].batch_index, 1);
        assert_eq!(failed[0].errors[0].property, "recipient_id");
    }

    #[test]
    fn test_plan_batch_rejects_repeated_ids_after_normalizing() {
        let (rows, failed) = plan_batch(vec![entry("alice", None), entry(" ALICE ", Some("A"))]);
        assert_eq!(rows, vec![("alice".to_string(), None)]);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].batch_index, 1);
        assert_eq!(failed[0].recipient_id, " ALICE ");
    }
}
