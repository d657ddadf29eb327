use keystone_core::{AppError, AppResult, Operation};
use keystone_domain::DomainEvent;
use serde_json::{Map, Value};
use tracing::warn;

use super::{RemovedResource, RequestContext, ResourceService};
use crate::merge_patch::MergePatchApplier;

impl ResourceService {
    /// Inserts a new record with declared defaults for omitted fields.
    pub async fn create(
        &self,
        context: &RequestContext,
        payload: &Map<String, Value>,
    ) -> AppResult<Map<String, Value>> {
        self.ensure_external(context)?;
        let data = self.definition.prepare_create_payload(payload)?;
        let record_id = self
            .id_generator
            .generate_id(&context.scope, self.definition.id_prefix())
            .await?;

        let record = self
            .repository
            .insert_record(
                &context.scope,
                self.definition.resource_type(),
                record_id.as_str(),
                data,
            )
            .await?;

        self.publish(DomainEvent::created(
            &self.definition,
            &context.scope,
            &record,
        ))
        .await;

        Ok(self.expose(context, &record))
    }

    /// Applies a partial update as one atomic datastore write.
    pub async fn update(
        &self,
        context: &RequestContext,
        record_id: &str,
        patch: &Map<String, Value>,
    ) -> AppResult<Map<String, Value>> {
        self.ensure_external(context)?;
        self.require_record(&context.scope, record_id, Operation::Update)
            .await?;
        let write_set = MergePatchApplier::new(&self.definition).write_set(patch)?;

        let record = self
            .repository
            .update_record(
                &context.scope,
                self.definition.resource_type(),
                record_id,
                &write_set,
            )
            .await?
            .ok_or_else(|| AppError::NotFound(self.resource_ref(record_id, Operation::Update)))?;

        self.publish(DomainEvent::updated(
            &self.definition,
            &context.scope,
            &record,
            patch,
        ))
        .await;

        Ok(self.expose(context, &record))
    }

    /// Deletes a record. Removing a missing record succeeds without an event.
    pub async fn remove(
        &self,
        context: &RequestContext,
        record_id: &str,
    ) -> AppResult<RemovedResource> {
        self.ensure_external(context)?;
        let removed = RemovedResource {
            id: record_id.to_owned(),
        };

        let Some(last_known) = self
            .repository
            .find_record(&context.scope, self.definition.resource_type(), record_id)
            .await?
        else {
            return Ok(removed);
        };

        let deleted = self
            .repository
            .delete_record(&context.scope, self.definition.resource_type(), record_id)
            .await?;

        // False when a concurrent remove deleted the row first.
        if deleted {
            self.publish(DomainEvent::deleted(
                &self.definition,
                &context.scope,
                &last_known,
            ))
            .await;
        }

        Ok(removed)
    }

    async fn publish(&self, event: DomainEvent) {
        let event_name = event.event_name();
        let resource_id = event.object_id.clone();

        if let Err(error) = self.publisher.publish(event).await {
            warn!(
                resource_type = self.definition.resource_type(),
                resource_id = %resource_id,
                event_name = %event_name,
                error = %error,
                "failed to publish resource event after a successful write"
            );
        }
    }
}
