mod write;


use std::sync::Arc;

use keystone_core::{AppError, AppResult, Operation, PlatformScope, ResourceRef};
use keystone_domain::{AccessScope, ExposureFilter, ResourceDefinition, ResourceRecord};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::list_query_engine::{ListParams, ListQueryEngine, Page};
use crate::resource_ports::{EventPublisher, IdGenerator, ResourceRepository};

/// Caller partition and audience of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Platform and environment the request runs in.
    pub scope: PlatformScope,
    /// Audience results are projected for; never [`AccessScope::All`].
    pub access: AccessScope,
}

impl RequestContext {
    /// Creates a request context.
    #[must_use]
    pub fn new(scope: PlatformScope, access: AccessScope) -> Self {
        Self { scope, access }
    }
}

/// Identifier returned by a remove, whether or not the record still existed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedResource {
    /// Removed record identifier.
    pub id: String,
}

/// List, read, create, update and remove for one declared resource type.
#[derive(Clone)]
pub struct ResourceService {
    definition: Arc<ResourceDefinition>,
    repository: Arc<dyn ResourceRepository>,
    id_generator: Arc<dyn IdGenerator>,
    publisher: Arc<dyn EventPublisher>,
}

impl ResourceService {
    /// Creates a resource service from its collaborators.
    #[must_use]
    pub fn new(
        definition: Arc<ResourceDefinition>,
        repository: Arc<dyn ResourceRepository>,
        id_generator: Arc<dyn IdGenerator>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            definition,
            repository,
            id_generator,
            publisher,
        }
    }

    /// Returns the served resource definition.
    #[must_use]
    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    /// Returns one page of exposed records.
    pub async fn list(
        &self,
        context: &RequestContext,
        params: &ListParams,
    ) -> AppResult<Page<Map<String, Value>>> {
        self.ensure_external(context)?;
        let page = ListQueryEngine::new(&self.definition)
            .execute(self.repository.as_ref(), &context.scope, params)
            .await?;

        Ok(page.map(|record| self.expose(context, &record)))
    }

    /// Returns one exposed record.
    pub async fn read(
        &self,
        context: &RequestContext,
        record_id: &str,
    ) -> AppResult<Map<String, Value>> {
        self.ensure_external(context)?;
        let record = self
            .require_record(&context.scope, record_id, Operation::Read)
            .await?;
        Ok(self.expose(context, &record))
    }

    async fn require_record(
        &self,
        scope: &PlatformScope,
        record_id: &str,
        operation: Operation,
    ) -> AppResult<ResourceRecord> {
        self.repository
            .find_record(scope, self.definition.resource_type(), record_id)
            .await?
            .ok_or_else(|| AppError::NotFound(self.resource_ref(record_id, operation)))
    }

    /// The `*` projection is reserved for audit snapshots.
    fn ensure_external(&self, context: &RequestContext) -> AppResult<()> {
        if context.access == AccessScope::All {
            return Err(AppError::Validation(format!(
                "access scope '*' cannot be used to serve resource '{}'",
                self.definition.resource_type()
            )));
        }

        Ok(())
    }

    fn resource_ref(&self, record_id: &str, operation: Operation) -> ResourceRef {
        ResourceRef::new(self.definition.resource_type(), record_id, operation)
    }

    fn expose(&self, context: &RequestContext, record: &ResourceRecord) -> Map<String, Value> {
        ExposureFilter::new(&self.definition).expose_record(
            record,
            &context.access,
            context.scope.env(),
        )
    }
}
