use std::collections::HashMap;
use std::sync::Arc;

use keystone_core::{AppError, AppResult, PlatformScope};
use keystone_domain::{AccessScope, ResourceDefinition};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::event_bus::EventBus;
use crate::list_query_engine::{ListParams, Page};
use crate::resource_ports::{EventPublisher, IdGenerator, ResourceRepository};
use crate::resource_service::{RemovedResource, RequestContext, ResourceService};

/// Operation requested on a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceIntent {
    /// One page of records.
    List(ListParams),
    /// One record by id.
    Read {
        /// Record identifier.
        id: String,
    },
    /// New record from a payload.
    Create {
        /// Client-writable fields.
        payload: Map<String, Value>,
    },
    /// Partial update of one record.
    Update {
        /// Record identifier.
        id: String,
        /// Fields to replace or merge.
        patch: Map<String, Value>,
    },
    /// Idempotent removal of one record.
    Remove {
        /// Record identifier.
        id: String,
    },
}

/// Typed request routed to the service owning `resource_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequest {
    /// Resource type key.
    pub resource_type: String,
    /// Partition the request runs in.
    pub scope: PlatformScope,
    /// Audience results are projected for.
    pub access: AccessScope,
    /// Requested operation.
    pub intent: ResourceIntent,
}

/// Result of a dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceReply {
    /// List page.
    Page(Page<Map<String, Value>>),
    /// Exposed record.
    Entity(Map<String, Value>),
    /// Identifier of a removed record.
    Removed(RemovedResource),
}

/// Start-up owned set of resource services sharing one datastore and bus.
pub struct ServiceContext {
    services: HashMap<String, ResourceService>,
    event_bus: Option<EventBus>,
}

impl ServiceContext {
    /// Builds services that publish onto a local event bus owned by the context.
    pub fn with_event_bus(
        catalog: Vec<ResourceDefinition>,
        repository: Arc<dyn ResourceRepository>,
        id_generator: Arc<dyn IdGenerator>,
        event_bus: EventBus,
    ) -> AppResult<Self> {
        let publisher: Arc<dyn EventPublisher> = Arc::new(event_bus.publisher());
        let mut context = Self::with_publisher(catalog, repository, id_generator, publisher)?;
        context.event_bus = Some(event_bus);
        Ok(context)
    }

    /// Builds services that publish through an external transport.
    pub fn with_publisher(
        catalog: Vec<ResourceDefinition>,
        repository: Arc<dyn ResourceRepository>,
        id_generator: Arc<dyn IdGenerator>,
        publisher: Arc<dyn EventPublisher>,
    ) -> AppResult<Self> {
        let mut services = HashMap::with_capacity(catalog.len());
        for definition in catalog {
            let resource_type = definition.resource_type().to_owned();
            let service = ResourceService::new(
                Arc::new(definition),
                Arc::clone(&repository),
                Arc::clone(&id_generator),
                Arc::clone(&publisher),
            );

            if services.insert(resource_type.clone(), service).is_some() {
                return Err(AppError::Validation(format!(
                    "resource '{resource_type}' is declared twice"
                )));
            }
        }

        info!(resources = services.len(), "service context started");
        Ok(Self {
            services,
            event_bus: None,
        })
    }

    /// Returns the service for a resource type.
    pub fn service(&self, resource_type: &str) -> AppResult<&ResourceService> {
        self.services.get(resource_type).ok_or_else(|| {
            AppError::Validation(format!("unknown resource type '{resource_type}'"))
        })
    }

    /// Routes a request to its resource service.
    pub async fn dispatch(&self, request: ResourceRequest) -> AppResult<ResourceReply> {
        let service = self.service(request.resource_type.as_str())?;
        let context = RequestContext::new(request.scope, request.access);

        match request.intent {
            ResourceIntent::List(params) => {
                service.list(&context, &params).await.map(ResourceReply::Page)
            }
            ResourceIntent::Read { id } => {
                service.read(&context, &id).await.map(ResourceReply::Entity)
            }
            ResourceIntent::Create { payload } => service
                .create(&context, &payload)
                .await
                .map(ResourceReply::Entity),
            ResourceIntent::Update { id, patch } => service
                .update(&context, &id, &patch)
                .await
                .map(ResourceReply::Entity),
            ResourceIntent::Remove { id } => service
                .remove(&context, &id)
                .await
                .map(ResourceReply::Removed),
        }
    }

    /// Tears the context down, draining the owned event bus.
    pub async fn stop(self) {
        if let Some(event_bus) = self.event_bus {
            event_bus.shutdown().await;
        }
        info!("service context stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use keystone_core::{AppError, AppResult, Environment, PlatformId, PlatformScope};
    use keystone_domain::catalog::builtin_catalog;
    use keystone_domain::{AccessScope, ResourceRecord, WriteSet};
    use serde_json::{Map, Value};

    use super::{ResourceIntent, ResourceReply, ResourceRequest, ServiceContext};
    use crate::EventBus;
    use crate::resource_ports::{IdGenerator, ListPlan, ResourceRepository};

    struct EmptyRepository;

    #[async_trait]
    impl ResourceRepository for EmptyRepository {
        async fn find_record(
            &self,
            _scope: &PlatformScope,
            _resource_type: &str,
            _record_id: &str,
        ) -> AppResult<Option<ResourceRecord>> {
            Ok(None)
        }

        async fn insert_record(
            &self,
            _scope: &PlatformScope,
            _resource_type: &str,
            _record_id: &str,
            _data: Map<String, Value>,
        ) -> AppResult<ResourceRecord> {
            Err(AppError::Internal("read-only".to_owned()))
        }

        async fn update_record(
            &self,
            _scope: &PlatformScope,
            _resource_type: &str,
            _record_id: &str,
            _write_set: &WriteSet,
        ) -> AppResult<Option<ResourceRecord>> {
            Ok(None)
        }

        async fn delete_record(
            &self,
            _scope: &PlatformScope,
            _resource_type: &str,
            _record_id: &str,
        ) -> AppResult<bool> {
            Ok(false)
        }

        async fn query_records(
            &self,
            _scope: &PlatformScope,
            _resource_type: &str,
            _plan: &ListPlan,
        ) -> AppResult<Vec<ResourceRecord>> {
            Ok(Vec::new())
        }
    }

    struct NoIds;

    #[async_trait]
    impl IdGenerator for NoIds {
        async fn generate_id(&self, _scope: &PlatformScope, prefix: &str) -> AppResult<String> {
            Ok(format!("{prefix}_x"))
        }
    }

    fn request(resource_type: &str, intent: ResourceIntent) -> ResourceRequest {
        ResourceRequest {
            resource_type: resource_type.to_owned(),
            scope: PlatformScope::new(
                PlatformId::new("1").unwrap_or_else(|_| unreachable!()),
                Environment::Live,
            ),
            access: AccessScope::Api,
            intent,
        }
    }

    fn context() -> ServiceContext {
        ServiceContext::with_event_bus(
            builtin_catalog().unwrap_or_else(|_| unreachable!()),
            Arc::new(EmptyRepository),
            Arc::new(NoIds),
            EventBus::builder().start(),
        )
        .unwrap_or_else(|_| unreachable!())
    }

    #[tokio::test]
    async fn routes_by_resource_type() {
        let context = context();

        let removed = context
            .dispatch(request(
                "k360academydata",
                ResourceIntent::Remove {
                    id: "k360ad_gone".to_owned(),
                },
            ))
            .await
            .unwrap_or_else(|_| unreachable!());
        let encoded = serde_json::to_value(&removed).unwrap_or_default();
        assert_eq!(encoded, serde_json::json!({"id": "k360ad_gone"}));

        let read = context
            .dispatch(request(
                "k360",
                ResourceIntent::Read {
                    id: "k360_gone".to_owned(),
                },
            ))
            .await;
        assert!(matches!(read, Err(AppError::NotFound(_))));

        context.stop().await;
    }

    #[tokio::test]
    async fn unknown_resource_type_is_rejected() {
        let context = context();
        let result = context
            .dispatch(request("invoice", ResourceIntent::List(Default::default())))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        context.stop().await;
    }

    #[tokio::test]
    async fn audit_scope_requests_are_rejected() {
        let context = context();
        let mut read = request(
            "k360",
            ResourceIntent::Read {
                id: "k360_a".to_owned(),
            },
        );
        read.access = AccessScope::All;

        let result = context.dispatch(read).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        context.stop().await;
    }

    #[tokio::test]
    async fn list_reply_serializes_page_metadata() {
        let context = context();
        let reply = context
            .dispatch(request("k360", ResourceIntent::List(Default::default())))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(matches!(reply, ResourceReply::Page(_)));

        let encoded = serde_json::to_value(&reply).unwrap_or_default();
        assert_eq!(
            encoded,
            serde_json::json!({
                "results": [],
                "nbResultsPerPage": 20,
                "hasPreviousPage": false,
                "hasNextPage": false
            })
        );
        context.stop().await;
    }
}
