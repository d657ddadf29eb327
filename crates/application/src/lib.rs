//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_consumer;
mod event_bus;
mod list_query_engine;
mod merge_patch;
mod resource_ports;
mod resource_service;
mod service_context;

pub use audit_consumer::AuditTrailConsumer;
pub use event_bus::{EventBus, EventBusBuilder, EventBusPublisher};
pub use list_query_engine::{
    DEFAULT_NB_RESULTS_PER_PAGE, FilterParam, ListParams, ListQueryEngine,
    MAX_NB_RESULTS_PER_PAGE, Page, PageMeta,
};
pub use merge_patch::MergePatchApplier;
pub use resource_ports::{
    AuditRepository, EventConsumer, EventPublisher, IdGenerator, KeysetBoundary, ListCondition,
    ListFilter, ListPlan, ResourceRepository,
};
pub use resource_service::{RemovedResource, RequestContext, ResourceService};
pub use service_context::{ResourceIntent, ResourceReply, ResourceRequest, ServiceContext};
