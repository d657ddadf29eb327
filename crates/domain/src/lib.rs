//! Domain entities and invariants.

#![forbid(unsafe_code)]

pub mod catalog;
mod event;
mod exposure;
mod patch;
mod record;
mod resource;

pub use event::{AuditRecord, DomainEvent, DomainEventKind};
pub use exposure::{AccessScope, ExposureFilter};
pub use patch::{WriteSet, merge_document};
pub use record::{
    CREATED_DATE_FIELD, FieldSource, ID_FIELD, ResourceRecord, SYSTEM_FIELDS, UPDATED_DATE_FIELD,
    current_timestamp, format_timestamp, parse_timestamp,
};
pub use resource::{
    FieldDefinition, FieldKind, FilterDefinition, FilterKind, LIVEMODE_FIELD,
    ResourceDefinition, ResourceDefinitionInput, SortDirection,
};
