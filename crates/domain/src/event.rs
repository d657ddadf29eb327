use std::str::FromStr;

use chrono::{DateTime, Utc};
use keystone_core::{AppError, PlatformScope};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::exposure::{AccessScope, ExposureFilter};
use crate::record::{ResourceRecord, current_timestamp};
use crate::resource::ResourceDefinition;

/// Kind of completed mutation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainEventKind {
    /// Record inserted.
    Created,
    /// Record partially updated.
    Updated,
    /// Record deleted.
    Deleted,
}

impl DomainEventKind {
    /// Every kind, in lifecycle order.
    pub const ALL: [Self; 3] = [Self::Created, Self::Updated, Self::Deleted];

    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }

    /// Returns the suffix appended to the resource key in bus event names.
    #[must_use]
    pub fn event_suffix(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Deleted => "Deleted",
        }
    }
}

impl FromStr for DomainEventKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "deleted" => Ok(Self::Deleted),
            _ => Err(AppError::Validation(format!(
                "unknown domain event kind '{value}'"
            ))),
        }
    }
}

/// Immutable fact describing one completed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Mutation kind.
    pub kind: DomainEventKind,
    /// Resource type key.
    pub resource_type: String,
    /// Partition the mutation ran in.
    pub scope: PlatformScope,
    /// Identifier of the mutated record.
    pub object_id: String,
    /// Full exposed snapshot: post-mutation, or last known before deletion.
    pub object: Map<String, Value>,
    /// Exposed caller patch; updates only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes_requested: Option<Map<String, Value>>,
    /// Record timestamp for creations and updates, wall clock for deletions.
    pub event_date: DateTime<Utc>,
}

impl DomainEvent {
    /// Describes a creation.
    #[must_use]
    pub fn created(
        definition: &ResourceDefinition,
        scope: &PlatformScope,
        record: &ResourceRecord,
    ) -> Self {
        Self {
            kind: DomainEventKind::Created,
            resource_type: definition.resource_type().to_owned(),
            scope: scope.clone(),
            object_id: record.id().to_owned(),
            object: snapshot(definition, scope, record),
            changes_requested: None,
            event_date: record.created_date(),
        }
    }

    /// Describes an update together with the patch the caller supplied.
    #[must_use]
    pub fn updated(
        definition: &ResourceDefinition,
        scope: &PlatformScope,
        record: &ResourceRecord,
        patch: &Map<String, Value>,
    ) -> Self {
        Self {
            kind: DomainEventKind::Updated,
            resource_type: definition.resource_type().to_owned(),
            scope: scope.clone(),
            object_id: record.id().to_owned(),
            object: snapshot(definition, scope, record),
            changes_requested: Some(
                ExposureFilter::new(definition).expose_object(patch, &AccessScope::All),
            ),
            event_date: record.updated_date(),
        }
    }

    /// Describes a deletion from the last known snapshot.
    #[must_use]
    pub fn deleted(
        definition: &ResourceDefinition,
        scope: &PlatformScope,
        last_known: &ResourceRecord,
    ) -> Self {
        Self {
            kind: DomainEventKind::Deleted,
            resource_type: definition.resource_type().to_owned(),
            scope: scope.clone(),
            object_id: last_known.id().to_owned(),
            object: snapshot(definition, scope, last_known),
            changes_requested: None,
            event_date: current_timestamp(),
        }
    }

    /// Returns the bus event name, for example `k360Deleted`.
    #[must_use]
    pub fn event_name(&self) -> String {
        format!("{}{}", self.resource_type, self.kind.event_suffix())
    }

    /// Returns the audit-trail type, for example `k360__deleted`.
    #[must_use]
    pub fn audit_type(&self) -> String {
        format!("{}__{}", self.resource_type, self.kind.as_str())
    }
}

fn snapshot(
    definition: &ResourceDefinition,
    scope: &PlatformScope,
    record: &ResourceRecord,
) -> Map<String, Value> {
    ExposureFilter::new(definition).expose_record(record, &AccessScope::All, scope.env())
}

/// Append-only audit-trail entry derived from a domain event.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    event_id: Uuid,
    scope: PlatformScope,
    event_type: String,
    object_id: String,
    object: Map<String, Value>,
    changes_requested: Option<Map<String, Value>>,
    created_date: DateTime<Utc>,
}

impl AuditRecord {
    /// Builds the audit entry for an event.
    #[must_use]
    pub fn from_event(event: &DomainEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            scope: event.scope.clone(),
            event_type: event.audit_type(),
            object_id: event.object_id.clone(),
            object: event.object.clone(),
            changes_requested: event.changes_requested.clone(),
            created_date: event.event_date,
        }
    }

    /// Rehydrates a stored audit entry.
    #[must_use]
    pub fn restore(
        event_id: Uuid,
        scope: PlatformScope,
        event_type: String,
        object_id: String,
        object: Map<String, Value>,
        changes_requested: Option<Map<String, Value>>,
        created_date: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            scope,
            event_type,
            object_id,
            object,
            changes_requested,
            created_date,
        }
    }

    /// Returns the entry identifier.
    #[must_use]
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Returns the partition of the audited record.
    #[must_use]
    pub fn scope(&self) -> &PlatformScope {
        &self.scope
    }

    /// Returns the audit type, for example `k360__updated`.
    #[must_use]
    pub fn event_type(&self) -> &str {
        self.event_type.as_str()
    }

    /// Returns the audited record identifier.
    #[must_use]
    pub fn object_id(&self) -> &str {
        self.object_id.as_str()
    }

    /// Returns the audited snapshot.
    #[must_use]
    pub fn object(&self) -> &Map<String, Value> {
        &self.object
    }

    /// Returns the caller patch for updates.
    #[must_use]
    pub fn changes_requested(&self) -> Option<&Map<String, Value>> {
        self.changes_requested.as_ref()
    }

    /// Returns the event date.
    #[must_use]
    pub fn created_date(&self) -> DateTime<Utc> {
        self.created_date
    }

    /// Returns the key under which duplicate deliveries collapse.
    #[must_use]
    pub fn idempotency_key(&self) -> (&str, &str, DateTime<Utc>) {
        (
            self.object_id.as_str(),
            self.event_type.as_str(),
            self.created_date,
        )
    }
}
