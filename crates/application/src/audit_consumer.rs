use std::sync::Arc;

use async_trait::async_trait;
use keystone_core::AppResult;
use keystone_domain::{AuditRecord, DomainEvent};

use crate::resource_ports::{AuditRepository, EventConsumer};

/// Appends one audit-trail entry per domain event.
#[derive(Clone)]
pub struct AuditTrailConsumer {
    repository: Arc<dyn AuditRepository>,
}

impl AuditTrailConsumer {
    /// Creates a consumer writing to the given audit trail.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl EventConsumer for AuditTrailConsumer {
    fn name(&self) -> &str {
        "audit_trail"
    }

    async fn consume(&self, event: &DomainEvent) -> AppResult<()> {
        self.repository
            .append_record(AuditRecord::from_event(event))
            .await
    }
}
