use async_trait::async_trait;
use keystone_application::AuditRepository;
use keystone_core::{AppResult, PlatformScope};
use keystone_domain::AuditRecord;
use tokio::sync::RwLock;

/// In-memory append-only audit trail.
#[derive(Debug, Default)]
pub struct InMemoryAuditRepository {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditRepository {
    /// Creates an empty audit trail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append_record(&self, record: AuditRecord) -> AppResult<()> {
        let mut records = self.records.write().await;
        if records
            .iter()
            .any(|stored| stored.idempotency_key() == record.idempotency_key())
        {
            return Ok(());
        }

        records.push(record);
        Ok(())
    }

    async fn list_for_object(
        &self,
        scope: &PlatformScope,
        object_id: &str,
    ) -> AppResult<Vec<AuditRecord>> {
        let mut trail: Vec<AuditRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|record| record.scope() == scope && record.object_id() == object_id)
            .cloned()
            .collect();
        trail.sort_by_key(AuditRecord::created_date);
        Ok(trail)
    }
}
