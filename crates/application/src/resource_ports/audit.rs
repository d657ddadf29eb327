use async_trait::async_trait;
use keystone_core::{AppResult, PlatformScope};
use keystone_domain::AuditRecord;

/// Port for the append-only audit trail.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Appends one entry. Entries sharing an idempotency key are stored once.
    async fn append_record(&self, record: AuditRecord) -> AppResult<()>;

    /// Lists entries for one record, oldest first.
    async fn list_for_object(
        &self,
        scope: &PlatformScope,
        object_id: &str,
    ) -> AppResult<Vec<AuditRecord>>;
}
