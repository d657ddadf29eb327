use async_trait::async_trait;
use keystone_core::{AppResult, PlatformScope};
use keystone_domain::{ResourceRecord, WriteSet};
use serde_json::{Map, Value};

use super::ListPlan;

/// Port for scoped resource record persistence.
///
/// Every call is confined to one platform scope and resource type.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Point lookup by id.
    async fn find_record(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        record_id: &str,
    ) -> AppResult<Option<ResourceRecord>>;

    /// Inserts a record stamped with the current time.
    ///
    /// Returns `Conflict` when the id is already taken.
    async fn insert_record(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        record_id: &str,
        data: Map<String, Value>,
    ) -> AppResult<ResourceRecord>;

    /// Applies a write set and bumps `updatedDate` in one atomic step.
    ///
    /// Returns `None` when no record matched.
    async fn update_record(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        record_id: &str,
        write_set: &WriteSet,
    ) -> AppResult<Option<ResourceRecord>>;

    /// Deletes a record. Returns whether a row was removed.
    async fn delete_record(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        record_id: &str,
    ) -> AppResult<bool>;

    /// Runs a list scan.
    async fn query_records(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        plan: &ListPlan,
    ) -> AppResult<Vec<ResourceRecord>>;
}
