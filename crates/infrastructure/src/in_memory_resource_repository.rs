mod matching;


use std::collections::HashMap;

use async_trait::async_trait;
use keystone_application::{ListPlan, ResourceRepository};
use keystone_core::{AppError, AppResult, Operation, PlatformScope, ResourceRef};
use keystone_domain::{ResourceRecord, WriteSet, current_timestamp};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use matching::{compare_rows, is_beyond, matches_filter};

type RecordKey = (PlatformScope, String, String);

/// In-memory resource datastore.
///
/// Write sets are applied under the write lock, so document merges are atomic.
#[derive(Debug, Default)]
pub struct InMemoryResourceRepository {
    records: RwLock<HashMap<RecordKey, ResourceRecord>>,
}

impl InMemoryResourceRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn record_key(scope: &PlatformScope, resource_type: &str, record_id: &str) -> RecordKey {
    (scope.clone(), resource_type.to_owned(), record_id.to_owned())
}

#[async_trait]
impl ResourceRepository for InMemoryResourceRepository {
    async fn find_record(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        record_id: &str,
    ) -> AppResult<Option<ResourceRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(&record_key(scope, resource_type, record_id))
            .cloned())
    }

    async fn insert_record(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        record_id: &str,
        data: Map<String, Value>,
    ) -> AppResult<ResourceRecord> {
        let mut records = self.records.write().await;

        // Identifiers are unique across scopes and types.
        if records.keys().any(|(_, _, stored_id)| stored_id == record_id) {
            return Err(AppError::Conflict(ResourceRef::new(
                resource_type,
                record_id,
                Operation::Create,
            )));
        }

        let now = current_timestamp();
        let record = ResourceRecord::new(record_id, now, now, data)?;
        records.insert(record_key(scope, resource_type, record_id), record.clone());
        Ok(record)
    }

    async fn update_record(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        record_id: &str,
        write_set: &WriteSet,
    ) -> AppResult<Option<ResourceRecord>> {
        let mut records = self.records.write().await;
        let Some(stored) = records.get_mut(&record_key(scope, resource_type, record_id)) else {
            return Ok(None);
        };

        let mut data = stored.data().clone();
        write_set.apply_to(&mut data);
        let updated = ResourceRecord::new(
            record_id,
            stored.created_date(),
            current_timestamp().max(stored.updated_date()),
            data,
        )?;
        *stored = updated.clone();

        Ok(Some(updated))
    }

    async fn delete_record(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        record_id: &str,
    ) -> AppResult<bool> {
        Ok(self
            .records
            .write()
            .await
            .remove(&record_key(scope, resource_type, record_id))
            .is_some())
    }

    async fn query_records(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        plan: &ListPlan,
    ) -> AppResult<Vec<ResourceRecord>> {
        let records = self.records.read().await;

        let mut rows: Vec<ResourceRecord> = records
            .iter()
            .filter(|((stored_scope, stored_type, _), _)| {
                stored_scope == scope && stored_type == resource_type
            })
            .map(|(_, record)| record)
            .filter(|record| plan.filters.iter().all(|filter| matches_filter(record, filter)))
            .filter(|record| {
                plan.after
                    .as_ref()
                    .is_none_or(|boundary| is_beyond(record, plan, boundary))
            })
            .cloned()
            .collect();

        rows.sort_by(|left, right| compare_rows(left, right, plan));
        rows.truncate(plan.limit);
        Ok(rows)
    }
}
