
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keystone_application::AuditRepository;
use keystone_core::{AppError, AppResult, Environment, PlatformId, PlatformScope};
use keystone_domain::AuditRecord;
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed append-only audit trail.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditTrailRow {
    event_id: Uuid,
    platform_id: String,
    env: String,
    event_type: String,
    object_id: String,
    object: Value,
    changes_requested: Option<Value>,
    created_date: DateTime<Utc>,
}

impl AuditTrailRow {
    fn into_record(self) -> AppResult<AuditRecord> {
        let env = self.env.parse::<Environment>().map_err(|error| {
            AppError::Internal(format!("invalid audit entry '{}': {error}", self.event_id))
        })?;
        let scope = PlatformScope::new(PlatformId::new(self.platform_id)?, env);

        Ok(AuditRecord::restore(
            self.event_id,
            scope,
            self.event_type,
            self.object_id,
            into_object(self.object),
            self.changes_requested.map(into_object),
            self.created_date,
        ))
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(object) => object,
        _ => Map::new(),
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_record(&self, record: AuditRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_trail_entries (
                event_id,
                platform_id,
                env,
                event_type,
                object_id,
                object,
                changes_requested,
                created_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (object_id, event_type, created_date) DO NOTHING
            "#,
        )
        .bind(record.event_id())
        .bind(record.scope().platform_id().as_str())
        .bind(record.scope().env().as_str())
        .bind(record.event_type())
        .bind(record.object_id())
        .bind(Value::Object(record.object().clone()))
        .bind(record.changes_requested().cloned().map(Value::Object))
        .bind(record.created_date())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to append audit entry {} for '{}': {error}",
                record.event_type(),
                record.object_id()
            ))
        })?;

        Ok(())
    }

    async fn list_for_object(
        &self,
        scope: &PlatformScope,
        object_id: &str,
    ) -> AppResult<Vec<AuditRecord>> {
        let rows = sqlx::query_as::<_, AuditTrailRow>(
            r#"
            SELECT
                event_id,
                platform_id,
                env,
                event_type,
                object_id,
                object,
                changes_requested,
                created_date
            FROM audit_trail_entries
            WHERE platform_id = $1 AND env = $2 AND object_id = $3
            ORDER BY created_date ASC, recorded_at ASC
            "#,
        )
        .bind(scope.platform_id().as_str())
        .bind(scope.env().as_str())
        .bind(object_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list audit entries for '{object_id}' in scope '{scope}': {error}"
            ))
        })?;

        rows.into_iter().map(AuditTrailRow::into_record).collect()
    }
}
