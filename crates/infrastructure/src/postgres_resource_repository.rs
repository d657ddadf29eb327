mod query;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keystone_application::{ListPlan, ResourceRepository};
use keystone_core::{AppError, AppResult, Operation, PlatformScope, ResourceRef};
use keystone_domain::{ResourceRecord, WriteSet};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

/// PostgreSQL-backed resource datastore.
#[derive(Clone)]
pub struct PostgresResourceRepository {
    pool: PgPool,
}

impl PostgresResourceRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ResourceRecordRow {
    id: String,
    created_date: DateTime<Utc>,
    updated_date: DateTime<Utc>,
    data: Value,
}

impl ResourceRecordRow {
    fn into_record(self) -> AppResult<ResourceRecord> {
        let Value::Object(data) = self.data else {
            return Err(AppError::Internal(format!(
                "resource record '{}' has non-object data",
                self.id
            )));
        };

        ResourceRecord::new(self.id, self.created_date, self.updated_date, data)
    }
}

const RECORD_COLUMNS: &str = "id, created_date, updated_date, data";

fn push_scope_predicate(
    builder: &mut QueryBuilder<'_, Postgres>,
    scope: &PlatformScope,
    resource_type: &str,
) {
    builder.push("platform_id = ");
    builder.push_bind(scope.platform_id().as_str().to_owned());
    builder.push(" AND env = ");
    builder.push_bind(scope.env().as_str());
    builder.push(" AND resource_type = ");
    builder.push_bind(resource_type.to_owned());
}

#[async_trait]
impl ResourceRepository for PostgresResourceRepository {
    async fn find_record(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        record_id: &str,
    ) -> AppResult<Option<ResourceRecord>> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {RECORD_COLUMNS} FROM resource_records WHERE "));
        push_scope_predicate(&mut builder, scope, resource_type);
        builder.push(" AND id = ");
        builder.push_bind(record_id);

        let row = builder
            .build_query_as::<ResourceRecordRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to find {resource_type} '{record_id}' in scope '{scope}': {error}"
                ))
            })?;

        row.map(ResourceRecordRow::into_record).transpose()
    }

    async fn insert_record(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        record_id: &str,
        data: Map<String, Value>,
    ) -> AppResult<ResourceRecord> {
        let result = sqlx::query_as::<_, ResourceRecordRow>(
            r#"
            INSERT INTO resource_records (
                id,
                platform_id,
                env,
                resource_type,
                created_date,
                updated_date,
                data
            )
            VALUES (
                $1,
                $2,
                $3,
                $4,
                date_trunc('milliseconds', now()),
                date_trunc('milliseconds', now()),
                $5
            )
            RETURNING id, created_date, updated_date, data
            "#,
        )
        .bind(record_id)
        .bind(scope.platform_id().as_str())
        .bind(scope.env().as_str())
        .bind(resource_type)
        .bind(Value::Object(data))
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => row.into_record(),
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.code().as_deref() == Some("23505")
                {
                    return Err(AppError::Conflict(ResourceRef::new(
                        resource_type,
                        record_id,
                        Operation::Create,
                    )));
                }

                Err(AppError::Internal(format!(
                    "failed to insert {resource_type} '{record_id}' in scope '{scope}': {error}"
                )))
            }
        }
    }

    async fn update_record(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        record_id: &str,
        write_set: &WriteSet,
    ) -> AppResult<Option<ResourceRecord>> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            r#"
            UPDATE resource_records
            SET updated_date = GREATEST(date_trunc('milliseconds', now()), updated_date),
                data = "#,
        );
        query::push_write_set(&mut builder, write_set);
        builder.push(" WHERE ");
        push_scope_predicate(&mut builder, scope, resource_type);
        builder.push(" AND id = ");
        builder.push_bind(record_id);
        builder.push(" RETURNING ");
        builder.push(RECORD_COLUMNS);

        let row = builder
            .build_query_as::<ResourceRecordRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to update {resource_type} '{record_id}' in scope '{scope}': {error}"
                ))
            })?;

        row.map(ResourceRecordRow::into_record).transpose()
    }

    async fn delete_record(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        record_id: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM resource_records
            WHERE platform_id = $1 AND env = $2 AND resource_type = $3 AND id = $4
            "#,
        )
        .bind(scope.platform_id().as_str())
        .bind(scope.env().as_str())
        .bind(resource_type)
        .bind(record_id)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete {resource_type} '{record_id}' in scope '{scope}': {error}"
            ))
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn query_records(
        &self,
        scope: &PlatformScope,
        resource_type: &str,
        plan: &ListPlan,
    ) -> AppResult<Vec<ResourceRecord>> {
        let limit = i64::try_from(plan.limit).map_err(|error| {
            AppError::InvalidQuery(format!("invalid list query limit: {error}"))
        })?;

        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {RECORD_COLUMNS} FROM resource_records WHERE "));
        push_scope_predicate(&mut builder, scope, resource_type);
        for filter in &plan.filters {
            builder.push(" AND ");
            query::push_filter(&mut builder, filter)?;
        }
        if let Some(boundary) = &plan.after {
            builder.push(" AND ");
            query::push_keyset(&mut builder, plan, boundary)?;
        }
        query::push_order(&mut builder, plan);
        builder.push(" LIMIT ");
        builder.push_bind(limit);

        let rows = builder
            .build_query_as::<ResourceRecordRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list {resource_type} records in scope '{scope}': {error}"
                ))
            })?;

        rows.into_iter().map(ResourceRecordRow::into_record).collect()
    }
}
