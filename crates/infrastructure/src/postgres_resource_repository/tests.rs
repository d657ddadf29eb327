use keystone_application::{
    FilterParam, ListCondition, ListFilter, ListParams, ListPlan, ListQueryEngine,
    ResourceRepository,
};
use keystone_core::{AppError, Environment, PlatformId, PlatformScope};
use keystone_domain::{ResourceRecord, SortDirection, WriteSet};
use keystone_domain::catalog::k360_definition;
use serde_json::{Map, Value, json};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresResourceRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres resource tests: {error}");
    }

    Some(pool)
}

fn isolated_scope() -> PlatformScope {
    PlatformScope::new(
        PlatformId::new(Uuid::new_v4().to_string()).unwrap_or_else(|_| unreachable!()),
        Environment::Test,
    )
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn unique_id() -> String {
    format!("k360_{}", Uuid::new_v4().simple())
}

#[tokio::test]
async fn update_merges_documents_in_one_statement() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresResourceRepository::new(pool);
    let scope = isolated_scope();
    let id = unique_id();

    let inserted = repository
        .insert_record(
            &scope,
            "k360",
            &id,
            object(json!({
                "name": "a",
                "parentId": "k360_p",
                "metadata": {"x": 1, "y": 2},
                "platformData": {}
            })),
        )
        .await
        .unwrap_or_else(|error| panic!("insert failed: {error}"));

    let mut write_set = WriteSet::new();
    write_set.replace("parentId", Value::Null);
    write_set.merge("metadata", object(json!({"y": 3, "z": null})));
    write_set.merge("platformData", object(json!({"tier": "gold"})));

    let updated = repository
        .update_record(&scope, "k360", &id, &write_set)
        .await
        .unwrap_or_else(|error| panic!("update failed: {error}"))
        .unwrap_or_else(|| unreachable!());

    assert_eq!(
        Value::Object(updated.data().clone()),
        json!({
            "name": "a",
            "parentId": null,
            "metadata": {"x": 1, "y": 3, "z": null},
            "platformData": {"tier": "gold"}
        })
    );
    assert_eq!(updated.created_date(), inserted.created_date());
    assert!(updated.updated_date() >= inserted.updated_date());
}

#[tokio::test]
async fn duplicate_identifier_is_a_conflict_and_delete_reports_rows() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresResourceRepository::new(pool);
    let scope = isolated_scope();
    let id = unique_id();

    assert!(repository.insert_record(&scope, "k360", &id, Map::new()).await.is_ok());
    let duplicate = repository.insert_record(&scope, "k360", &id, Map::new()).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    assert!(matches!(
        repository.delete_record(&scope, "k360", &id).await,
        Ok(true)
    ));
    assert!(matches!(
        repository.delete_record(&scope, "k360", &id).await,
        Ok(false)
    ));
    assert!(matches!(
        repository.find_record(&scope, "k360", &id).await,
        Ok(None)
    ));
}

#[tokio::test]
async fn keyset_pages_cover_filtered_rows_once() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresResourceRepository::new(pool);
    let scope = isolated_scope();
    let definition = k360_definition().unwrap_or_else(|_| unreachable!());

    let mut expected = Vec::new();
    for index in 0..5 {
        let id = format!("k360_{index:02}_{}", Uuid::new_v4().simple());
        let record = repository
            .insert_record(
                &scope,
                "k360",
                &id,
                object(json!({"name": format!("child {index}"), "parentId": "k360_root"})),
            )
            .await
            .unwrap_or_else(|error| panic!("insert failed: {error}"));
        expected.push(record.id().to_owned());
        let _ = repository
            .insert_record(
                &scope,
                "k360",
                &unique_id(),
                object(json!({"name": "other", "parentId": "k360_elsewhere"})),
            )
            .await;
    }

    let engine = ListQueryEngine::new(&definition);
    let base = ListParams {
        order: Some("asc".to_owned()),
        nb_results_per_page: Some(2),
        ..ListParams::default()
    }
    .with_filter("parentId", FilterParam::Values(vec![json!("k360_root")]));

    let mut collected = Vec::new();
    let mut cursor = None;
    loop {
        let page = engine
            .execute(
                &repository,
                &scope,
                &ListParams {
                    starting_after: cursor.clone(),
                    ..base.clone()
                },
            )
            .await
            .unwrap_or_else(|error| panic!("list failed: {error}"));
        collected.extend(page.results.iter().map(|record| record.id().to_owned()));
        if !page.meta.has_next_page {
            break;
        }
        cursor = page.meta.end_cursor;
    }

    // Rows sharing a createdDate fall back to id order.
    let mut sorted_by_id = expected.clone();
    sorted_by_id.sort();
    assert_eq!(collected.len(), expected.len());
    let mut collected_sorted = collected.clone();
    collected_sorted.sort();
    assert_eq!(collected_sorted, sorted_by_id);
}

#[tokio::test]
async fn data_range_filters_only_match_values_of_the_bound_type() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresResourceRepository::new(pool);
    let scope = isolated_scope();
    let mut ids = Vec::new();
    for rank in [json!("a"), json!("b"), json!("c"), json!(5), Value::Null] {
        let id = format!("ranked_{}", Uuid::new_v4().simple());
        assert!(
            repository
                .insert_record(&scope, "ranked", &id, object(json!({"rank": rank})))
                .await
                .is_ok()
        );
        ids.push(id);
    }

    let plan = |lower: Option<Value>, upper: Option<Value>| ListPlan {
        filters: vec![ListFilter {
            field: "rank".to_owned(),
            condition: ListCondition::Range { lower, upper },
        }],
        sort_field: "createdDate".to_owned(),
        sort_direction: SortDirection::Asc,
        id_direction: SortDirection::Asc,
        after: None,
        limit: 10,
    };
    let matched = |records: Vec<ResourceRecord>| {
        let mut found: Vec<String> = records.iter().map(|record| record.id().to_owned()).collect();
        found.sort();
        found
    };
    let mut expected = vec![ids[0].clone(), ids[1].clone()];
    expected.sort();

    let bounded = repository
        .query_records(&scope, "ranked", &plan(Some(json!("a")), Some(json!("b"))))
        .await
        .unwrap_or_default();
    assert_eq!(matched(bounded), expected);

    let upper_only = repository
        .query_records(&scope, "ranked", &plan(None, Some(json!("b"))))
        .await
        .unwrap_or_default();
    assert_eq!(matched(upper_only), expected);

    let numeric = repository
        .query_records(&scope, "ranked", &plan(Some(json!(1)), None))
        .await
        .unwrap_or_default();
    assert_eq!(matched(numeric), vec![ids[3].clone()]);
}
