use chrono::{DateTime, Utc};
use keystone_application::{KeysetBoundary, ListCondition, ListFilter, ListPlan};
use keystone_core::{AppError, AppResult};
use keystone_domain::{FieldSource, SortDirection, WriteSet, parse_timestamp};
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

/// Pushes the new `data` value: replacements first, then one `jsonb_set` per merged document.
pub(super) fn push_write_set(builder: &mut QueryBuilder<'_, Postgres>, write_set: &WriteSet) {
    let merges = write_set.merges();
    for _ in 0..merges.len() {
        builder.push("jsonb_set(");
    }

    builder.push("(data || ");
    builder.push_bind(Value::Object(write_set.replacements().clone()));
    builder.push(")");

    for (field, patch) in merges {
        builder.push(", ARRAY[");
        builder.push_bind(field.clone());
        builder.push("]::text[], CASE WHEN jsonb_typeof(data -> ");
        builder.push_bind(field.clone());
        builder.push(") = 'object' THEN data -> ");
        builder.push_bind(field.clone());
        builder.push(" ELSE '{}'::jsonb END || ");
        builder.push_bind(Value::Object(patch.clone()));
        builder.push(")");
    }
}

pub(super) fn push_filter(
    builder: &mut QueryBuilder<'_, Postgres>,
    filter: &ListFilter,
) -> AppResult<()> {
    let field = filter.field.as_str();

    match &filter.condition {
        ListCondition::InList(values) => {
            if values.is_empty() {
                builder.push("FALSE");
                return Ok(());
            }

            builder.push("(");
            for (index, value) in values.iter().enumerate() {
                if index > 0 {
                    builder.push(" OR ");
                }
                push_comparison(builder, field, "=", value)?;
            }
            builder.push(")");
        }
        ListCondition::Exact(value) => push_comparison(builder, field, "=", value)?,
        ListCondition::Range { lower, upper } => {
            builder.push("(TRUE");
            if let Some(lower) = lower {
                builder.push(" AND ");
                push_bound(builder, field, ">=", lower)?;
            }
            if let Some(upper) = upper {
                builder.push(" AND ");
                push_bound(builder, field, "<=", upper)?;
            }
            builder.push(")");
        }
    }

    Ok(())
}

/// Data-field bounds only match values of the bound's JSON type; strings compare bytewise.
fn push_bound(
    builder: &mut QueryBuilder<'_, Postgres>,
    field: &str,
    operator: &str,
    bound: &Value,
) -> AppResult<()> {
    if FieldSource::of(field) != FieldSource::Data {
        return push_comparison(builder, field, operator, bound);
    }

    builder.push("(jsonb_typeof(data -> ");
    builder.push_bind(field.to_owned());
    builder.push(") = jsonb_typeof(");
    builder.push_bind(bound.clone());
    builder.push(") AND ");
    match bound {
        Value::String(text) => {
            push_sort_expression(builder, field);
            builder.push(format!(" {operator} "));
            builder.push_bind(text.clone());
        }
        _ => {
            builder.push("data -> ");
            builder.push_bind(field.to_owned());
            builder.push(format!(" {operator} "));
            builder.push_bind(bound.clone());
        }
    }
    builder.push(")");

    Ok(())
}

fn push_comparison(
    builder: &mut QueryBuilder<'_, Postgres>,
    field: &str,
    operator: &str,
    value: &Value,
) -> AppResult<()> {
    match FieldSource::of(field) {
        FieldSource::CreatedDate | FieldSource::UpdatedDate => {
            push_sort_expression(builder, field);
            builder.push(format!(" {operator} "));
            builder.push_bind(timestamp_value(field, value)?);
        }
        FieldSource::Id => {
            push_sort_expression(builder, field);
            builder.push(format!(" {operator} "));
            builder.push_bind(text_value(field, value)?);
        }
        FieldSource::Data => {
            builder.push("data -> ");
            builder.push_bind(field.to_owned());
            builder.push(format!(" {operator} "));
            builder.push_bind(value.clone());
        }
    }

    Ok(())
}

/// `(sort > v) OR (sort = v AND id > i)`, operators flipped for descending scans.
pub(super) fn push_keyset(
    builder: &mut QueryBuilder<'_, Postgres>,
    plan: &ListPlan,
    boundary: &KeysetBoundary,
) -> AppResult<()> {
    let field = plan.sort_field.as_str();

    builder.push("(");
    push_sort_expression(builder, field);
    builder.push(format!(" {} ", beyond_operator(plan.sort_direction)));
    push_sort_value(builder, field, &boundary.sort_value)?;
    builder.push(" OR (");
    push_sort_expression(builder, field);
    builder.push(" = ");
    push_sort_value(builder, field, &boundary.sort_value)?;
    builder.push(format!(
        " AND id COLLATE \"C\" {} ",
        beyond_operator(plan.id_direction)
    ));
    builder.push_bind(boundary.id.clone());
    builder.push("))");

    Ok(())
}

pub(super) fn push_order(builder: &mut QueryBuilder<'_, Postgres>, plan: &ListPlan) {
    builder.push(" ORDER BY ");
    push_sort_expression(builder, plan.sort_field.as_str());
    builder.push(direction_keyword(plan.sort_direction));
    builder.push(", id COLLATE \"C\"");
    builder.push(direction_keyword(plan.id_direction));
}

fn push_sort_expression(builder: &mut QueryBuilder<'_, Postgres>, field: &str) {
    match FieldSource::of(field) {
        FieldSource::Id => {
            builder.push("id COLLATE \"C\"");
        }
        FieldSource::CreatedDate => {
            builder.push("created_date");
        }
        FieldSource::UpdatedDate => {
            builder.push("updated_date");
        }
        FieldSource::Data => {
            builder.push("(data ->> ");
            builder.push_bind(field.to_owned());
            builder.push(") COLLATE \"C\"");
        }
    }
}

fn push_sort_value(
    builder: &mut QueryBuilder<'_, Postgres>,
    field: &str,
    value: &Value,
) -> AppResult<()> {
    if FieldSource::of(field).is_timestamp() {
        builder.push_bind(timestamp_value(field, value)?);
    } else {
        builder.push_bind(text_value(field, value)?);
    }

    Ok(())
}

fn beyond_operator(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => ">",
        SortDirection::Desc => "<",
    }
}

fn direction_keyword(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => " ASC",
        SortDirection::Desc => " DESC",
    }
}

fn timestamp_value(field: &str, value: &Value) -> AppResult<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|text| parse_timestamp(text).ok())
        .ok_or_else(|| AppError::InvalidQuery(format!("'{field}' expects a timestamp")))
}

fn text_value(field: &str, value: &Value) -> AppResult<String> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| AppError::InvalidQuery(format!("'{field}' expects a string")))
}
