use std::cmp::Ordering;

use keystone_application::{KeysetBoundary, ListCondition, ListFilter, ListPlan};
use keystone_domain::{ResourceRecord, SortDirection};
use serde_json::Value;

fn field_value(record: &ResourceRecord, field: &str) -> Value {
    record.field_value(field).unwrap_or(Value::Null)
}

/// Total order over scalar JSON values; values of different types order by type.
fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::String(left), Value::String(right)) => left.cmp(right),
        (Value::Number(left), Value::Number(right)) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(left), Value::Bool(right)) => left.cmp(right),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

pub(super) fn matches_filter(record: &ResourceRecord, filter: &ListFilter) -> bool {
    let value = field_value(record, filter.field.as_str());

    match &filter.condition {
        ListCondition::InList(values) => values.contains(&value),
        ListCondition::Exact(expected) => &value == expected,
        ListCondition::Range { lower, upper } => {
            lower
                .as_ref()
                .is_none_or(|lower| within_bound(&value, lower, Ordering::Less))
                && upper
                    .as_ref()
                    .is_none_or(|upper| within_bound(&value, upper, Ordering::Greater))
        }
    }
}

/// Values of another JSON type than the bound never satisfy it.
fn within_bound(value: &Value, bound: &Value, outside: Ordering) -> bool {
    type_rank(value) == type_rank(bound) && compare_values(value, bound) != outside
}

pub(super) fn compare_rows(
    left: &ResourceRecord,
    right: &ResourceRecord,
    plan: &ListPlan,
) -> Ordering {
    let field = plan.sort_field.as_str();
    directed(
        compare_values(&field_value(left, field), &field_value(right, field)),
        plan.sort_direction,
    )
    .then_with(|| directed(left.id().cmp(right.id()), plan.id_direction))
}

/// Whether a row lies strictly after the boundary in scan order.
pub(super) fn is_beyond(
    record: &ResourceRecord,
    plan: &ListPlan,
    boundary: &KeysetBoundary,
) -> bool {
    let value = field_value(record, plan.sort_field.as_str());

    match directed(
        compare_values(&value, &boundary.sort_value),
        plan.sort_direction,
    ) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => {
            directed(record.id().cmp(boundary.id.as_str()), plan.id_direction) == Ordering::Greater
        }
    }
}
