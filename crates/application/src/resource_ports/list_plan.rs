use keystone_domain::SortDirection;
use serde_json::Value;

/// Predicate applied to one field.
///
/// Timestamp values arrive as canonical millisecond strings.
#[derive(Debug, Clone, PartialEq)]
pub enum ListCondition {
    /// Field equals any listed value. An empty list matches nothing.
    InList(Vec<Value>),
    /// Inclusive bounds; at least one is present.
    Range {
        /// Lower bound.
        lower: Option<Value>,
        /// Upper bound.
        upper: Option<Value>,
    },
    /// Field equals the value.
    Exact(Value),
}

/// Condition bound to a field name.
#[derive(Debug, Clone, PartialEq)]
pub struct ListFilter {
    /// Field name, system or data.
    pub field: String,
    /// Condition to satisfy.
    pub condition: ListCondition,
}

/// Sort position rows must lie strictly beyond.
#[derive(Debug, Clone, PartialEq)]
pub struct KeysetBoundary {
    /// Sort-field value of the boundary row.
    pub sort_value: Value,
    /// Identifier of the boundary row.
    pub id: String,
}

/// Datastore-level scan: conjunctive filters, keyset boundary, ordering and limit.
///
/// Rows are ordered by `sort_field` in `sort_direction`, ties broken by id in
/// `id_direction`. "Beyond the boundary" follows that same ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPlan {
    /// Filters, all of which must hold.
    pub filters: Vec<ListFilter>,
    /// Ordering field.
    pub sort_field: String,
    /// Direction of the ordering field.
    pub sort_direction: SortDirection,
    /// Direction of the id tiebreaker.
    pub id_direction: SortDirection,
    /// Optional keyset boundary.
    pub after: Option<KeysetBoundary>,
    /// Maximum rows returned.
    pub limit: usize,
}
