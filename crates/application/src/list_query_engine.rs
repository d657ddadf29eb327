mod cursor;


use std::collections::BTreeMap;

use keystone_core::{AppError, AppResult, PlatformScope};
use keystone_domain::{
    FieldSource, FilterKind, ResourceDefinition, ResourceRecord, SortDirection, format_timestamp,
    parse_timestamp,
};
use serde::Serialize;
use serde_json::Value;

use crate::resource_ports::{
    KeysetBoundary, ListCondition, ListFilter, ListPlan, ResourceRepository,
};

use cursor::PageCursor;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_NB_RESULTS_PER_PAGE: u32 = 20;
/// Largest accepted page size.
pub const MAX_NB_RESULTS_PER_PAGE: u32 = 100;

/// Raw value supplied for one declared list filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterParam {
    /// Values for set-membership and exact filters.
    Values(Vec<Value>),
    /// Bounds for range filters.
    Range {
        /// Inclusive lower bound.
        lower: Option<Value>,
        /// Inclusive upper bound.
        upper: Option<Value>,
    },
}

/// Declarative list request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListParams {
    /// Ordering field; defaults to the resource's declared default.
    pub order_by: Option<String>,
    /// `asc` or `desc`; defaults to the resource's declared default.
    pub order: Option<String>,
    /// Page size in `[1, 100]`.
    pub nb_results_per_page: Option<u32>,
    /// Cursor of the row the page starts after.
    pub starting_after: Option<String>,
    /// Cursor of the row the page ends before.
    pub ending_before: Option<String>,
    /// Filters keyed by declared parameter name.
    pub filters: BTreeMap<String, FilterParam>,
}

impl ListParams {
    /// Adds a filter parameter.
    #[must_use]
    pub fn with_filter(mut self, param: impl Into<String>, value: FilterParam) -> Self {
        self.filters.insert(param.into(), value);
        self
    }
}

/// Pagination metadata returned alongside each page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    /// Effective page size.
    pub nb_results_per_page: u32,
    /// Whether rows exist before the first result.
    pub has_previous_page: bool,
    /// Whether rows exist after the last result.
    pub has_next_page: bool,
    /// Cursor for `endingBefore`; present only with a previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
    /// Cursor for `startingAfter`; present only with a next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_cursor: Option<String>,
}

/// One page of list results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Results in the requested order.
    pub results: Vec<T>,
    /// Pagination metadata.
    #[serde(flatten)]
    pub meta: PageMeta,
}

impl<T> Page<T> {
    /// Transforms every result, keeping the metadata.
    pub fn map<U>(self, transform: impl FnMut(T) -> U) -> Page<U> {
        Page {
            results: self.results.into_iter().map(transform).collect(),
            meta: self.meta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanDirection {
    Forward,
    Backward,
}

/// Validated list request ready to run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PreparedList {
    plan: ListPlan,
    order_by: String,
    order: SortDirection,
    page_size: u32,
    direction: ScanDirection,
    resumed: bool,
}

impl PreparedList {
    fn into_page(self, mut records: Vec<ResourceRecord>) -> AppResult<Page<ResourceRecord>> {
        let page_size = self.page_size as usize;
        let has_more = records.len() > page_size;
        records.truncate(page_size);

        let (has_previous_page, has_next_page) = match self.direction {
            ScanDirection::Forward => (self.resumed, has_more),
            ScanDirection::Backward => {
                records.reverse();
                (has_more, true)
            }
        };

        let start_cursor = match records.first() {
            Some(record) if has_previous_page => Some(self.cursor_for(record)?),
            _ => None,
        };
        let end_cursor = match records.last() {
            Some(record) if has_next_page => Some(self.cursor_for(record)?),
            _ => None,
        };

        Ok(Page {
            results: records,
            meta: PageMeta {
                nb_results_per_page: self.page_size,
                has_previous_page,
                has_next_page,
                start_cursor,
                end_cursor,
            },
        })
    }

    fn cursor_for(&self, record: &ResourceRecord) -> AppResult<String> {
        PageCursor::for_record(self.order_by.as_str(), self.order, record).encode()
    }
}

/// Translates declarative list parameters into a keyset scan.
#[derive(Debug, Clone, Copy)]
pub struct ListQueryEngine<'a> {
    definition: &'a ResourceDefinition,
}

impl<'a> ListQueryEngine<'a> {
    /// Creates an engine for one resource type.
    #[must_use]
    pub fn new(definition: &'a ResourceDefinition) -> Self {
        Self { definition }
    }

    /// Validates the request, runs one datastore scan and returns the page.
    pub async fn execute(
        &self,
        repository: &dyn ResourceRepository,
        scope: &PlatformScope,
        params: &ListParams,
    ) -> AppResult<Page<ResourceRecord>> {
        let prepared = self.prepare(params)?;
        let records = repository
            .query_records(scope, self.definition.resource_type(), &prepared.plan)
            .await?;
        prepared.into_page(records)
    }

    pub(crate) fn prepare(&self, params: &ListParams) -> AppResult<PreparedList> {
        if params.starting_after.is_some() && params.ending_before.is_some() {
            return Err(AppError::InvalidQuery(
                "startingAfter and endingBefore cannot be combined".to_owned(),
            ));
        }

        let (default_order_by, default_order) = self.definition.default_order();
        let order_by = params.order_by.as_deref().unwrap_or(default_order_by);
        if !self
            .definition
            .order_by_fields()
            .iter()
            .any(|field| field == order_by)
        {
            return Err(AppError::InvalidQuery(format!(
                "resource '{}' cannot be ordered by '{order_by}'",
                self.definition.resource_type()
            )));
        }
        let order = match params.order.as_deref() {
            Some(order) => order.parse::<SortDirection>()?,
            None => default_order,
        };

        let page_size = params
            .nb_results_per_page
            .unwrap_or(DEFAULT_NB_RESULTS_PER_PAGE);
        if !(1..=MAX_NB_RESULTS_PER_PAGE).contains(&page_size) {
            return Err(AppError::InvalidQuery(format!(
                "nbResultsPerPage must be between 1 and {MAX_NB_RESULTS_PER_PAGE}"
            )));
        }

        let mut filters = Vec::with_capacity(params.filters.len());
        for (param, value) in &params.filters {
            if let Some(filter) = self.compile_filter(param, value)? {
                filters.push(filter);
            }
        }

        let (direction, token) = match (&params.starting_after, &params.ending_before) {
            (_, Some(token)) => (ScanDirection::Backward, Some(token)),
            (Some(token), None) => (ScanDirection::Forward, Some(token)),
            (None, None) => (ScanDirection::Forward, None),
        };

        let after = match token {
            Some(token) => {
                let cursor = PageCursor::decode(token)?;
                cursor.ensure_matches(order_by, order)?;
                Some(KeysetBoundary {
                    sort_value: cursor.value,
                    id: cursor.id,
                })
            }
            None => None,
        };

        let (sort_direction, id_direction) = match direction {
            ScanDirection::Forward => (order, SortDirection::Asc),
            ScanDirection::Backward => (order.reversed(), SortDirection::Desc),
        };

        Ok(PreparedList {
            plan: ListPlan {
                filters,
                sort_field: order_by.to_owned(),
                sort_direction,
                id_direction,
                after,
                limit: page_size as usize + 1,
            },
            order_by: order_by.to_owned(),
            order,
            page_size,
            direction,
            resumed: token.is_some(),
        })
    }

    fn compile_filter(&self, param: &str, value: &FilterParam) -> AppResult<Option<ListFilter>> {
        let Some(filter) = self.definition.filter(param) else {
            return Err(AppError::InvalidQuery(format!(
                "unknown filter '{param}' for resource '{}'",
                self.definition.resource_type()
            )));
        };
        let field = filter.field();

        let condition = match (filter.kind(), value) {
            (FilterKind::InList, FilterParam::Values(values)) => {
                let mut unique: Vec<Value> = Vec::with_capacity(values.len());
                for value in values {
                    let value = normalize_value(field, value)?;
                    if !unique.contains(&value) {
                        unique.push(value);
                    }
                }
                ListCondition::InList(unique)
            }
            (FilterKind::Exact, FilterParam::Values(values)) => match values.as_slice() {
                [value] => ListCondition::Exact(normalize_value(field, value)?),
                _ => {
                    return Err(AppError::InvalidQuery(format!(
                        "filter '{param}' takes exactly one value"
                    )));
                }
            },
            (FilterKind::Range, FilterParam::Range { lower, upper }) => {
                let lower = lower
                    .as_ref()
                    .map(|value| normalize_value(field, value))
                    .transpose()?;
                let upper = upper
                    .as_ref()
                    .map(|value| normalize_value(field, value))
                    .transpose()?;

                if let (Some(lower), Some(upper)) = (&lower, &upper)
                    && bounds_inverted(lower, upper)
                {
                    return Err(AppError::InvalidQuery(format!(
                        "filter '{param}' has a lower bound above its upper bound"
                    )));
                }

                if lower.is_none() && upper.is_none() {
                    return Ok(None);
                }
                ListCondition::Range { lower, upper }
            }
            (FilterKind::Range, FilterParam::Values(_)) => {
                return Err(AppError::InvalidQuery(format!(
                    "filter '{param}' expects range bounds"
                )));
            }
            (_, FilterParam::Range { .. }) => {
                return Err(AppError::InvalidQuery(format!(
                    "filter '{param}' does not accept range bounds"
                )));
            }
        };

        Ok(Some(ListFilter {
            field: field.to_owned(),
            condition,
        }))
    }
}

/// Timestamps become canonical millisecond strings; other scalars pass through.
fn normalize_value(field: &str, value: &Value) -> AppResult<Value> {
    if FieldSource::of(field).is_timestamp() {
        let timestamp = value
            .as_str()
            .map(parse_timestamp)
            .transpose()
            .ok()
            .flatten()
            .ok_or_else(|| {
                AppError::InvalidQuery(format!("filter on '{field}' expects an RFC 3339 timestamp"))
            })?;
        return Ok(Value::String(format_timestamp(timestamp)));
    }

    match value {
        Value::Array(_) | Value::Object(_) => Err(AppError::InvalidQuery(format!(
            "filter on '{field}' expects scalar values"
        ))),
        scalar => Ok(scalar.clone()),
    }
}

fn bounds_inverted(lower: &Value, upper: &Value) -> bool {
    match (lower, upper) {
        (Value::String(lower), Value::String(upper)) => lower > upper,
        (Value::Number(lower), Value::Number(upper)) => {
            matches!((lower.as_f64(), upper.as_f64()), (Some(lower), Some(upper)) if lower > upper)
        }
        _ => false,
    }
}
