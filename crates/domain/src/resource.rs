use std::collections::HashSet;
use std::str::FromStr;

use keystone_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::DomainEventKind;
use crate::record::SYSTEM_FIELDS;

/// Computed exposure field reporting whether the scope holds live data.
pub const LIVEMODE_FIELD: &str = "livemode";

/// Storage shape of a declared resource field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// UTF-8 string with an optional maximum character count.
    Text {
        /// Maximum number of characters.
        max_length: Option<usize>,
    },
    /// Identifier of another record.
    Reference,
    /// Semi-structured JSON object updated with shallow merge-patch semantics.
    Document,
}

impl FieldKind {
    /// Returns a stable label for the field kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Reference => "reference",
            Self::Document => "document",
        }
    }

    /// Returns whether updates merge into the stored value instead of replacing it.
    #[must_use]
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document)
    }
}

/// Declaration of a single client-writable resource field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    name: NonEmptyString,
    kind: FieldKind,
    nullable: bool,
    required: bool,
    updatable: bool,
    default_value: Option<Value>,
}

impl FieldDefinition {
    /// Declares a text field.
    pub fn text(name: impl Into<String>, max_length: Option<usize>) -> AppResult<Self> {
        Self::new(name, FieldKind::Text { max_length })
    }

    /// Declares a reference field.
    pub fn reference(name: impl Into<String>) -> AppResult<Self> {
        Self::new(name, FieldKind::Reference)
    }

    /// Declares a document field defaulting to an empty object.
    pub fn document(name: impl Into<String>) -> AppResult<Self> {
        Ok(Self::new(name, FieldKind::Document)?.with_default(Value::Object(Map::new())))
    }

    fn new(name: impl Into<String>, kind: FieldKind) -> AppResult<Self> {
        Ok(Self {
            name: NonEmptyString::new(name)?,
            kind,
            nullable: false,
            required: false,
            updatable: true,
            default_value: None,
        })
    }

    /// Allows explicit `null` values.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Requires the field on creation.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Forbids the field in partial updates.
    #[must_use]
    pub fn create_only(mut self) -> Self {
        self.updatable = false;
        self
    }

    /// Sets the value stored when creation omits the field.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the field kind.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Returns whether `null` is an accepted value.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns whether creation must supply the field.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns whether partial updates may target the field.
    #[must_use]
    pub fn is_updatable(&self) -> bool {
        self.updatable
    }

    /// Returns the declared default value.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    /// Validates one payload value against the field declaration.
    pub fn validate_value(&self, value: &Value) -> AppResult<()> {
        if value.is_null() {
            if self.nullable {
                return Ok(());
            }

            return Err(AppError::Validation(format!(
                "field '{}' does not accept null",
                self.name()
            )));
        }

        match self.kind {
            FieldKind::Text { max_length } => {
                let Some(text) = value.as_str() else {
                    return Err(AppError::Validation(format!(
                        "field '{}' must be a string",
                        self.name()
                    )));
                };

                if let Some(max_length) = max_length
                    && text.chars().count() > max_length
                {
                    return Err(AppError::Validation(format!(
                        "field '{}' exceeds {max_length} characters",
                        self.name()
                    )));
                }
            }
            FieldKind::Reference => {
                if value.as_str().is_none_or(|text| text.trim().is_empty()) {
                    return Err(AppError::Validation(format!(
                        "field '{}' must be a non-empty identifier",
                        self.name()
                    )));
                }
            }
            FieldKind::Document => {
                if !value.is_object() {
                    return Err(AppError::Validation(format!(
                        "field '{}' must be an object",
                        self.name()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Sort direction of a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending sort direction.
    Asc,
    /// Descending sort direction.
    Desc,
}

impl SortDirection {
    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// Returns the opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl FromStr for SortDirection {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(AppError::InvalidQuery(format!(
                "unknown sort direction '{value}'"
            ))),
        }
    }
}

/// Matching semantics of a declared list filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// `field IN values`.
    InList,
    /// Inclusive `field BETWEEN lower AND upper`, either bound optional.
    Range,
    /// Exact scalar equality.
    Exact,
}

/// List filter parameter exposed by a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDefinition {
    param: NonEmptyString,
    field: NonEmptyString,
    kind: FilterKind,
}

impl FilterDefinition {
    /// Declares a filter parameter bound to a field.
    pub fn new(
        param: impl Into<String>,
        field: impl Into<String>,
        kind: FilterKind,
    ) -> AppResult<Self> {
        Ok(Self {
            param: NonEmptyString::new(param)?,
            field: NonEmptyString::new(field)?,
            kind,
        })
    }

    /// Returns the request parameter name.
    #[must_use]
    pub fn param(&self) -> &str {
        self.param.as_str()
    }

    /// Returns the filtered field.
    #[must_use]
    pub fn field(&self) -> &str {
        self.field.as_str()
    }

    /// Returns the filter kind.
    #[must_use]
    pub fn kind(&self) -> FilterKind {
        self.kind
    }
}

/// Raw declaration used to build a [`ResourceDefinition`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDefinitionInput {
    /// Resource type key, also the event name prefix.
    pub resource_type: String,
    /// Prefix of generated identifiers.
    pub id_prefix: String,
    /// Client-writable fields in declared order.
    pub fields: Vec<FieldDefinition>,
    /// Fields accepted as `orderBy`.
    pub order_by_fields: Vec<String>,
    /// Ordering applied when the request names none.
    pub default_order_by: String,
    /// Direction applied when the request names none.
    pub default_order: SortDirection,
    /// List filters accepted by the resource.
    pub filters: Vec<FilterDefinition>,
    /// Whitelisted fields per access scope name, in exposure order.
    pub access_fields: Vec<(String, Vec<String>)>,
}

/// Validated declaration of a resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDefinition {
    resource_type: NonEmptyString,
    id_prefix: NonEmptyString,
    fields: Vec<FieldDefinition>,
    order_by_fields: Vec<String>,
    default_order_by: String,
    default_order: SortDirection,
    filters: Vec<FilterDefinition>,
    access_fields: Vec<(String, Vec<String>)>,
}

impl ResourceDefinition {
    /// Validates a resource declaration.
    pub fn new(input: ResourceDefinitionInput) -> AppResult<Self> {
        let resource_type = NonEmptyString::new(input.resource_type)?;
        let id_prefix = NonEmptyString::new(input.id_prefix)?;
        if !id_prefix
            .as_str()
            .chars()
            .all(|character| character.is_ascii_alphanumeric())
        {
            return Err(AppError::Validation(format!(
                "id prefix '{}' must be ASCII alphanumeric",
                id_prefix.as_str()
            )));
        }

        let mut seen = HashSet::new();
        for field in &input.fields {
            if SYSTEM_FIELDS.contains(&field.name()) || field.name() == LIVEMODE_FIELD {
                return Err(AppError::Validation(format!(
                    "field '{}' is reserved",
                    field.name()
                )));
            }
            if !seen.insert(field.name()) {
                return Err(AppError::Validation(format!(
                    "field '{}' is declared twice for resource '{}'",
                    field.name(),
                    resource_type.as_str()
                )));
            }
            match field.default_value() {
                Some(default_value) => field.validate_value(default_value)?,
                None if !field.is_nullable() && !field.is_required() => {
                    return Err(AppError::Validation(format!(
                        "field '{}' must be required, nullable or defaulted",
                        field.name()
                    )));
                }
                None => {}
            }
        }

        if input.order_by_fields.is_empty() {
            return Err(AppError::Validation(format!(
                "resource '{}' must declare at least one order field",
                resource_type.as_str()
            )));
        }
        for order_field in &input.order_by_fields {
            let sortable = SYSTEM_FIELDS.contains(&order_field.as_str())
                || find_field(&input.fields, order_field).is_some_and(|field| {
                    !field.is_nullable() && matches!(field.kind(), FieldKind::Text { .. })
                });
            if !sortable {
                return Err(AppError::Validation(format!(
                    "order field '{order_field}' must be a system field or a non-nullable text field"
                )));
            }
        }
        if !input.order_by_fields.contains(&input.default_order_by) {
            return Err(AppError::Validation(format!(
                "default order field '{}' is not whitelisted",
                input.default_order_by
            )));
        }

        let mut seen_params = HashSet::new();
        for filter in &input.filters {
            if !seen_params.insert(filter.param()) {
                return Err(AppError::Validation(format!(
                    "filter '{}' is declared twice",
                    filter.param()
                )));
            }
            let filterable = SYSTEM_FIELDS.contains(&filter.field())
                || find_field(&input.fields, filter.field())
                    .is_some_and(|field| !field.kind().is_document());
            if !filterable {
                return Err(AppError::Validation(format!(
                    "filter '{}' targets unknown or document field '{}'",
                    filter.param(),
                    filter.field()
                )));
            }
        }

        for (scope, fields) in &input.access_fields {
            if scope == "*" {
                return Err(AppError::Validation(
                    "access scope '*' is implicit and cannot be declared".to_owned(),
                ));
            }
            for name in fields {
                let known = SYSTEM_FIELDS.contains(&name.as_str())
                    || name == LIVEMODE_FIELD
                    || find_field(&input.fields, name).is_some();
                if !known {
                    return Err(AppError::Validation(format!(
                        "access scope '{scope}' exposes undeclared field '{name}'"
                    )));
                }
            }
        }

        Ok(Self {
            resource_type,
            id_prefix,
            fields: input.fields,
            order_by_fields: input.order_by_fields,
            default_order_by: input.default_order_by,
            default_order: input.default_order,
            filters: input.filters,
            access_fields: input.access_fields,
        })
    }

    /// Returns the resource type key.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        self.resource_type.as_str()
    }

    /// Returns the identifier prefix.
    #[must_use]
    pub fn id_prefix(&self) -> &str {
        self.id_prefix.as_str()
    }

    /// Returns the declared client-writable fields.
    #[must_use]
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Looks up a declared field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name() == name)
    }

    /// Returns system fields followed by declared fields.
    pub fn all_field_names(&self) -> impl Iterator<Item = &str> {
        SYSTEM_FIELDS
            .iter()
            .copied()
            .chain(self.fields.iter().map(FieldDefinition::name))
    }

    /// Returns the `orderBy` whitelist.
    #[must_use]
    pub fn order_by_fields(&self) -> &[String] {
        &self.order_by_fields
    }

    /// Returns the default `(orderBy, order)` pair.
    #[must_use]
    pub fn default_order(&self) -> (&str, SortDirection) {
        (self.default_order_by.as_str(), self.default_order)
    }

    /// Returns the declared list filters.
    #[must_use]
    pub fn filters(&self) -> &[FilterDefinition] {
        &self.filters
    }

    /// Looks up a list filter by request parameter.
    #[must_use]
    pub fn filter(&self, param: &str) -> Option<&FilterDefinition> {
        self.filters.iter().find(|filter| filter.param() == param)
    }

    /// Returns the whitelist of a named access scope.
    #[must_use]
    pub fn access_fields(&self, scope: &str) -> Option<&[String]> {
        self.access_fields
            .iter()
            .find(|(name, _)| name == scope)
            .map(|(_, fields)| fields.as_slice())
    }

    /// Returns the bus event name for a mutation kind, for example `k360Updated`.
    #[must_use]
    pub fn event_name(&self, kind: DomainEventKind) -> String {
        format!("{}{}", self.resource_type(), kind.event_suffix())
    }

    /// Returns every event name the resource publishes.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        DomainEventKind::ALL
            .iter()
            .map(|kind| self.event_name(*kind))
            .collect()
    }

    /// Validates a creation payload and fills declared defaults for omitted fields.
    pub fn prepare_create_payload(
        &self,
        payload: &Map<String, Value>,
    ) -> AppResult<Map<String, Value>> {
        for key in payload.keys() {
            if self.field(key).is_none() {
                return Err(AppError::Validation(format!(
                    "field '{key}' is not writable on resource '{}'",
                    self.resource_type()
                )));
            }
        }

        let mut data = Map::new();
        for field in &self.fields {
            match payload.get(field.name()) {
                Some(value) => {
                    field.validate_value(value)?;
                    data.insert(field.name().to_owned(), value.clone());
                }
                None if field.is_required() => {
                    return Err(AppError::Validation(format!(
                        "field '{}' is required on resource '{}'",
                        field.name(),
                        self.resource_type()
                    )));
                }
                None => {
                    data.insert(
                        field.name().to_owned(),
                        field.default_value().cloned().unwrap_or(Value::Null),
                    );
                }
            }
        }

        Ok(data)
    }
}

fn find_field<'a>(fields: &'a [FieldDefinition], name: &str) -> Option<&'a FieldDefinition> {
    fields.iter().find(|field| field.name() == name)
}
