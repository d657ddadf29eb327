use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use keystone_core::{AppError, AppResult, NonEmptyString};
use serde_json::{Map, Value};

/// Identifier system field.
pub const ID_FIELD: &str = "id";
/// Creation timestamp system field.
pub const CREATED_DATE_FIELD: &str = "createdDate";
/// Last mutation timestamp system field.
pub const UPDATED_DATE_FIELD: &str = "updatedDate";
/// Server-assigned fields present on every record, in exposure order.
pub const SYSTEM_FIELDS: [&str; 3] = [ID_FIELD, CREATED_DATE_FIELD, UPDATED_DATE_FIELD];

/// Where a datastore keeps a named field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Record identifier.
    Id,
    /// Creation timestamp.
    CreatedDate,
    /// Last mutation timestamp.
    UpdatedDate,
    /// Key of the record data object.
    Data,
}

impl FieldSource {
    /// Resolves the storage location of a field name.
    #[must_use]
    pub fn of(field: &str) -> Self {
        match field {
            ID_FIELD => Self::Id,
            CREATED_DATE_FIELD => Self::CreatedDate,
            UPDATED_DATE_FIELD => Self::UpdatedDate,
            _ => Self::Data,
        }
    }

    /// Returns whether the field holds a timestamp.
    #[must_use]
    pub fn is_timestamp(&self) -> bool {
        matches!(self, Self::CreatedDate | Self::UpdatedDate)
    }
}

/// Returns the current time at the millisecond precision records are stored with.
#[must_use]
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Renders a timestamp in its canonical `2020-08-10T00:00:00.000Z` form.
#[must_use]
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 timestamp.
pub fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| AppError::Validation(format!("invalid timestamp '{value}': {error}")))
}

/// Persisted record of a declared resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    id: NonEmptyString,
    created_date: DateTime<Utc>,
    updated_date: DateTime<Utc>,
    data: Map<String, Value>,
}

impl ResourceRecord {
    /// Creates a validated record.
    pub fn new(
        id: impl Into<String>,
        created_date: DateTime<Utc>,
        updated_date: DateTime<Utc>,
        data: Map<String, Value>,
    ) -> AppResult<Self> {
        if updated_date < created_date {
            return Err(AppError::Internal(
                "record updatedDate precedes createdDate".to_owned(),
            ));
        }

        Ok(Self {
            id: NonEmptyString::new(id)?,
            created_date,
            updated_date,
            data,
        })
    }

    /// Returns the record identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_date(&self) -> DateTime<Utc> {
        self.created_date
    }

    /// Returns the last mutation timestamp.
    #[must_use]
    pub fn updated_date(&self) -> DateTime<Utc> {
        self.updated_date
    }

    /// Returns the non-system fields.
    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Returns a field value by name, rendering system fields the way they are exposed.
    #[must_use]
    pub fn field_value(&self, field: &str) -> Option<Value> {
        match FieldSource::of(field) {
            FieldSource::Id => Some(Value::String(self.id().to_owned())),
            FieldSource::CreatedDate => Some(Value::String(format_timestamp(self.created_date))),
            FieldSource::UpdatedDate => Some(Value::String(format_timestamp(self.updated_date))),
            FieldSource::Data => self.data.get(field).cloned(),
        }
    }

    /// Returns the full document: system fields followed by data fields.
    #[must_use]
    pub fn to_document(&self) -> Map<String, Value> {
        let mut document = Map::with_capacity(self.data.len() + SYSTEM_FIELDS.len());
        for field in SYSTEM_FIELDS {
            if let Some(value) = self.field_value(field) {
                document.insert(field.to_owned(), value);
            }
        }
        for (key, value) in &self.data {
            document.insert(key.clone(), value.clone());
        }
        document
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::{Map, Value, json};

    use super::{FieldSource, ResourceRecord, format_timestamp, parse_timestamp};

    #[test]
    fn timestamps_render_with_millisecond_precision() {
        let timestamp = Utc
            .with_ymd_and_hms(2020, 8, 10, 12, 30, 0)
            .single()
            .unwrap_or_else(|| unreachable!());
        assert_eq!(format_timestamp(timestamp), "2020-08-10T12:30:00.000Z");

        let parsed = parse_timestamp("2020-08-10T14:30:00.000+02:00");
        assert_eq!(parsed.ok(), Some(timestamp));
    }

    #[test]
    fn record_rejects_updated_before_created() {
        let created = Utc::now();
        let updated = created - chrono::Duration::seconds(1);
        assert!(ResourceRecord::new("k360_a", created, updated, Map::new()).is_err());
    }

    #[test]
    fn document_starts_with_system_fields() {
        let created = Utc
            .with_ymd_and_hms(2021, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(|| unreachable!());
        let data = json!({"name": "root"});
        let record = ResourceRecord::new(
            "k360_a",
            created,
            created,
            data.as_object().cloned().unwrap_or_default(),
        )
        .unwrap_or_else(|_| unreachable!());

        let document = record.to_document();
        let keys: Vec<&String> = document.keys().collect();
        assert_eq!(keys, vec!["id", "createdDate", "updatedDate", "name"]);
        assert_eq!(
            record.field_value("createdDate"),
            Some(Value::String("2021-01-01T00:00:00.000Z".to_owned()))
        );
        assert_eq!(FieldSource::of("name"), FieldSource::Data);
    }
}
