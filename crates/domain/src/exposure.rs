use keystone_core::Environment;
use serde_json::{Map, Value};

use crate::record::ResourceRecord;
use crate::resource::{LIVEMODE_FIELD, ResourceDefinition};

/// Audience an entity is projected for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessScope {
    /// Public API callers.
    Api,
    /// Internal namespace with its own whitelist.
    Namespace(String),
    /// Every declared field; reserved for audit-trail snapshots.
    All,
}

impl AccessScope {
    /// Returns the whitelist key in resource definitions.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Api => "api",
            Self::Namespace(name) => name.as_str(),
            Self::All => "*",
        }
    }
}

/// Field projection applied before an entity leaves the service boundary.
#[derive(Debug, Clone, Copy)]
pub struct ExposureFilter<'a> {
    definition: &'a ResourceDefinition,
}

impl<'a> ExposureFilter<'a> {
    /// Creates a filter for one resource type.
    #[must_use]
    pub fn new(definition: &'a ResourceDefinition) -> Self {
        Self { definition }
    }

    /// Projects a persisted record, adding `livemode` when the scope whitelists it.
    #[must_use]
    pub fn expose_record(
        &self,
        record: &ResourceRecord,
        scope: &AccessScope,
        env: Environment,
    ) -> Map<String, Value> {
        let document = record.to_document();
        self.project(&document, scope, Some(env))
    }

    /// Projects several records, keeping their order.
    #[must_use]
    pub fn expose_records(
        &self,
        records: &[ResourceRecord],
        scope: &AccessScope,
        env: Environment,
    ) -> Vec<Map<String, Value>> {
        records
            .iter()
            .map(|record| self.expose_record(record, scope, env))
            .collect()
    }

    /// Projects a partial object such as an update patch; absent fields stay absent.
    #[must_use]
    pub fn expose_object(
        &self,
        object: &Map<String, Value>,
        scope: &AccessScope,
    ) -> Map<String, Value> {
        self.project(object, scope, None)
    }

    fn project(
        &self,
        object: &Map<String, Value>,
        scope: &AccessScope,
        env: Option<Environment>,
    ) -> Map<String, Value> {
        let mut exposed = Map::new();

        if *scope == AccessScope::All {
            for name in self.definition.all_field_names() {
                if let Some(value) = object.get(name) {
                    exposed.insert(name.to_owned(), value.clone());
                }
            }
            return exposed;
        }

        // Unknown scopes see nothing.
        let Some(fields) = self.definition.access_fields(scope.as_str()) else {
            return exposed;
        };

        for name in fields {
            if name == LIVEMODE_FIELD {
                if let Some(env) = env {
                    exposed.insert(name.clone(), Value::Bool(env.is_live()));
                }
                continue;
            }

            if let Some(value) = object.get(name.as_str()) {
                exposed.insert(name.clone(), value.clone());
            }
        }

        exposed
    }
}
