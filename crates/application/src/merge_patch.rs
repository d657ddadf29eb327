use keystone_core::{AppError, AppResult};
use keystone_domain::{ResourceDefinition, WriteSet};
use serde_json::{Map, Value};

/// Computes the datastore write for a partial update.
///
/// Scalar and reference fields are replaced. Document fields are shallow-merged
/// by the datastore; the applier never reads the stored record.
#[derive(Debug, Clone, Copy)]
pub struct MergePatchApplier<'a> {
    definition: &'a ResourceDefinition,
}

impl<'a> MergePatchApplier<'a> {
    /// Creates an applier for one resource type.
    #[must_use]
    pub fn new(definition: &'a ResourceDefinition) -> Self {
        Self { definition }
    }

    /// Validates a patch and turns it into a write set.
    pub fn write_set(&self, patch: &Map<String, Value>) -> AppResult<WriteSet> {
        let mut write_set = WriteSet::new();

        for (key, value) in patch {
            let Some(field) = self.definition.field(key) else {
                return Err(AppError::Validation(format!(
                    "field '{key}' is not writable on resource '{}'",
                    self.definition.resource_type()
                )));
            };

            if !field.is_updatable() {
                return Err(AppError::Validation(format!(
                    "field '{key}' cannot be updated on resource '{}'",
                    self.definition.resource_type()
                )));
            }

            field.validate_value(value)?;

            match value {
                Value::Object(document) if field.kind().is_document() => {
                    write_set.merge(key.as_str(), document.clone());
                }
                _ => write_set.replace(key.as_str(), value.clone()),
            }
        }

        Ok(write_set)
    }
}

#[cfg(test)]
mod tests {
    use keystone_core::AppError;
    use keystone_domain::catalog::k360_definition;
    use serde_json::{Value, json};

    use super::MergePatchApplier;

    fn apply(patch: Value) -> Result<keystone_domain::WriteSet, AppError> {
        let definition = k360_definition().unwrap_or_else(|_| unreachable!());
        MergePatchApplier::new(&definition)
            .write_set(patch.as_object().unwrap_or_else(|| unreachable!()))
    }

    #[test]
    fn scalars_replace_and_documents_merge() {
        let write_set = apply(json!({
            "parentId": null,
            "metadata": {"color": "blue"},
            "platformData": {}
        }))
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(write_set.replacements().get("parentId"), Some(&Value::Null));
        assert_eq!(
            write_set.merges().get("metadata").cloned().map(Value::Object),
            Some(json!({"color": "blue"}))
        );
        assert!(!write_set.merges().contains_key("platformData"));
    }

    #[test]
    fn create_only_and_unknown_fields_are_rejected() {
        assert!(matches!(
            apply(json!({"name": "renamed"})),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            apply(json!({"id": "k360_other"})),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            apply(json!({"createdDate": "2020-01-01T00:00:00.000Z"})),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn documents_must_be_objects() {
        assert!(matches!(
            apply(json!({"metadata": null})),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            apply(json!({"metadata": [1, 2]})),
            Err(AppError::Validation(_))
        ));
    }
}
