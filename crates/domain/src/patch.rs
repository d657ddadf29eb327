use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Datastore write computed from a partial update.
///
/// Replacements overwrite whole field values. Merges are applied by the
/// datastore as a shallow merge into the stored document, in the same atomic
/// statement as the replacements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteSet {
    replacements: Map<String, Value>,
    merges: BTreeMap<String, Map<String, Value>>,
}

impl WriteSet {
    /// Creates an empty write set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a field value.
    pub fn replace(&mut self, field: impl Into<String>, value: Value) {
        self.replacements.insert(field.into(), value);
    }

    /// Merges top-level keys into a document field. Empty patches are ignored.
    pub fn merge(&mut self, field: impl Into<String>, patch: Map<String, Value>) {
        if patch.is_empty() {
            return;
        }
        self.merges.insert(field.into(), patch);
    }

    /// Returns field replacements.
    #[must_use]
    pub fn replacements(&self) -> &Map<String, Value> {
        &self.replacements
    }

    /// Returns document merges keyed by field.
    #[must_use]
    pub fn merges(&self) -> &BTreeMap<String, Map<String, Value>> {
        &self.merges
    }

    /// Returns whether the write changes no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty() && self.merges.is_empty()
    }

    /// Applies the write to record data in place.
    pub fn apply_to(&self, data: &mut Map<String, Value>) {
        for (field, value) in &self.replacements {
            data.insert(field.clone(), value.clone());
        }
        for (field, patch) in &self.merges {
            let target = data
                .entry(field.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            merge_document(target, patch);
        }
    }
}

/// Shallow merge-patch: patch keys overwrite, absent keys are preserved.
///
/// `null` patch values are stored as `null` rather than deleting the key. A
/// non-object target is treated as an empty document.
pub fn merge_document(target: &mut Value, patch: &Map<String, Value>) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }

    if let Value::Object(document) = target {
        for (key, value) in patch {
            document.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;
    use serde_json::{Map, Value, json};

    use super::{WriteSet, merge_document};

    fn document_strategy() -> impl Strategy<Value = Map<String, Value>> {
        prop::collection::btree_map("[a-e]", any::<i64>(), 0..6).prop_map(|entries| {
            entries
                .into_iter()
                .map(|(key, value)| (key, Value::from(value)))
                .collect()
        })
    }

    #[test]
    fn nested_objects_are_replaced_not_merged() {
        let mut target = json!({"style": {"color": "red", "size": 1}, "tag": "a"});
        let patch = json!({"style": {"color": "blue"}});
        merge_document(&mut target, patch.as_object().unwrap_or_else(|| unreachable!()));

        assert_eq!(target, json!({"style": {"color": "blue"}, "tag": "a"}));
    }

    #[test]
    fn empty_document_patch_is_not_recorded() {
        let mut write_set = WriteSet::new();
        write_set.merge("metadata", Map::new());
        assert!(write_set.is_empty());
    }

    #[test]
    fn merges_are_tracked_per_document_field() {
        let mut write_set = WriteSet::new();
        write_set.merge(
            "platformData",
            json!({"tier": "gold"}).as_object().cloned().unwrap_or_default(),
        );
        write_set.merge(
            "metadata",
            json!({"x": 1}).as_object().cloned().unwrap_or_default(),
        );
        write_set.merge(
            "metadata",
            json!({"y": 2}).as_object().cloned().unwrap_or_default(),
        );

        let fields: Vec<&String> = write_set.merges().keys().collect();
        assert_eq!(fields, vec!["metadata", "platformData"]);
        assert_eq!(
            write_set.merges().get("metadata").cloned().map(Value::Object),
            Some(json!({"y": 2}))
        );
        assert!(!write_set.is_empty());
    }

    #[test]
    fn apply_replaces_scalars_and_merges_documents() {
        let mut data = json!({"parentId": "a", "metadata": {"x": 1}})
            .as_object()
            .cloned()
            .unwrap_or_default();
        let mut write_set = WriteSet::new();
        write_set.replace("parentId", Value::Null);
        write_set.merge(
            "metadata",
            json!({"y": 2}).as_object().cloned().unwrap_or_default(),
        );
        write_set.apply_to(&mut data);

        assert_eq!(
            Value::Object(data),
            json!({"parentId": null, "metadata": {"x": 1, "y": 2}})
        );
    }

    proptest! {
        #[test]
        fn merge_preserves_absent_keys_and_overwrites_present_ones(
            stored in document_strategy(),
            patch in document_strategy(),
        ) {
            let mut target = Value::Object(stored.clone());
            merge_document(&mut target, &patch);
            let merged = target.as_object().cloned().unwrap_or_default();

            for (key, value) in &stored {
                if !patch.contains_key(key) {
                    prop_assert_eq!(merged.get(key), Some(value));
                }
            }
            for (key, value) in &patch {
                prop_assert_eq!(merged.get(key), Some(value));
            }
            let distinct_keys: BTreeSet<&String> = stored.keys().chain(patch.keys()).collect();
            prop_assert_eq!(merged.len(), distinct_keys.len());
        }

        #[test]
        fn merging_empty_patch_is_a_no_op(stored in document_strategy()) {
            let mut target = Value::Object(stored.clone());
            merge_document(&mut target, &Map::new());
            prop_assert_eq!(target, Value::Object(stored));
        }
    }
}
