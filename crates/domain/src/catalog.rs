//! Built-in resource declarations.

use keystone_core::AppResult;
use serde_json::Value;

use crate::resource::{
    FieldDefinition, FilterDefinition, FilterKind, ResourceDefinition, ResourceDefinitionInput,
    SortDirection,
};

const NAME_MAX_LENGTH: usize = 255;

fn timestamp_order() -> Vec<String> {
    vec!["createdDate".to_owned(), "updatedDate".to_owned()]
}

fn api_fields(fields: &[&str]) -> Vec<(String, Vec<String>)> {
    vec![(
        "api".to_owned(),
        fields.iter().map(|field| (*field).to_owned()).collect(),
    )]
}

/// `k360` resource: named tree nodes with free-form documents.
pub fn k360_definition() -> AppResult<ResourceDefinition> {
    ResourceDefinition::new(ResourceDefinitionInput {
        resource_type: "k360".to_owned(),
        id_prefix: "k360".to_owned(),
        fields: vec![
            FieldDefinition::text("name", Some(NAME_MAX_LENGTH))?
                .required()
                .create_only(),
            FieldDefinition::reference("parentId")?
                .nullable()
                .with_default(Value::Null),
            FieldDefinition::text("myData", Some(NAME_MAX_LENGTH))?
                .nullable()
                .create_only(),
            FieldDefinition::document("metadata")?,
            FieldDefinition::document("platformData")?,
        ],
        order_by_fields: timestamp_order(),
        default_order_by: "createdDate".to_owned(),
        default_order: SortDirection::Desc,
        filters: vec![
            FilterDefinition::new("id", "id", FilterKind::InList)?,
            FilterDefinition::new("createdDate", "createdDate", FilterKind::Range)?,
            FilterDefinition::new("updatedDate", "updatedDate", FilterKind::Range)?,
            FilterDefinition::new("parentId", "parentId", FilterKind::InList)?,
            FilterDefinition::new("myData", "myData", FilterKind::Exact)?,
        ],
        access_fields: api_fields(&[
            "id",
            "createdDate",
            "updatedDate",
            "name",
            "parentId",
            "myData",
            "metadata",
            "platformData",
            "livemode",
        ]),
    })
}

/// `k360academydata` resource: flat records with a defaulted `myData` label.
pub fn k360_academy_data_definition() -> AppResult<ResourceDefinition> {
    ResourceDefinition::new(ResourceDefinitionInput {
        resource_type: "k360academydata".to_owned(),
        id_prefix: "k360ad".to_owned(),
        fields: vec![
            FieldDefinition::text("name", Some(NAME_MAX_LENGTH))?.nullable(),
            FieldDefinition::text("myData", Some(NAME_MAX_LENGTH))?
                .with_default(Value::String("algo".to_owned())),
            FieldDefinition::document("metadata")?,
            FieldDefinition::document("platformData")?,
        ],
        order_by_fields: timestamp_order(),
        default_order_by: "createdDate".to_owned(),
        default_order: SortDirection::Desc,
        filters: vec![
            FilterDefinition::new("id", "id", FilterKind::InList)?,
            FilterDefinition::new("myData", "myData", FilterKind::InList)?,
        ],
        access_fields: api_fields(&[
            "id",
            "createdDate",
            "updatedDate",
            "name",
            "myData",
            "metadata",
            "platformData",
            "livemode",
        ]),
    })
}

/// Every built-in resource declaration.
pub fn builtin_catalog() -> AppResult<Vec<ResourceDefinition>> {
    Ok(vec![k360_definition()?, k360_academy_data_definition()?])
}
