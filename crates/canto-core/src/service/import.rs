//! Import of remote custom fields as local collections and tags.

use tracing::debug;

use crate::client::ApiClient;
use crate::config::{CantoConfig, CustomFieldMapping};
use crate::Result;

/// One collection to create locally, with its tag vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionImport {
    /// Collection title, taken from the remote field name.
    pub title: String,
    /// Tag labels, filtered through the mapping's include/exclude lists.
    pub tags: Vec<String>,
}

/// Computes the collections and tags to import from the remote custom
/// fields.
///
/// Only fields mapped with `asCollection` are imported; their values
/// become tags only when `valuesAsTags` is set, filtered by the mapping's
/// include list (when non-empty) and exclude list. Fields the remote no
/// longer reports are simply absent from the result.
///
/// # Errors
///
/// Propagates authentication and transport failures from the field
/// listing.
pub async fn import_custom_fields(
    client: &ApiClient,
    config: &CantoConfig,
) -> Result<Vec<CollectionImport>> {
    let fields = client.custom_fields().await?;

    let mut imports = Vec::new();
    for field in fields {
        let Some(mapping) = config.custom_fields.get(&field.id) else {
            continue;
        };
        if !mapping.as_collection {
            continue;
        }
        let tags = if mapping.values_as_tags {
            filter_values(field.values, mapping)
        } else {
            Vec::new()
        };
        imports.push(CollectionImport {
            title: field.name,
            tags,
        });
    }
    debug!(collections = imports.len(), "computed custom-field import");
    Ok(imports)
}

fn filter_values(values: Vec<String>, mapping: &CustomFieldMapping) -> Vec<String> {
    values
        .into_iter()
        .filter(|value| mapping.include.is_empty() || mapping.include.contains(value))
        .filter(|value| !mapping.exclude.contains(value))
        .collect()
}
