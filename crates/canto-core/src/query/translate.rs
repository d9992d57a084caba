//! Translation of local tag and collection filters into the remote
//! custom-field query syntax.
//!
//! The remote API has no native tag filter. Tags are emulated through
//! custom fields mapped as collections: a clause
//! `&{fieldId}.keyword="{label}"` restricts a search to assets carrying
//! the label in that field, and the sentinel value `__null__` matches
//! assets with no value at all.

use crate::client::CustomField;
use crate::config::CantoConfig;
use crate::query::TagFilter;

/// Sentinel value the remote API treats as "no value set".
const NULL_VALUE: &str = "__null__";

/// Builds the query fragment restricting a search to one tag.
///
/// One clause per collection-mapped field whose remote name matches a
/// relevant collection title; when a collection is active only its own
/// field is considered. Fields are matched in the order the API listed
/// them, so the fragment is deterministic for a given field list. An
/// empty mapping yields an empty fragment.
pub(crate) fn tag_query_fragment(
    fields: &[CustomField],
    config: &CantoConfig,
    tag: &TagFilter,
    collection: Option<&str>,
) -> String {
    let titles: Vec<&str> = match collection {
        Some(title) => vec![title],
        None => tag.collection_titles.iter().map(String::as_str).collect(),
    };
    build_fragment(fields, config, &titles, &tag.label)
}

/// Builds the query fragment matching assets with no tag value.
///
/// Covers the active collection's field when one is set, otherwise every
/// collection-mapped field.
pub(crate) fn untagged_query_fragment(
    fields: &[CustomField],
    config: &CantoConfig,
    collection: Option<&str>,
) -> String {
    let mut fragment = String::new();
    for field in fields {
        if !config.is_collection_field(&field.id) {
            continue;
        }
        if collection.is_some_and(|title| title != field.name) {
            continue;
        }
        push_clause(&mut fragment, &field.id, NULL_VALUE);
    }
    fragment
}

fn build_fragment(
    fields: &[CustomField],
    config: &CantoConfig,
    titles: &[&str],
    label: &str,
) -> String {
    let mut fragment = String::new();
    for field in fields {
        if !config.is_collection_field(&field.id) {
            continue;
        }
        if !titles.contains(&field.name.as_str()) {
            continue;
        }
        push_clause(&mut fragment, &field.id, label);
    }
    fragment
}

fn push_clause(fragment: &mut String, field_id: &str, value: &str) {
    fragment.push_str(&format!("&{field_id}.keyword=\"{value}\""));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> CantoConfig {
        serde_json::from_value(serde_json::json!({
            "apiBaseUri": "https://acme.canto.global/api/v1",
            "oAuthBaseUri": "https://oauth.canto.global/oauth/api/oauth2",
            "appId": "app",
            "appSecret": "secret",
            "customFields": {
                "prop1": { "asCollection": true, "valuesAsTags": true },
                "prop2": { "asCollection": false },
                "prop3": { "asCollection": true }
            }
        }))
        .unwrap()
    }

    fn fields() -> Vec<CustomField> {
        vec![
            CustomField {
                id: "prop1".to_string(),
                name: "Nature".to_string(),
                values: vec!["Forest".to_string(), "Sea".to_string()],
            },
            CustomField {
                id: "prop2".to_string(),
                name: "Internal".to_string(),
                values: Vec::new(),
            },
            CustomField {
                id: "prop3".to_string(),
                name: "Projects".to_string(),
                values: Vec::new(),
            },
        ]
    }

    #[test]
    fn test_tag_fragment_matches_collection_titles() {
        let tag = TagFilter::new("Sea", ["Nature".to_string()]);
        let fragment = tag_query_fragment(&fields(), &config(), &tag, None);
        assert_eq!(fragment, "&prop1.keyword=\"Sea\"");
    }

    #[test]
    fn test_tag_fragment_spans_multiple_collections() {
        let tag = TagFilter::new("Sea", ["Nature".to_string(), "Projects".to_string()]);
        let fragment = tag_query_fragment(&fields(), &config(), &tag, None);
        assert_eq!(fragment, "&prop1.keyword=\"Sea\"&prop3.keyword=\"Sea\"");
    }

    #[test]
    fn test_active_collection_narrows_the_tag_fragment() {
        let tag = TagFilter::new("Sea", ["Nature".to_string(), "Projects".to_string()]);
        let fragment = tag_query_fragment(&fields(), &config(), &tag, Some("Projects"));
        assert_eq!(fragment, "&prop3.keyword=\"Sea\"");
    }

    #[test]
    fn test_non_collection_fields_are_never_queried() {
        let tag = TagFilter::new("Sea", ["Internal".to_string()]);
        let fragment = tag_query_fragment(&fields(), &config(), &tag, None);
        assert!(fragment.is_empty());
    }

    #[test]
    fn test_untagged_fragment_covers_all_collection_fields() {
        let fragment = untagged_query_fragment(&fields(), &config(), None);
        assert_eq!(
            fragment,
            "&prop1.keyword=\"__null__\"&prop3.keyword=\"__null__\""
        );
    }

    #[test]
    fn test_untagged_fragment_for_one_collection() {
        let fragment = untagged_query_fragment(&fields(), &config(), Some("Nature"));
        assert_eq!(fragment, "&prop1.keyword=\"__null__\"");
    }

    #[test]
    fn test_empty_mapping_yields_empty_fragments() {
        let mut config = config();
        config.custom_fields.clear();
        let tag = TagFilter::new("Sea", ["Nature".to_string()]);
        assert!(tag_query_fragment(&fields(), &config, &tag, None).is_empty());
        assert!(untagged_query_fragment(&fields(), &config, None).is_empty());
    }
}
