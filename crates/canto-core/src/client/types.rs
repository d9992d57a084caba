//! Wire types for the Canto REST API.

use serde::Deserialize;

/// Response payload of `GET /search`.
///
/// Result items stay raw JSON: they are cached verbatim before being
/// parsed into asset proxies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    /// Total number of matching assets.
    #[serde(default)]
    pub found: u64,
    /// The page of raw asset objects.
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

/// One remote custom-field descriptor from `GET /custom/field`.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomField {
    /// Remote field ID, e.g. `prop1`.
    pub id: String,
    /// Display name of the field.
    pub name: String,
    /// Allowed values.
    #[serde(default)]
    pub values: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_defaults() {
        let response: SearchResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.found, 0);
        assert!(response.results.is_empty());
    }

    #[test]
    fn test_custom_field_deserialization() {
        let field: CustomField = serde_json::from_str(
            r#"{"id":"prop1","name":"Department","values":["Marketing","Sales"]}"#,
        )
        .unwrap();
        assert_eq!(field.id, "prop1");
        assert_eq!(field.values.len(), 2);
    }
}
