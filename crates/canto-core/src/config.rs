//! Host-supplied configuration for the Canto connector.

use std::collections::BTreeMap;

use serde::Deserialize;
use url::Url;

use crate::{Error, Result};

/// Default pixel preset for thumbnail URIs.
const DEFAULT_THUMBNAIL_SIZE: u32 = 400;

/// Default pixel preset for preview URIs.
const DEFAULT_PREVIEW_SIZE: u32 = 1500;

/// Connector configuration, supplied by the host application.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CantoConfig {
    /// Base URI of the Canto REST API, e.g. `https://acme.canto.global/api/v1`.
    pub api_base_uri: String,
    /// Base URI of the Canto `OAuth2` server.
    pub o_auth_base_uri: String,
    /// Application ID issued by Canto.
    pub app_id: String,
    /// Application secret issued by Canto.
    pub app_secret: String,
    /// Custom-field mappings keyed by remote field ID. A `BTreeMap` keeps
    /// iteration deterministic, which query construction relies on.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, CustomFieldMapping>,
    /// Webhook receiver settings.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Auto-tagging of assets in use by the host.
    #[serde(default)]
    pub auto_tagging: AutoTagging,
    /// Longest edge, in pixels, for derived thumbnail URIs.
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,
    /// Longest edge, in pixels, for derived preview URIs.
    #[serde(default = "default_preview_size")]
    pub preview_size: u32,
}

const fn default_thumbnail_size() -> u32 {
    DEFAULT_THUMBNAIL_SIZE
}

const fn default_preview_size() -> u32 {
    DEFAULT_PREVIEW_SIZE
}

impl CantoConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the app id or secret is empty, or a base URI is
    /// not a valid absolute URL.
    pub fn validate(&self) -> Result<()> {
        if self.app_id.is_empty() {
            return Err(Error::Config("appId must not be empty".to_string()));
        }
        if self.app_secret.is_empty() {
            return Err(Error::Config("appSecret must not be empty".to_string()));
        }
        Url::parse(&self.api_base_uri)
            .map_err(|e| Error::Config(format!("invalid apiBaseUri: {e}")))?;
        Url::parse(&self.o_auth_base_uri)
            .map_err(|e| Error::Config(format!("invalid oAuthBaseUri: {e}")))?;
        Ok(())
    }

    /// Returns the IDs of all fields mapped as collections, in deterministic
    /// (key-sorted) order.
    #[must_use]
    pub fn collection_field_ids(&self) -> Vec<&str> {
        self.custom_fields
            .iter()
            .filter(|(_, m)| m.as_collection)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Whether the given remote field ID is mapped as a collection.
    #[must_use]
    pub fn is_collection_field(&self, field_id: &str) -> bool {
        self.custom_fields
            .get(field_id)
            .is_some_and(|m| m.as_collection)
    }
}

/// How one remote custom field maps onto local collection/tag semantics.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldMapping {
    /// Treat the field as an asset collection named after the field.
    #[serde(default)]
    pub as_collection: bool,
    /// Import the field's values as tags of that collection.
    #[serde(default)]
    pub values_as_tags: bool,
    /// If non-empty, only these values are imported as tags.
    #[serde(default)]
    pub include: Vec<String>,
    /// Values never imported as tags.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Webhook receiver settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    /// Path prefix the receiver listens under; the suffix names the event.
    #[serde(default)]
    pub path_prefix: String,
    /// Shared secret expected in the `secure_token` payload field. Empty
    /// disables the check.
    #[serde(default)]
    pub token: String,
}

/// Auto-tagging of assets that are in use by the host application.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoTagging {
    /// Whether the batch re-tagging service may run.
    #[serde(default)]
    pub enabled: bool,
    /// Remote keyword applied to assets with at least one local usage.
    #[serde(default = "default_in_use_tag")]
    pub in_use_tag: String,
}

fn default_in_use_tag() -> String {
    "canto-connector-in-use".to_string()
}

impl Default for AutoTagging {
    fn default() -> Self {
        Self {
            enabled: false,
            in_use_tag: default_in_use_tag(),
        }
    }
}
