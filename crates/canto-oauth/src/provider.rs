//! Canto `OAuth2` provider endpoint configuration.

use url::Url;

use crate::error::{Error, Result};

/// Canto `OAuth2` endpoint set, derived from a single base URI.
///
/// For example: `https://oauth.canto.global/oauth/api/oauth2`
#[derive(Debug, Clone)]
pub struct Provider {
    base_uri: String,
}

impl Provider {
    /// Creates a provider configuration from the `OAuth2` base URI.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URI is not a valid absolute URL.
    pub fn new(base_uri: impl Into<String>) -> Result<Self> {
        let base_uri = base_uri.into();
        let parsed = Url::parse(&base_uri)?;
        if parsed.cannot_be_a_base() {
            return Err(Error::InvalidConfig(format!(
                "OAuth base URI cannot be used as a base: {base_uri}"
            )));
        }
        Ok(Self {
            base_uri: base_uri.trim_end_matches('/').to_string(),
        })
    }

    /// The configured base URI, without a trailing slash.
    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// The token endpoint: `{base}/token`.
    #[must_use]
    pub fn token_uri(&self) -> String {
        format!("{}/token", self.base_uri)
    }

    /// The authorize endpoint: `{base}/token/authorize`.
    #[must_use]
    pub fn authorize_uri(&self) -> String {
        format!("{}/token/authorize", self.base_uri)
    }

    /// The resource-owner endpoint: `{base}/token/resource`.
    #[must_use]
    pub fn resource_owner_uri(&self) -> String {
        format!("{}/token/resource", self.base_uri)
    }
}
