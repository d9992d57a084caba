//! Error types for the connector core.

use thiserror::Error;

/// Errors that can occur in connector operations.
///
/// Authentication and transport errors propagate to the caller uncaught;
/// the core performs no retries. The lone intentional exception: custom
/// fields, user and tree lookups degrade to empty results on non-200
/// responses, because their absence is not fatal to a search.
#[derive(Debug, Error)]
pub enum Error {
    /// No usable token could be obtained.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Interactive authentication required but no principal is present, and
    /// the client-credentials fallback is disabled.
    #[error("No security context available and client credentials use not allowed")]
    MissingClientSecret,

    /// Interactive authorization is required; the caller must send the user
    /// to the contained login URI.
    #[error("Canto login required, redirect to {login_uri}")]
    AuthorizationNeeded {
        /// Absolute authorize URL carrying a freshly issued state parameter.
        login_uri: String,
    },

    /// The authorization state parameter is unknown or was already consumed.
    #[error("Unknown or expired authorization state: {0}")]
    InvalidState(String),

    /// A fetch by identifier returned no matching asset.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// The local permission layer denies access to the asset.
    #[error("Access to asset denied: {0}")]
    AccessDenied(String),

    /// Network or protocol-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response not otherwise classified.
    #[error("Unexpected status {status} from {path}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Request path that produced it.
        path: String,
    },

    /// JSON parse failure or unexpected payload shape.
    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    /// A response body or configuration value was not a valid URL.
    #[error("Malformed URL: {0}")]
    Url(#[from] url::ParseError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// `OAuth2` protocol failure.
    #[error("OAuth error: {0}")]
    OAuth(#[from] canto_oauth::Error),

    /// An asset identifier did not match the `{scheme}-{id}` convention.
    #[error("Invalid asset identifier: {0}")]
    InvalidIdentifier(String),

    /// A remote timestamp did not match the expected wire format.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
