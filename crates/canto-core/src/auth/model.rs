//! Authorization data models.

use canto_oauth::Token;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The grant through which an authorization was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Interactive authorization-code grant, tied to a principal.
    AuthorizationCode,
    /// Service-to-service client-credentials grant.
    ClientCredentials,
}

impl GrantType {
    /// Stable string form used in persistence.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
        }
    }

    /// Parses the persisted string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "authorization_code" => Some(Self::AuthorizationCode),
            "client_credentials" => Some(Self::ClientCredentials),
            _ => None,
        }
    }
}

/// One persisted `OAuth2` grant instance.
///
/// Mutated only by token exchange and refresh; superseded or deleted when
/// revoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authorization {
    /// Opaque identifier the record is keyed by.
    pub authorization_id: String,
    /// Application (client) ID the grant belongs to.
    pub client_id: String,
    /// Grant type that produced the tokens.
    pub grant_type: GrantType,
    /// The token set.
    pub token: Token,
    /// Free-form metadata recorded at issuance time.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Authorization {
    /// Whether the contained access token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.token.is_expired_at(now)
    }

    /// Whether the contained access token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.token.is_expired()
    }
}

/// Maps a local principal identifier 1:1 to an authorization identifier.
///
/// Created on first successful interactive login, updated on re-auth,
/// deleted (with its authorization) when the principal goes away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountAuthorization {
    /// Local principal identifier.
    pub account_identifier: String,
    /// Identifier of the backing [`Authorization`].
    pub authorization_id: String,
}

/// Anti-CSRF state issued when building a login URI, consumed exactly once
/// when the authorization is finished.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    /// The `state` query parameter value.
    pub state: String,
    /// Principal the finished authorization will be linked to.
    pub account_identifier: String,
    /// Where to send the user after the flow completes.
    pub return_uri: String,
    /// Issuance time.
    pub issued_at: DateTime<Utc>,
}
