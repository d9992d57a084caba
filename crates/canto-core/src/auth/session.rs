//! The `OAuth2` session state machine.

use std::sync::Mutex;

use canto_oauth::{OAuthClient, generate_state};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use super::model::{AccountAuthorization, Authorization, GrantType, PendingAuthorization};
use super::repository::AuthorizationRepository;
use crate::{Error, Result};

/// Query parameters stripped from return URIs after finishing a flow.
const OAUTH_QUERY_PARAMS: [&str; 3] = ["state", "code", "scope"];

/// Manages the `OAuth2` authorization lifecycle for one caller context.
///
/// Two modes exist: interactive sessions act on behalf of a principal set
/// via [`for_account`](Self::for_account) and fail closed when no valid
/// authorization is stored; service sessions fall back to the
/// client-credentials grant when explicitly permitted via
/// [`allow_client_credentials`](Self::allow_client_credentials).
pub struct OAuthSession {
    oauth: OAuthClient,
    store: AuthorizationRepository,
    service_name: String,
    account: Option<String>,
    return_uri: Option<String>,
    client_credentials_allowed: bool,
    current: Mutex<Option<Authorization>>,
}

impl OAuthSession {
    /// Creates a session with no principal context.
    #[must_use]
    pub fn new(
        oauth: OAuthClient,
        store: AuthorizationRepository,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            oauth,
            store,
            service_name: service_name.into(),
            account: None,
            return_uri: None,
            client_credentials_allowed: false,
            current: Mutex::new(None),
        }
    }

    /// Binds the session to a principal (interactive mode).
    #[must_use]
    pub fn for_account(mut self, account_identifier: impl Into<String>) -> Self {
        self.account = Some(account_identifier.into());
        self
    }

    /// Sets the URI the user returns to after an interactive login.
    #[must_use]
    pub fn with_return_uri(mut self, return_uri: impl Into<String>) -> Self {
        self.return_uri = Some(return_uri.into());
        self
    }

    /// Permits the client-credentials grant for sessions without a
    /// principal context.
    #[must_use]
    pub const fn allow_client_credentials(mut self, allowed: bool) -> Self {
        self.client_credentials_allowed = allowed;
        self
    }

    /// Obtains a valid authorization for this session.
    ///
    /// Interactive sessions load the principal's persisted authorization;
    /// if none exists or its access token has expired, the call fails
    /// closed with [`Error::AuthorizationNeeded`] carrying a login URI with
    /// a freshly issued state. Principal-less sessions use the
    /// client-credentials grant when allowed, reusing or refreshing a
    /// stored token where possible.
    ///
    /// Two sessions racing to refresh the same principal produce two valid
    /// token exchanges; the provider tolerates overlapping tokens, so no
    /// cross-request single-flight guard is taken.
    ///
    /// # Errors
    ///
    /// [`Error::AuthorizationNeeded`] when an interactive login is
    /// required, [`Error::MissingClientSecret`] when neither a principal
    /// nor the client-credentials fallback is available, and
    /// [`Error::AuthenticationFailed`] when the provider rejects the
    /// credentials.
    pub async fn authenticate(&self) -> Result<Authorization> {
        if let Some(current) = self.cached_authorization() {
            return Ok(current);
        }

        let authorization = if let Some(account) = self.account.clone() {
            self.authenticate_interactive(&account).await?
        } else if self.client_credentials_allowed {
            self.authenticate_client_credentials().await?
        } else {
            return Err(Error::MissingClientSecret);
        };

        if let Ok(mut current) = self.current.lock() {
            *current = Some(authorization.clone());
        }
        Ok(authorization)
    }

    /// Obtains a valid bearer access token for this session.
    ///
    /// # Errors
    ///
    /// Propagates [`authenticate`](Self::authenticate) failures.
    pub async fn access_token(&self) -> Result<String> {
        Ok(self.authenticate().await?.token.access_token)
    }

    /// Issues a login URI for the given principal, persisting the state
    /// parameter for later verification.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be persisted or the authorize
    /// URL cannot be built.
    pub async fn start_authorization(
        &self,
        account_identifier: &str,
        return_uri: &str,
    ) -> Result<String> {
        let state = generate_state();
        self.store
            .put_pending_state(&PendingAuthorization {
                state: state.clone(),
                account_identifier: account_identifier.to_string(),
                return_uri: return_uri.to_string(),
                issued_at: Utc::now(),
            })
            .await?;

        let url = self.oauth.authorization_url(None, &state)?;
        debug!(account = %account_identifier, "issued authorization state");
        Ok(url.to_string())
    }

    /// Finishes an interactive authorization.
    ///
    /// Verifies that `state` was previously issued (anti-CSRF), exchanges
    /// the code, persists the authorization keyed by the principal recorded
    /// at issuance, and returns the redirect target with the internal OAuth
    /// query parameters stripped.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] for unknown or reused states,
    /// [`Error::AuthenticationFailed`] when the provider rejects the code.
    pub async fn finish_authorization(
        &self,
        state: &str,
        code: &str,
        scope: &str,
    ) -> Result<String> {
        let pending = self
            .store
            .take_pending_state(state)
            .await?
            .ok_or_else(|| Error::InvalidState(state.to_string()))?;

        let mut token = self
            .oauth
            .exchange_code(code)
            .await
            .map_err(map_provider_rejection)?;
        if !scope.is_empty() {
            token = token.with_scope(scope);
        }

        let authorization = Authorization {
            authorization_id: format!("{}-{}", self.service_name, generate_state()),
            client_id: self.oauth.app_id.clone(),
            grant_type: GrantType::AuthorizationCode,
            token,
            metadata: serde_json::json!({
                "account": pending.account_identifier,
                "issued_at": pending.issued_at.to_rfc3339(),
            }),
        };
        self.store.save_authorization(&authorization).await?;
        self.store
            .link_account(&AccountAuthorization {
                account_identifier: pending.account_identifier.clone(),
                authorization_id: authorization.authorization_id.clone(),
            })
            .await?;

        debug!(account = %pending.account_identifier, "finished authorization");
        Ok(strip_oauth_params(&pending.return_uri))
    }

    fn cached_authorization(&self) -> Option<Authorization> {
        let mut current = self.current.lock().ok()?;
        match current.as_ref() {
            Some(authorization) if !authorization.is_expired() => Some(authorization.clone()),
            _ => {
                *current = None;
                None
            }
        }
    }

    async fn authenticate_interactive(&self, account: &str) -> Result<Authorization> {
        let authorization = match self.store.find_account_authorization(account).await? {
            Some(link) => self.store.find_authorization(&link.authorization_id).await?,
            None => None,
        };

        match authorization {
            Some(authorization) if !authorization.is_expired() => Ok(authorization),
            _ => {
                let return_uri = self.return_uri.clone().unwrap_or_default();
                let login_uri = self.start_authorization(account, &return_uri).await?;
                Err(Error::AuthorizationNeeded { login_uri })
            }
        }
    }

    async fn authenticate_client_credentials(&self) -> Result<Authorization> {
        let authorization_id = self.client_credentials_authorization_id();

        if let Some(stored) = self.store.find_authorization(&authorization_id).await? {
            if !stored.is_expired() {
                return Ok(stored);
            }
            // Refresh where possible, otherwise fall through to a new grant.
            if stored.token.refresh_token.is_some() {
                if let Ok(token) = self.oauth.refresh(&stored.token).await {
                    let refreshed = Authorization { token, ..stored };
                    self.store.save_authorization(&refreshed).await?;
                    return Ok(refreshed);
                }
            }
        }

        let token = self
            .oauth
            .client_credentials(None)
            .await
            .map_err(map_provider_rejection)?;

        let authorization = Authorization {
            authorization_id,
            client_id: self.oauth.app_id.clone(),
            grant_type: GrantType::ClientCredentials,
            token,
            metadata: serde_json::Value::Null,
        };
        self.store.save_authorization(&authorization).await?;
        Ok(authorization)
    }

    /// Deterministic authorization id for the client-credentials grant, so
    /// repeated service sessions share one stored record. The secret only
    /// enters hashed.
    fn client_credentials_authorization_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.service_name.as_bytes());
        hasher.update(self.oauth.app_id.as_bytes());
        hasher.update(Sha256::digest(self.oauth.app_secret.as_bytes()));
        format!("{}-clientcredentials-{:x}", self.service_name, hasher.finalize())
    }
}

fn map_provider_rejection(error: canto_oauth::Error) -> Error {
    match error {
        canto_oauth::Error::IdentityProvider { error, description } => {
            Error::AuthenticationFailed(format!("{error}: {description}"))
        }
        other => Error::OAuth(other),
    }
}

/// Removes the internal OAuth query parameters from a return URI.
fn strip_oauth_params(uri: &str) -> String {
    let Ok(mut url) = Url::parse(uri) else {
        return uri.to_string();
    };

    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !OAUTH_QUERY_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if remaining.is_empty() {
        url.set_query(None);
    } else {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &remaining {
            pairs.append_pair(key, value);
        }
    }
    url.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use canto_oauth::{Provider, Token};
    use chrono::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oauth_client(base: &str) -> OAuthClient {
        let provider = Provider::new(format!("{base}/oauth2")).unwrap();
        OAuthClient::new("app", "secret", provider)
    }

    async fn session_with_store(base: &str) -> OAuthSession {
        let store = AuthorizationRepository::in_memory().await.unwrap();
        OAuthSession::new(oauth_client(base), store, "canto")
    }

    #[test]
    fn test_strip_oauth_params() {
        assert_eq!(
            strip_oauth_params("https://example.net/media?code=abc&state=xyz&scope=&tab=assets"),
            "https://example.net/media?tab=assets"
        );
        assert_eq!(
            strip_oauth_params("https://example.net/media?code=abc"),
            "https://example.net/media"
        );
        // Non-URL return targets pass through untouched.
        assert_eq!(strip_oauth_params(""), "");
    }

    #[tokio::test]
    async fn test_no_principal_and_no_fallback_fails() {
        let session = session_with_store("https://oauth.example.net").await;
        let err = session.authenticate().await.unwrap_err();
        assert!(matches!(err, Error::MissingClientSecret));
    }

    #[tokio::test]
    async fn test_interactive_without_authorization_fails_closed() {
        let session = session_with_store("https://oauth.example.net")
            .await
            .for_account("jdoe")
            .with_return_uri("https://example.net/media");

        let err = session.authenticate().await.unwrap_err();
        match err {
            Error::AuthorizationNeeded { login_uri } => {
                assert!(login_uri.contains("/token/authorize"));
                assert!(login_uri.contains("app_id=app"));
                assert!(login_uri.contains("state="));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_interactive_with_expired_token_fails_closed() {
        let session = session_with_store("https://oauth.example.net")
            .await
            .for_account("jdoe");

        let expired = Authorization {
            authorization_id: "auth-1".to_string(),
            client_id: "app".to_string(),
            grant_type: GrantType::AuthorizationCode,
            token: Token::new("stale", "Bearer").with_expires_at(Utc::now() - Duration::hours(1)),
            metadata: serde_json::Value::Null,
        };
        session.store.save_authorization(&expired).await.unwrap();
        session
            .store
            .link_account(&AccountAuthorization {
                account_identifier: "jdoe".to_string(),
                authorization_id: "auth-1".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(
            session.authenticate().await,
            Err(Error::AuthorizationNeeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_interactive_with_valid_authorization_succeeds() {
        let session = session_with_store("https://oauth.example.net")
            .await
            .for_account("jdoe");

        let valid = Authorization {
            authorization_id: "auth-1".to_string(),
            client_id: "app".to_string(),
            grant_type: GrantType::AuthorizationCode,
            token: Token::new("good", "Bearer").with_expires_at(Utc::now() + Duration::hours(1)),
            metadata: serde_json::Value::Null,
        };
        session.store.save_authorization(&valid).await.unwrap();
        session
            .store
            .link_account(&AccountAuthorization {
                account_identifier: "jdoe".to_string(),
                authorization_id: "auth-1".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(session.access_token().await.unwrap(), "good");
    }

    #[tokio::test]
    async fn test_client_credentials_requests_and_stores_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "accessToken": "svc-token",
                "expiresIn": 3600,
                "tokenType": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = session_with_store(&server.uri())
            .await
            .allow_client_credentials(true);

        // Two calls, one token request: the second is served from store/memo.
        assert_eq!(session.access_token().await.unwrap(), "svc-token");
        assert_eq!(session.access_token().await.unwrap(), "svc-token");
    }

    #[tokio::test]
    async fn test_client_credentials_rejection_is_authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_client",
                "error_description": "bad app secret"
            })))
            .mount(&server)
            .await;

        let session = session_with_store(&server.uri())
            .await
            .allow_client_credentials(true);

        assert!(matches!(
            session.authenticate().await,
            Err(Error::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_finish_authorization_links_principal_and_cleans_uri() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=code123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "accessToken": "interactive-token",
                "expiresIn": 3600,
                "tokenType": "Bearer",
                "refreshToken": "refresh-1"
            })))
            .mount(&server)
            .await;

        let session = session_with_store(&server.uri()).await;
        let login_uri = session
            .start_authorization("jdoe", "https://example.net/media?code=x&state=y&tab=assets")
            .await
            .unwrap();
        let state = Url::parse(&login_uri)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        let return_uri = session
            .finish_authorization(&state, "code123", "admin")
            .await
            .unwrap();
        assert_eq!(return_uri, "https://example.net/media?tab=assets");

        let link = session
            .store
            .find_account_authorization("jdoe")
            .await
            .unwrap()
            .unwrap();
        let authorization = session
            .store
            .find_authorization(&link.authorization_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(authorization.token.access_token, "interactive-token");
        assert_eq!(authorization.token.scope.as_deref(), Some("admin"));
        assert_eq!(authorization.metadata["account"], "jdoe");

        // The state is single use.
        assert!(matches!(
            session.finish_authorization(&state, "code123", "").await,
            Err(Error::InvalidState(_))
        ));
    }
}
