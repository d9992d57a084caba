//! `OAuth2` grant flows against the Canto identity provider.

use std::collections::HashMap;

use rand::Rng;
use reqwest::Client;
use url::Url;

use crate::error::Result;
use crate::provider::Provider;
use crate::token::{CantoTokenResponse, ErrorResponse, Token};

/// Length of generated `state` parameters.
const STATE_LENGTH: usize = 32;

/// Generates a random alphanumeric `state` parameter for CSRF protection.
#[must_use]
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    (0..STATE_LENGTH)
        .map(|_| {
            let chars = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
            chars[rng.gen_range(0..chars.len())] as char
        })
        .collect()
}

/// `OAuth2` client for the Canto identity provider.
///
/// Canto identifies applications with `app_id`/`app_secret` request
/// parameters instead of the generic `client_id`/`client_secret`.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Application ID issued by Canto.
    pub app_id: String,
    /// Application secret issued by Canto.
    pub app_secret: String,
    /// Redirect URI for the authorization code flow.
    pub redirect_uri: Option<String>,
    /// Provider endpoint configuration.
    pub provider: Provider,
    /// HTTP client.
    http_client: Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    #[must_use]
    pub fn new(
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        provider: Provider,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            redirect_uri: None,
            provider,
            http_client: Client::new(),
        }
    }

    /// Sets the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Builds the authorization URL for user consent.
    ///
    /// The user should be redirected to this URL; after consent the
    /// provider redirects back with `code` and `state` query parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the authorize endpoint URL cannot be parsed.
    pub fn authorization_url(&self, scope: Option<&str>, state: &str) -> Result<Url> {
        let mut url = Url::parse(&self.provider.authorize_uri())?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("app_id", &self.app_id)
                .append_pair("response_type", "code");

            if let Some(redirect_uri) = &self.redirect_uri {
                pairs.append_pair("redirect_uri", redirect_uri);
            }
            if let Some(scope) = scope {
                if !scope.is_empty() {
                    pairs.append_pair("scope", scope);
                }
            }
            pairs.append_pair("state", state);
        }

        Ok(url)
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the token request fails or the provider rejects
    /// the code.
    pub async fn exchange_code(&self, code: &str) -> Result<Token> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("app_id", &self.app_id);
        params.insert("app_secret", &self.app_secret);

        if let Some(uri) = self.redirect_uri.as_deref() {
            params.insert("redirect_uri", uri);
        }

        self.request_token(&params, None).await
    }

    /// Requests an access token with the client-credentials grant.
    ///
    /// Used for service-to-service calls with no user context.
    ///
    /// # Errors
    ///
    /// Returns an error if the token request fails or the provider rejects
    /// the credentials.
    pub async fn client_credentials(&self, scope: Option<&str>) -> Result<Token> {
        let mut params = HashMap::new();
        params.insert("grant_type", "client_credentials");
        params.insert("app_id", &self.app_id);
        params.insert("app_secret", &self.app_secret);
        if let Some(scope) = scope {
            if !scope.is_empty() {
                params.insert("scope", scope);
            }
        }

        self.request_token(&params, scope.map(ToString::to_string)).await
    }

    /// Refreshes an access token using its refresh token.
    ///
    /// If the provider omits a refresh token from the response, the old one
    /// is preserved.
    ///
    /// # Errors
    ///
    /// Returns an error if the token has no refresh token or the refresh
    /// request fails.
    pub async fn refresh(&self, token: &Token) -> Result<Token> {
        let refresh_token = token.refresh_token()?;

        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("app_id", &self.app_id);
        params.insert("app_secret", &self.app_secret);

        let mut new_token = self.request_token(&params, token.scope.clone()).await?;
        if new_token.refresh_token.is_none() {
            new_token.refresh_token.clone_from(&token.refresh_token);
        }
        Ok(new_token)
    }

    async fn request_token(
        &self,
        params: &HashMap<&str, &str>,
        scope: Option<String>,
    ) -> Result<Token> {
        let response = self
            .http_client
            .post(self.provider.token_uri())
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await?;
            return Err(serde_json::from_str::<ErrorResponse>(&body).map_or_else(
                |_| {
                    crate::Error::InvalidResponse(format!(
                        "token endpoint returned an unparseable error body: {body}"
                    ))
                },
                ErrorResponse::into_error,
            ));
        }

        let token_response: CantoTokenResponse = response.json().await?;
        token_response.into_token(scope)
    }
}
