//! Authenticated client for the Canto REST API.

mod types;

pub use types::{CustomField, SearchResponse};

use std::time::{Duration, Instant};

use reqwest::{Client, Method, Response, StatusCode};
use tracing::debug;
use url::{Url, form_urlencoded};

use crate::asset::AssetIdentifier;
use crate::auth::OAuthSession;
use crate::query::{OrderDirection, OrderField, Ordering};
use crate::{Error, Result};

/// Connect timeout for outbound API calls.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Total request timeout for outbound API calls. These calls run inline in
/// a web request path, so hanging is worse than failing.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Canto API client.
///
/// Every call authenticates transparently through the session and sends a
/// `Authorization: Bearer` header. Authentication and transport failures
/// propagate; only [`custom_fields`](Self::custom_fields),
/// [`user`](Self::user) and [`tree`](Self::tree) degrade to empty results
/// on non-200 responses.
pub struct ApiClient {
    api_base_uri: String,
    session: OAuthSession,
    http_client: Client,
}

impl ApiClient {
    /// Creates a client for the given API base URI,
    /// e.g. `https://acme.canto.global/api/v1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_base_uri: impl Into<String>, session: OAuthSession) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            api_base_uri: api_base_uri.into().trim_end_matches('/').to_string(),
            session,
            http_client,
        })
    }

    /// The session this client authenticates through.
    #[must_use]
    pub const fn session(&self) -> &OAuthSession {
        &self.session
    }

    /// Searches the library.
    ///
    /// `custom_query` is appended to the query string verbatim; it is
    /// produced by the query translator and already URL-safe.
    ///
    /// # Errors
    ///
    /// Returns an error on authentication failure, transport failure,
    /// non-2xx responses or a malformed body.
    pub async fn search(
        &self,
        keyword: &str,
        format_types: &[&str],
        custom_query: &str,
        offset: u64,
        limit: u64,
        orderings: &[Ordering],
    ) -> Result<SearchResponse> {
        let path_and_query =
            build_search_query(keyword, format_types, custom_query, offset, limit, orderings);
        let response = self
            .send_authenticated(&path_and_query, Method::GET, None)
            .await?;

        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus {
                status: response.status().as_u16(),
                path: "search".to_string(),
            });
        }
        Ok(response.json().await?)
    }

    /// Fetches the raw metadata object for one asset.
    ///
    /// # Errors
    ///
    /// [`Error::AssetNotFound`] on 404; transport, authentication and
    /// malformed-body errors otherwise.
    pub async fn get_file(&self, identifier: &AssetIdentifier) -> Result<serde_json::Value> {
        let path = format!("{}/{}", identifier.scheme(), identifier.id());
        let response = self.send_authenticated(&path, Method::GET, None).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::AssetNotFound(identifier.to_string())),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                path,
            }),
        }
    }

    /// Updates remote metadata for one asset; at minimum the keyword list.
    ///
    /// # Errors
    ///
    /// [`Error::AssetNotFound`] on 404, [`Error::UnexpectedStatus`] on any
    /// other non-2xx response.
    pub async fn update_file(&self, identifier: &AssetIdentifier, keywords: &str) -> Result<()> {
        let path = format!("{}/{}", identifier.scheme(), identifier.id());
        let body = serde_json::json!({ "keywords": keywords });
        let response = self
            .send_authenticated(&path, Method::PUT, Some(body))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::AssetNotFound(identifier.to_string())),
            status if status.is_success() => Ok(()),
            status => Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                path,
            }),
        }
    }

    /// Lists the remote custom fields. Non-200 responses yield an empty
    /// list; a missing field configuration is not fatal to a search.
    ///
    /// # Errors
    ///
    /// Returns an error on authentication failure, transport failure or a
    /// malformed body.
    pub async fn custom_fields(&self) -> Result<Vec<CustomField>> {
        let response = self
            .send_authenticated("custom/field", Method::GET, None)
            .await?;
        if response.status() == StatusCode::OK {
            return Ok(response.json().await?);
        }
        Ok(Vec::new())
    }

    /// Fetches the authenticated user's profile. Non-200 yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns an error on authentication failure, transport failure or a
    /// malformed body.
    pub async fn user(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        self.fetch_map("user").await
    }

    /// Fetches the folder tree. Non-200 yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns an error on authentication failure, transport failure or a
    /// malformed body.
    pub async fn tree(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        self.fetch_map("tree").await
    }

    /// Resolves the direct binary download URI for an asset.
    ///
    /// Uses the binary subdomain variant of the base URI (`/api/` replaced
    /// with `/api_binary/`). Returns `None` on any non-200 response.
    ///
    /// # Errors
    ///
    /// Returns an error on authentication failure, transport failure or a
    /// response body that is not a URL.
    pub async fn direct_uri(&self, identifier: &AssetIdentifier) -> Result<Option<Url>> {
        let access_token = self.session.access_token().await?;
        let binary_base_uri = self.api_base_uri.replace("/api/", "/api_binary/");
        let uri = format!(
            "{}/{}/{}/directuri",
            binary_base_uri,
            identifier.scheme(),
            identifier.id()
        );

        let response = self
            .http_client
            .get(&uri)
            .header("Content-Type", "application/json")
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            let body = response.text().await?;
            return Ok(Some(Url::parse(body.trim())?));
        }
        Ok(None)
    }

    async fn fetch_map(
        &self,
        path: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let response = self.send_authenticated(path, Method::GET, None).await?;
        if response.status() == StatusCode::OK {
            return Ok(response.json().await?);
        }
        Ok(serde_json::Map::new())
    }

    /// Sends a Bearer-authenticated request to a path (with query) below
    /// the API base URI, logging the elapsed time.
    async fn send_authenticated(
        &self,
        path_and_query: &str,
        method: Method,
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        let access_token = self.session.access_token().await?;
        let uri = format!("{}/{}", self.api_base_uri, path_and_query);

        let mut request = self
            .http_client
            .request(method.clone(), &uri)
            .header("Content-Type", "application/json")
            .bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let started = Instant::now();
        let response = request.send().await?;
        debug!(
            %method,
            path = %path_and_query,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "canto api request"
        );
        Ok(response)
    }
}

/// Builds the `search` path and query string.
///
/// Kept free of I/O so the exact wire form stays testable.
fn build_search_query(
    keyword: &str,
    format_types: &[&str],
    custom_query: &str,
    offset: u64,
    limit: u64,
    orderings: &[Ordering],
) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.append_pair("keyword", keyword);
    serializer.append_pair("limit", &limit.to_string());
    serializer.append_pair("start", &offset.to_string());

    if !format_types.is_empty() {
        serializer.append_pair("scheme", &format_types.join("|"));
    }

    for ordering in orderings {
        let sort_by = match ordering.field {
            OrderField::Filename => "name",
            OrderField::LastModified => "last_modified",
        };
        let direction = match ordering.direction {
            OrderDirection::Ascending => "ascending",
            OrderDirection::Descending => "descending",
        };
        serializer.append_pair("sortBy", sort_by);
        serializer.append_pair("sortDirection", direction);
    }

    let mut path_and_query = format!("search?{}", serializer.finish());
    // The translator's fragment is pre-encoded and starts with '&'.
    path_and_query.push_str(custom_query);
    path_and_query
}
