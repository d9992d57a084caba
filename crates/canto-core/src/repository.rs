//! Read-through repository over the remote library and the proxy cache.

use std::sync::Arc;

use tracing::debug;

use crate::asset::{AssetIdentifier, AssetProxy, AssetProxyCache};
use crate::client::ApiClient;
use crate::config::CantoConfig;
use crate::query::{AssetTypeFilter, Ordering, Query, QueryResult, TagFilter};
use crate::{Error, Result};

/// Repository of asset proxies.
///
/// Single fetches go through the cache; finders return lazy
/// [`QueryResult`]s whose materialization populates the cache as a side
/// effect. The repository carries a sticky type filter and ordering that
/// apply to every query it builds.
#[derive(Clone)]
pub struct AssetProxyRepository {
    client: Arc<ApiClient>,
    cache: Arc<AssetProxyCache>,
    config: Arc<CantoConfig>,
    asset_type: AssetTypeFilter,
    orderings: Vec<Ordering>,
}

impl AssetProxyRepository {
    /// Creates a repository with no type filter and no ordering.
    #[must_use]
    pub fn new(
        client: Arc<ApiClient>,
        cache: Arc<AssetProxyCache>,
        config: Arc<CantoConfig>,
    ) -> Self {
        Self {
            client,
            cache,
            config,
            asset_type: AssetTypeFilter::All,
            orderings: Vec::new(),
        }
    }

    /// The API client queries run against.
    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// The proxy cache backing single fetches.
    #[must_use]
    pub fn cache(&self) -> &AssetProxyCache {
        &self.cache
    }

    /// Restricts subsequent queries to one asset type; `None` resets the
    /// filter.
    pub fn filter_by_type(&mut self, asset_type: Option<AssetTypeFilter>) {
        self.asset_type = asset_type.unwrap_or_default();
    }

    /// Sets the ordering applied to subsequent queries.
    pub fn order_by(&mut self, orderings: Vec<Ordering>) {
        self.orderings = orderings;
    }

    /// Fetches one asset proxy by its `{scheme}-{id}` identifier, from the
    /// cache when possible.
    ///
    /// A cache miss fetches the raw object from the API and caches it; a
    /// fetched body that is not a JSON object counts as not found.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidIdentifier`] for a malformed identifier,
    /// [`Error::AssetNotFound`] when the remote has no such asset, and
    /// authentication/transport errors otherwise.
    pub async fn get_asset_proxy(&self, identifier: &str) -> Result<AssetProxy> {
        let parsed: AssetIdentifier = identifier.parse()?;

        let raw = match self.cached_object(identifier) {
            Some(raw) => raw,
            None => {
                let raw = self.client.get_file(&parsed).await?;
                if !raw.is_object() {
                    return Err(Error::AssetNotFound(identifier.to_string()));
                }
                if let Ok(serialized) = serde_json::to_string(&raw) {
                    self.cache.set(identifier, serialized);
                }
                raw
            }
        };

        AssetProxy::from_json(&raw, self.config.thumbnail_size, self.config.preview_size)
    }

    /// All assets, paged.
    #[must_use]
    pub fn find_all(&self) -> QueryResult {
        self.query().execute()
    }

    /// Assets matching a free-text search term.
    #[must_use]
    pub fn find_by_search_term(&self, term: &str) -> QueryResult {
        let mut query = self.query();
        query.set_search_term(term);
        query.execute()
    }

    /// Assets carrying the given tag, optionally narrowed to one collection.
    #[must_use]
    pub fn find_by_tag(&self, tag: TagFilter, collection: Option<String>) -> QueryResult {
        let mut query = self.query();
        query.set_tag(Some(tag));
        query.set_collection(collection);
        query.execute()
    }

    /// Assets without any tag, optionally narrowed to one collection.
    #[must_use]
    pub fn find_untagged(&self, collection: Option<String>) -> QueryResult {
        let mut query = self.query();
        query.set_untagged(true);
        query.set_collection(collection);
        query.execute()
    }

    /// Total number of assets matching the sticky type filter.
    ///
    /// # Errors
    ///
    /// Propagates the underlying search failure.
    pub async fn count_all(&self) -> Result<u64> {
        self.query().count().await
    }

    /// Number of assets carrying the given tag.
    ///
    /// # Errors
    ///
    /// Propagates the underlying search failure.
    pub async fn count_by_tag(&self, tag: TagFilter, collection: Option<String>) -> Result<u64> {
        let mut query = self.query();
        query.set_tag(Some(tag));
        query.set_collection(collection);
        query.count().await
    }

    /// Number of assets without any tag.
    ///
    /// # Errors
    ///
    /// Propagates the underlying search failure.
    pub async fn count_untagged(&self, collection: Option<String>) -> Result<u64> {
        let mut query = self.query();
        query.set_untagged(true);
        query.set_collection(collection);
        query.count().await
    }

    fn query(&self) -> Query {
        let mut query = Query::new(
            Arc::clone(&self.client),
            Arc::clone(&self.cache),
            Arc::clone(&self.config),
        );
        query.set_asset_type(self.asset_type);
        query.set_orderings(self.orderings.clone());
        query
    }

    /// Returns the cached raw object, treating an unparsable cache entry
    /// as a miss.
    fn cached_object(&self, identifier: &str) -> Option<serde_json::Value> {
        let cached = self.cache.get(identifier)?;
        match serde_json::from_str(&cached) {
            Ok(value) => Some(value),
            Err(error) => {
                debug!(identifier, %error, "discarding unparsable cache entry");
                self.cache.remove(identifier);
                None
            }
        }
    }
}
