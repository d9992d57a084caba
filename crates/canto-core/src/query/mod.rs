//! Structured queries over the remote library and their lazily
//! materialized results.

mod translate;

pub(crate) use translate::{tag_query_fragment, untagged_query_fragment};

use std::sync::Arc;

use crate::asset::{AssetIdentifier, AssetProxy, AssetProxyCache};
use crate::client::{ApiClient, SearchResponse};
use crate::config::CantoConfig;
use crate::{Error, Result};

/// Default page size.
const DEFAULT_LIMIT: u64 = 30;

/// Coarse asset-type filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssetTypeFilter {
    /// All supported format types.
    #[default]
    All,
    /// Images only.
    Image,
    /// Videos only.
    Video,
    /// Audio only.
    Audio,
    /// Documents only.
    Document,
}

impl AssetTypeFilter {
    /// The remote format types the filter translates to.
    #[must_use]
    pub const fn format_types(self) -> &'static [&'static str] {
        match self {
            Self::All => &["image", "video", "audio", "document", "presentation", "other"],
            Self::Image => &["image"],
            Self::Video => &["video"],
            Self::Audio => &["audio"],
            Self::Document => &["document"],
        }
    }
}

/// Sortable fields; the remote API supports no others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    /// Sort by filename (`sortBy=name`).
    Filename,
    /// Sort by modification time (`sortBy=last_modified`).
    LastModified,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending.
    Ascending,
    /// Descending.
    Descending,
}

/// One ordering clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordering {
    /// Field to sort by.
    pub field: OrderField,
    /// Direction to sort in.
    pub direction: OrderDirection,
}

impl Ordering {
    /// Ascending ordering on a field.
    #[must_use]
    pub const fn ascending(field: OrderField) -> Self {
        Self {
            field,
            direction: OrderDirection::Ascending,
        }
    }

    /// Descending ordering on a field.
    #[must_use]
    pub const fn descending(field: OrderField) -> Self {
        Self {
            field,
            direction: OrderDirection::Descending,
        }
    }
}

/// An active tag filter: the tag's label and the titles of the
/// collections it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    /// Tag label, matched against custom-field values.
    pub label: String,
    /// Titles of the collections the tag is a member of.
    pub collection_titles: Vec<String>,
}

impl TagFilter {
    /// Creates a tag filter.
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        collection_titles: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            label: label.into(),
            collection_titles: collection_titles.into_iter().collect(),
        }
    }
}

/// A mutable search specification against the remote library.
///
/// Executing a query snapshots its state into a [`QueryResult`]; mutating
/// the query afterwards never changes results already materialized.
#[derive(Clone)]
pub struct Query {
    client: Arc<ApiClient>,
    cache: Arc<AssetProxyCache>,
    config: Arc<CantoConfig>,
    search_term: String,
    asset_type: AssetTypeFilter,
    tag: Option<TagFilter>,
    collection: Option<String>,
    untagged: bool,
    orderings: Vec<Ordering>,
    offset: u64,
    limit: u64,
}

impl Query {
    /// Creates an unfiltered query with the default paging window.
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
            search_term: String::new(),
            asset_type: AssetTypeFilter::All,
            tag: None,
            collection: None,
            untagged: false,
            orderings: Vec::new(),
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }

    /// Sets the free-text search term.
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    /// The free-text search term.
    #[must_use]
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// Sets the asset-type filter.
    pub const fn set_asset_type(&mut self, asset_type: AssetTypeFilter) {
        self.asset_type = asset_type;
    }

    /// The asset-type filter.
    #[must_use]
    pub const fn asset_type(&self) -> AssetTypeFilter {
        self.asset_type
    }

    /// Sets the active tag.
    pub fn set_tag(&mut self, tag: Option<TagFilter>) {
        self.tag = tag;
    }

    /// The active tag.
    #[must_use]
    pub const fn tag(&self) -> Option<&TagFilter> {
        self.tag.as_ref()
    }

    /// Sets the active collection title.
    pub fn set_collection(&mut self, collection: Option<String>) {
        self.collection = collection;
    }

    /// The active collection title.
    #[must_use]
    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// Restricts the query to assets without a value in the relevant
    /// collection field(s).
    pub const fn set_untagged(&mut self, untagged: bool) {
        self.untagged = untagged;
    }

    /// Sets the ordering clauses.
    pub fn set_orderings(&mut self, orderings: Vec<Ordering>) {
        self.orderings = orderings;
    }

    /// The ordering clauses.
    #[must_use]
    pub fn orderings(&self) -> &[Ordering] {
        &self.orderings
    }

    /// Sets the result offset.
    pub const fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    /// The result offset.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Sets the page size.
    pub const fn set_limit(&mut self, limit: u64) {
        self.limit = limit;
    }

    /// The page size.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Snapshots the current filter state into a lazy result set.
    #[must_use]
    pub fn execute(&self) -> QueryResult {
        QueryResult::new(self.clone())
    }

    /// Counts matching assets with a lightweight limit-1 search.
    ///
    /// # Errors
    ///
    /// Propagates authentication, transport and malformed-response errors.
    pub async fn count(&self) -> Result<u64> {
        let response = self.send_search(1, &[]).await?;
        Ok(response.found)
    }

    /// Runs the search and returns the materialized page of proxies.
    ///
    /// Every raw hit is written to the asset-proxy cache keyed by its
    /// identifier before being parsed.
    ///
    /// # Errors
    ///
    /// Propagates authentication, transport and malformed-response errors;
    /// a hit without `scheme`/`id` is a malformed response.
    pub async fn fetch(&self) -> Result<Vec<AssetProxy>> {
        let response = self.send_search(self.limit, &self.orderings).await?;

        let mut proxies = Vec::with_capacity(response.results.len());
        for raw in &response.results {
            let identifier = identifier_of(raw)?;
            // Best effort: a cache write must never abort the search.
            if let Ok(serialized) = serde_json::to_string(raw) {
                self.cache.set(&identifier.to_string(), serialized);
            }
            proxies.push(AssetProxy::from_json(
                raw,
                self.config.thumbnail_size,
                self.config.preview_size,
            )?);
        }
        Ok(proxies)
    }

    async fn send_search(&self, limit: u64, orderings: &[Ordering]) -> Result<SearchResponse> {
        let custom_query = self.custom_query_fragment().await?;
        self.client
            .search(
                &self.search_term,
                self.asset_type.format_types(),
                &custom_query,
                self.offset,
                limit,
                orderings,
            )
            .await
    }

    /// Builds the custom-field query fragment for the active tag or the
    /// untagged filter, resolving field names through the API.
    async fn custom_query_fragment(&self) -> Result<String> {
        if self.untagged {
            let fields = self.client.custom_fields().await?;
            return Ok(untagged_query_fragment(
                &fields,
                &self.config,
                self.collection.as_deref(),
            ));
        }
        if let Some(tag) = &self.tag {
            let fields = self.client.custom_fields().await?;
            return Ok(tag_query_fragment(
                &fields,
                &self.config,
                tag,
                self.collection.as_deref(),
            ));
        }
        Ok(String::new())
    }
}

fn identifier_of(raw: &serde_json::Value) -> Result<AssetIdentifier> {
    match (raw["scheme"].as_str(), raw["id"].as_str()) {
        (Some(scheme), Some(id)) => Ok(AssetIdentifier::new(scheme, id)),
        _ => Err(Error::InvalidIdentifier(format!(
            "search hit without scheme/id: {raw}"
        ))),
    }
}

/// Lazy, single-use snapshot of a query's results.
///
/// Materializes at most once: repeated [`to_array`](Self::to_array) calls
/// and iteration reuse the first fetch. [`count`](Self::count) uses the
/// materialized length when available and a lightweight count call
/// otherwise, cached either way.
pub struct QueryResult {
    query: Query,
    proxies: Option<Vec<AssetProxy>>,
    total: Option<u64>,
}

impl QueryResult {
    fn new(query: Query) -> Self {
        Self {
            query,
            proxies: None,
            total: None,
        }
    }

    /// The snapshot of the query this result was executed from.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Materializes (once) and returns the result page.
    ///
    /// # Errors
    ///
    /// Propagates the underlying search failure.
    pub async fn to_array(&mut self) -> Result<&[AssetProxy]> {
        if self.proxies.is_none() {
            let proxies = self.query.fetch().await?;
            self.total = Some(proxies.len() as u64);
            self.proxies = Some(proxies);
        }
        Ok(self.proxies.as_deref().unwrap_or_default())
    }

    /// Materializes (once) and returns the first proxy, if any.
    ///
    /// # Errors
    ///
    /// Propagates the underlying search failure.
    pub async fn first(&mut self) -> Result<Option<&AssetProxy>> {
        Ok(self.to_array().await?.first())
    }

    /// Number of results.
    ///
    /// # Errors
    ///
    /// Propagates the underlying count failure.
    pub async fn count(&mut self) -> Result<u64> {
        if let Some(total) = self.total {
            return Ok(total);
        }
        let total = self.query.count().await?;
        self.total = Some(total);
        Ok(total)
    }
}
