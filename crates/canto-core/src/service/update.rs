//! Event-driven refresh of cached asset proxies.

use tracing::debug;

use crate::asset::{AssetIdentifier, AssetProxy};
use crate::repository::AssetProxyRepository;
use crate::webhook::WebhookPayload;
use crate::Result;

/// Applies remote change notifications to the proxy cache.
#[derive(Clone)]
pub struct AssetUpdateService {
    repository: AssetProxyRepository,
}

/// What an event did to the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The cached entry was dropped and replaced with fresh metadata.
    Refreshed(AssetProxy),
    /// The event type carries no cache semantics and was acknowledged.
    Ignored,
}

impl AssetUpdateService {
    /// Creates the service.
    #[must_use]
    pub const fn new(repository: AssetProxyRepository) -> Self {
        Self { repository }
    }

    /// Handles one change event.
    ///
    /// `update` and `add` invalidate the cached entry for the named asset
    /// and immediately refetch it, so the next read is already warm. Any
    /// other event is acknowledged without touching the cache.
    ///
    /// # Errors
    ///
    /// Propagates identifier, fetch and authentication failures.
    pub async fn handle_event(
        &self,
        event: &str,
        payload: &WebhookPayload,
    ) -> Result<UpdateOutcome> {
        match event {
            "update" | "add" => {
                let identifier =
                    AssetIdentifier::new(&payload.scheme, &payload.id).to_string();
                self.repository.cache().remove(&identifier);
                let proxy = self.repository.get_asset_proxy(&identifier).await?;
                debug!(identifier, event, "refreshed cached asset proxy");
                Ok(UpdateOutcome::Refreshed(proxy))
            }
            _ => {
                debug!(event, "ignoring webhook event without cache semantics");
                Ok(UpdateOutcome::Ignored)
            }
        }
    }
}
