//! Transport-agnostic webhook receiver for push invalidation.
//!
//! The host application's HTTP layer hands every inbound request path and
//! body to [`WebhookReceiver::handle`]; requests outside the configured
//! path prefix pass through untouched. The path suffix after the prefix
//! names the event (`update`, `add`, ...).

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::WebhookConfig;
use crate::service::AssetUpdateService;

/// Payload Canto posts with every webhook delivery.
///
/// All three fields are required; a delivery missing any of them is
/// malformed.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Shared secret configured on the Canto side.
    pub secure_token: String,
    /// Asset scheme, e.g. `image`.
    pub scheme: String,
    /// Asset id.
    pub id: String,
}

/// Minimal HTTP response for the host layer to translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookResponse {
    /// HTTP status code.
    pub status: u16,
}

impl WebhookResponse {
    const fn new(status: u16) -> Self {
        Self { status }
    }
}

/// Dispatches webhook deliveries to the update service.
pub struct WebhookReceiver {
    config: WebhookConfig,
    service: AssetUpdateService,
}

impl WebhookReceiver {
    /// Creates a receiver.
    #[must_use]
    pub const fn new(config: WebhookConfig, service: AssetUpdateService) -> Self {
        Self { config, service }
    }

    /// Handles one inbound request.
    ///
    /// Returns `None` when the path does not belong to the receiver (or no
    /// path prefix is configured), and the request should be served
    /// normally. Otherwise returns the response to send: 400 for a
    /// malformed payload, 403 for a token mismatch (before any cache
    /// mutation), 204 after a handled event and 500 when handling fails.
    pub async fn handle(&self, path: &str, body: &[u8]) -> Option<WebhookResponse> {
        let prefix = self.config.path_prefix.as_str();
        if prefix.is_empty() || !path.starts_with(prefix) {
            return None;
        }
        let event = &path[prefix.len()..];

        let payload: WebhookPayload = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(error) => {
                debug!(%error, "rejecting malformed webhook payload");
                return Some(WebhookResponse::new(400));
            }
        };

        if !self.config.token.is_empty() && payload.secure_token != self.config.token {
            warn!(event, "rejecting webhook delivery with wrong token");
            return Some(WebhookResponse::new(403));
        }

        match self.service.handle_event(event, &payload).await {
            Ok(_) => Some(WebhookResponse::new(204)),
            Err(error) => {
                warn!(event, %error, "webhook event handling failed");
                Some(WebhookResponse::new(500))
            }
        }
    }
}
