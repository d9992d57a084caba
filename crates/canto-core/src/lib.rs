//! # canto-core
//!
//! Core connector between a content-management asset library and the Canto
//! digital asset management API.
//!
//! This crate provides:
//! - `OAuth2` session management with persisted authorizations (interactive
//!   authorization-code and service client-credentials grants)
//! - An authenticated API client for Canto's REST surface (search, file
//!   metadata, custom fields, direct binary URIs, metadata writes)
//! - **Asset proxies** - read-only snapshots of remote assets with derived
//!   preview/thumbnail URIs
//! - **Asset-proxy cache** - a read-through/write-through accelerator keyed
//!   by remote asset identifier
//! - **Query translation** - tag/collection filters expressed through
//!   Canto's custom-field query syntax
//! - A transport-agnostic webhook receiver for push invalidation
//! - Batch services for auto-tagging and custom-field imports
//!
//! Web controllers, routing and the host's asset persistence are the host
//! application's concern; this crate only exposes the pieces they call into.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod asset;
pub mod auth;
pub mod client;
pub mod config;
mod error;
pub mod query;
pub mod repository;
pub mod service;
pub mod webhook;

pub use asset::{AssetIdentifier, AssetProxy, AssetProxyCache};
pub use auth::{AccountAuthorization, Authorization, AuthorizationRepository, OAuthSession};
pub use client::{ApiClient, CustomField, SearchResponse};
pub use config::{AutoTagging, CantoConfig, CustomFieldMapping, WebhookConfig};
pub use error::{Error, Result};
pub use query::{
    AssetTypeFilter, OrderDirection, OrderField, Ordering, Query, QueryResult, TagFilter,
};
pub use repository::AssetProxyRepository;
pub use service::{
    AssetUpdateService, CollectionImport, LocalAsset, RetagOutcome, RetagReport, UpdateOutcome,
    import_custom_fields, retag_used_assets,
};
pub use webhook::{WebhookPayload, WebhookReceiver, WebhookResponse};
