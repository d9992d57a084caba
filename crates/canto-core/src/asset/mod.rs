//! Remote asset representation: identifiers, read-only proxy snapshots and
//! the metadata cache.

mod cache;
mod model;

pub use cache::AssetProxyCache;
pub use model::{AssetIdentifier, AssetProxy};
