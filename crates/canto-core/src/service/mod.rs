//! Batch and event-driven services on top of the repository.

mod import;
mod retag;
mod update;

pub use import::{CollectionImport, import_custom_fields};
pub use retag::{LocalAsset, RetagOutcome, RetagReport, retag_used_assets};
pub use update::{AssetUpdateService, UpdateOutcome};
