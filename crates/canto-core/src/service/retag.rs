//! Batch re-tagging of remote assets that are in use locally.

use tracing::{debug, warn};

use crate::config::CantoConfig;
use crate::repository::AssetProxyRepository;
use crate::{Error, Result};

/// One locally known asset and how often the host uses it.
#[derive(Debug, Clone)]
pub struct LocalAsset {
    /// Remote `{scheme}-{id}` identifier.
    pub identifier: String,
    /// Human-readable label, for reporting only.
    pub label: String,
    /// Number of local usages.
    pub usage_count: u64,
}

/// What happened to one asset during a re-tagging run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetagOutcome {
    /// The in-use keyword was added remotely.
    Tagged,
    /// The in-use keyword was removed remotely.
    Untagged,
    /// The remote keyword list already matched; nothing was written.
    Unchanged,
}

/// Summary of a re-tagging run.
#[derive(Debug, Default)]
pub struct RetagReport {
    /// Per-asset outcomes, in input order.
    pub outcomes: Vec<(String, RetagOutcome)>,
    /// Assets that could not be processed, with the failure message.
    pub failures: Vec<(String, String)>,
}

impl RetagReport {
    /// Number of remote writes performed.
    #[must_use]
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome != RetagOutcome::Unchanged)
            .count()
    }
}

/// Synchronizes the remote in-use keyword with local usage counts.
///
/// Flushes the proxy cache up front so every decision is made against
/// fresh remote metadata. Assets with at least one usage get the
/// configured keyword added; assets with none get it removed. Keyword
/// lists are written sorted and deduplicated, and assets whose list
/// already matches are skipped. A failure on one asset is recorded and
/// the run continues.
///
/// # Errors
///
/// [`Error::Config`] when auto-tagging is disabled in the configuration.
pub async fn retag_used_assets(
    repository: &AssetProxyRepository,
    config: &CantoConfig,
    assets: &[LocalAsset],
) -> Result<RetagReport> {
    if !config.auto_tagging.enabled {
        return Err(Error::Config("auto-tagging is disabled".to_string()));
    }
    let in_use_tag = config.auto_tagging.in_use_tag.as_str();

    repository.cache().flush();

    let mut report = RetagReport::default();
    for asset in assets {
        match retag_one(repository, in_use_tag, asset).await {
            Ok(outcome) => report.outcomes.push((asset.identifier.clone(), outcome)),
            Err(error) => {
                warn!(
                    identifier = %asset.identifier,
                    label = %asset.label,
                    %error,
                    "skipping asset during re-tagging"
                );
                report
                    .failures
                    .push((asset.identifier.clone(), error.to_string()));
            }
        }
    }
    debug!(
        written = report.written(),
        failed = report.failures.len(),
        "re-tagging run finished"
    );
    Ok(report)
}

async fn retag_one(
    repository: &AssetProxyRepository,
    in_use_tag: &str,
    asset: &LocalAsset,
) -> Result<RetagOutcome> {
    let identifier = asset.identifier.parse()?;
    let proxy = repository.get_asset_proxy(&asset.identifier).await?;

    let mut keywords: Vec<String> = proxy.tags.clone();
    keywords.sort();
    keywords.dedup();
    let currently_tagged = keywords.iter().any(|k| k == in_use_tag);

    let outcome = if asset.usage_count > 0 {
        if currently_tagged {
            return Ok(RetagOutcome::Unchanged);
        }
        keywords.push(in_use_tag.to_string());
        keywords.sort();
        RetagOutcome::Tagged
    } else {
        if !currently_tagged {
            return Ok(RetagOutcome::Unchanged);
        }
        keywords.retain(|k| k != in_use_tag);
        RetagOutcome::Untagged
    };

    repository
        .client()
        .update_file(&identifier, &keywords.join(","))
        .await?;
    Ok(outcome)
}
