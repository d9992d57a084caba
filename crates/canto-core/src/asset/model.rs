//! Asset identifiers and the read-only asset proxy model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::{Error, Result};

/// Wire format of the `Date modified` asset property:
/// year month day hour minute second millisecond, no separators.
const LAST_MODIFIED_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Composite identifier of a remote asset: `{scheme}-{id}`.
///
/// The scheme is Canto's coarse asset-type bucket (`image`, `video`, ...)
/// and never contains a dash, so splitting on the first `-` recovers the
/// original pair even when the remote id itself contains dashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetIdentifier {
    scheme: String,
    id: String,
}

impl AssetIdentifier {
    /// Creates an identifier from its parts.
    #[must_use]
    pub fn new(scheme: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            id: id.into(),
        }
    }

    /// The asset-type scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The remote asset id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for AssetIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.scheme, self.id)
    }
}

impl FromStr for AssetIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('-') {
            Some((scheme, id)) if !scheme.is_empty() && !id.is_empty() => {
                Ok(Self::new(scheme, id))
            }
            _ => Err(Error::InvalidIdentifier(s.to_string())),
        }
    }
}

/// Read-only snapshot of one remote asset's metadata.
///
/// Constructed from a wire JSON object and never mutated afterwards. The
/// original/binary URI is deliberately absent: it requires a fresh
/// authenticated `directuri` call and must not be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetProxy {
    /// Composite identifier; stable and round-trips through the cache.
    pub identifier: AssetIdentifier,
    /// Human-readable label (the remote filename).
    pub label: String,
    /// Remote filename.
    pub filename: String,
    /// Last modification time of the remote asset.
    pub last_modified: DateTime<Utc>,
    /// Size in bytes.
    pub file_size: u64,
    /// Media type derived from the filename extension.
    pub media_type: String,
    /// Copyright notice, the one IPTC-like property Canto exposes.
    pub copyright: Option<String>,
    /// Pixel width, if known and non-zero.
    pub width: Option<u32>,
    /// Pixel height, if known and non-zero.
    pub height: Option<u32>,
    /// Remote keyword tags.
    pub tags: Vec<String>,
    /// Preview rendition URI, sized per configuration.
    pub preview_uri: Option<Url>,
    /// Thumbnail rendition URI, sized per configuration.
    pub thumbnail_uri: Option<Url>,
}

#[derive(Debug, Deserialize)]
struct RawAsset {
    scheme: String,
    id: String,
    name: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    width: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    height: Option<u64>,
    #[serde(default)]
    tag: Vec<String>,
    // Seen both top-level and inside `default`, depending on the endpoint.
    #[serde(default)]
    copyright: Option<String>,
    #[serde(default)]
    default: RawDefaults,
    #[serde(default)]
    url: RawUrls,
}

#[derive(Debug, Default, Deserialize)]
struct RawDefaults {
    #[serde(rename = "Copyright")]
    copyright: Option<String>,
    #[serde(rename = "Date modified")]
    date_modified: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUrls {
    #[serde(rename = "directUrlPreview")]
    direct_url_preview: Option<String>,
}

/// Accepts numbers or numeric strings; Canto is not consistent here.
fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) => Ok(s.parse::<u64>().ok()),
    }
}

impl AssetProxy {
    /// Builds a proxy from a raw wire JSON object.
    ///
    /// `thumbnail_size` and `preview_size` are the configured pixel presets
    /// substituted into the derived rendition URIs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for a structurally invalid object and
    /// [`Error::InvalidTimestamp`] when the `Date modified` property is
    /// absent or does not match the wire format.
    pub fn from_json(
        value: &serde_json::Value,
        thumbnail_size: u32,
        preview_size: u32,
    ) -> Result<Self> {
        let raw: RawAsset = serde_json::from_value(value.clone())?;
        let identifier = AssetIdentifier::new(&raw.scheme, &raw.id);

        let last_modified = parse_last_modified(
            raw.default.date_modified.as_deref(),
            &identifier,
        )?;

        let preview_base = raw.url.direct_url_preview.as_deref().map(strip_size_suffix);
        let preview_uri = preview_base
            .as_deref()
            .and_then(|base| Url::parse(&format!("{base}/{preview_size}")).ok());
        let thumbnail_uri = preview_base
            .as_deref()
            .and_then(|base| Url::parse(&format!("{base}/{thumbnail_size}")).ok());

        Ok(Self {
            identifier,
            label: raw.name.clone(),
            media_type: mime_guess::from_path(&raw.name)
                .first_or_octet_stream()
                .to_string(),
            filename: raw.name,
            last_modified,
            file_size: raw.size.unwrap_or(0),
            copyright: raw
                .copyright
                .or(raw.default.copyright)
                .filter(|c| !c.is_empty()),
            width: nonzero_u32(raw.width),
            height: nonzero_u32(raw.height),
            tags: raw.tag,
            preview_uri,
            thumbnail_uri,
        })
    }

    /// Whether the copyright property is present.
    #[must_use]
    pub const fn has_copyright(&self) -> bool {
        self.copyright.is_some()
    }
}

fn parse_last_modified(
    raw: Option<&str>,
    identifier: &AssetIdentifier,
) -> Result<DateTime<Utc>> {
    let raw = raw.ok_or_else(|| {
        Error::InvalidTimestamp(format!("asset {identifier} has no Date modified property"))
    })?;
    let naive = NaiveDateTime::parse_from_str(raw, LAST_MODIFIED_FORMAT).map_err(|e| {
        Error::InvalidTimestamp(format!("asset {identifier}: {raw:?} ({e})"))
    })?;
    Ok(naive.and_utc())
}

fn nonzero_u32(value: Option<u64>) -> Option<u32> {
    value
        .filter(|&v| v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

/// Strips the trailing `/<number>` pixel-size segment the remote preview
/// URL template embeds, so a configured size can be substituted.
fn strip_size_suffix(uri: &str) -> String {
    match uri.rsplit_once('/') {
        Some((base, last)) if !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()) => {
            base.to_string()
        }
        _ => uri.trim_end_matches('/').to_string(),
    }
}
