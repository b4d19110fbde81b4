//! The unit of crawl work and its accumulated result

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Image extensions the archive is expected to serve
const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".gif"];

/// Returns the page URL for an id: `<base>/<id>`
///
/// Pure; a trailing slash on `base` is ignored.
pub fn source_url(base: &str, id: u32) -> String {
    format!("{}/{}", base.trim_end_matches('/'), id)
}

/// Returns the store key for an id: the id zero-padded to four digits
pub fn store_key(id: u32) -> String {
    format!("{:04}", id)
}

/// Fields pulled out of a page by an extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Absolute URL of the page's asset
    pub asset_url: String,

    /// Named attributes (title, annotation, ...)
    pub fields: BTreeMap<String, String>,
}

/// One crawled page
///
/// An item only exists once extraction succeeded, so `asset_url` is always
/// present. `asset_path` and `downloaded` are set together when the asset has
/// been written to disk; the item is then replaced wholesale in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    id: u32,
    source_url: String,
    asset_url: String,
    // Required on load even though it may be null
    #[serde(deserialize_with = "Option::deserialize")]
    asset_path: Option<String>,
    downloaded: bool,
    #[serde(flatten)]
    fields: BTreeMap<String, String>,
}

/// Reasons a persisted item is rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemDefect {
    ZeroId,
    EmptyAssetUrl,
    DownloadedWithoutPath,
    PathWithoutDownload,
}

impl fmt::Display for ItemDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::ZeroId => "id must be positive",
            Self::EmptyAssetUrl => "assetUrl is empty",
            Self::DownloadedWithoutPath => "downloaded is true but assetPath is empty",
            Self::PathWithoutDownload => "assetPath is set but downloaded is false",
        };
        f.write_str(msg)
    }
}

impl Item {
    /// Builds a not-yet-downloaded item from a successful extraction
    pub fn extracted(id: u32, source_url: impl Into<String>, extraction: Extraction) -> Self {
        Self {
            id,
            source_url: source_url.into(),
            asset_url: extraction.asset_url,
            asset_path: None,
            downloaded: false,
            fields: extraction.fields,
        }
    }

    /// Returns a copy of this item marked as downloaded to `path`
    pub fn with_download(&self, path: impl Into<String>) -> Self {
        Self {
            asset_path: Some(path.into()),
            downloaded: true,
            ..self.clone()
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Zero-padded key this item is stored under
    pub fn key(&self) -> String {
        store_key(self.id)
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn asset_url(&self) -> &str {
        &self.asset_url
    }

    pub fn asset_path(&self) -> Option<&str> {
        self.asset_path.as_deref()
    }

    pub fn is_downloaded(&self) -> bool {
        self.downloaded
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Looks up a single extracted field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Last path segment of the asset URL, ignoring any query string
    pub fn asset_basename(&self) -> String {
        let from_url = Url::parse(&self.asset_url).ok().and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        });

        from_url
            .or_else(|| self.asset_url.rsplit('/').next().map(str::to_string))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "asset".to_string())
    }

    /// File name the asset is written under: `<id:04>_<basename>`
    pub fn asset_file_name(&self) -> String {
        let basename = self.asset_basename();
        if !has_image_extension(&basename) {
            tracing::warn!("\"{}\" is not a recognised image file name", basename);
        }
        format!("{}_{}", self.key(), basename)
    }

    /// Checks the invariants a persisted item must satisfy
    pub fn check(&self) -> Result<(), ItemDefect> {
        if self.id == 0 {
            return Err(ItemDefect::ZeroId);
        }
        if self.asset_url.is_empty() {
            return Err(ItemDefect::EmptyAssetUrl);
        }
        let has_path = self.asset_path.as_deref().is_some_and(|p| !p.is_empty());
        match (self.downloaded, has_path) {
            (true, false) => Err(ItemDefect::DownloadedWithoutPath),
            (false, true) => Err(ItemDefect::PathWithoutDownload),
            _ => Ok(()),
        }
    }
}

fn has_image_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
