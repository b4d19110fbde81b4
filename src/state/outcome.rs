//! Per-item outcomes of one pass through a worker
//!
//! This module defines every way the handling of a single id can end within a run.

use std::fmt;

/// Represents how the handling of one id ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    // ===== Skip States =====
    /// The id is in the no-content exclusion set and was never fetched
    SkippedNoContent,

    /// The store already holds a downloaded item for the id
    SkippedDownloaded,

    // ===== Success States =====
    /// The page was fetched, extracted, and its asset written to disk
    Downloaded,

    // ===== Failure States =====
    /// The page could not be fetched; nothing was stored
    FetchFailed,

    /// A required field was missing from the page; nothing was stored
    ExtractionFailed,

    /// The item was stored but its asset could not be written
    DownloadFailed,
}

impl Outcome {
    /// Returns true if the id was skipped without any network access
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::SkippedNoContent | Self::SkippedDownloaded)
    }

    /// Returns true if the id belongs in the failure collector
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed | Self::ExtractionFailed | Self::DownloadFailed
        )
    }

    /// Short machine-friendly label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkippedNoContent => "skipped_no_content",
            Self::SkippedDownloaded => "skipped_downloaded",
            Self::Downloaded => "downloaded",
            Self::FetchFailed => "fetch_failed",
            Self::ExtractionFailed => "extraction_failed",
            Self::DownloadFailed => "download_failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
