//! Storage module for persisting crawl progress
//!
//! This module handles the item store and its on-disk snapshot, including:
//! - The concurrency-safe id -> item map shared by workers
//! - Deterministic JSON encoding of the snapshot
//! - Validation of snapshots loaded at startup

mod error;
mod snapshot;
mod store;

pub use error::{StoreError, StoreResult};
pub use store::ItemStore;

/// Download counts for the items held in a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    /// Number of stored items
    pub total: usize,

    /// Items whose asset is on disk
    pub downloaded: usize,

    /// Ids of stored items still waiting for their asset, ascending
    pub pending: Vec<u32>,
}
