//! Item state for tracking crawl progress

mod item;
mod outcome;

pub use item::{source_url, store_key, Extraction, Item, ItemDefect};
pub use outcome::Outcome;
