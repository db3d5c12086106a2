//! Read-through article cache.
//!
//! - One entry per (country, category), fully replaced on every write
//! - Entries older than the freshness window are refetched
//! - Persistence is best effort: store failures never fail a read
//! - Concurrent misses for the same key share a single fetch

mod layer;
mod storage;
mod traits;

pub use layer::{CacheLayer, FRESHNESS_WINDOW_MINUTES};
pub use storage::{ArticleStore, MemoryStorage, NoopStorage, SqliteStorage};
pub(crate) use storage::{article_from_row, format_datetime, parse_datetime};
pub use traits::{CacheEntry, CacheKey, CacheResult, CacheSource};

#[cfg(test)]
pub(crate) use storage::tests::sample_articles;
