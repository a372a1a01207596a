//! Persistence seams for the lookup cache and the search log.
//!
//! Both traits are implemented by [`MemoryStore`] here and by the Postgres
//! backend in the server crate. Implementations must uphold two rules:
//!
//! - [`LookupStore::get`] reports a stored payload that cannot be decoded as
//!   absent, so the caller refetches and overwrites it.
//! - [`LookupStore::put`] never fails because another writer already stored
//!   the same word.

mod memory;
pub use memory::MemoryStore;

use crate::{
    error::StoreError,
    types::{AggregatedPayload, SearchEvent, TrendingWord, Word},
};
use async_trait::async_trait;

/// Word-keyed cache of aggregated payloads.
#[async_trait]
pub trait LookupStore: Send + Sync {
    /// Point read. `Ok(None)` for both a missing and an undecodable entry.
    async fn get(&self, word: &Word) -> Result<Option<AggregatedPayload>, StoreError>;

    /// Point insert. An existing entry for `word` is replaced.
    async fn put(&self, word: &Word, payload: &AggregatedPayload) -> Result<(), StoreError>;
}

/// Append-only log of lookup attempts.
#[async_trait]
pub trait SearchLog: Send + Sync {
    async fn record(&self, event: SearchEvent) -> Result<(), StoreError>;

    /// The `limit` most searched words, by descending count. Ties are
    /// broken alphabetically.
    async fn trending(&self, limit: usize) -> Result<Vec<TrendingWord>, StoreError>;
}

/// Decodes a stored payload, treating corruption as a miss.
pub fn decode_cached(word: &Word, raw: &str) -> Option<AggregatedPayload> {
    match serde_json::from_str(raw) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!(%word, "discarding undecodable cache entry: {e}");
            None
        }
    }
}
