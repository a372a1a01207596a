use super::{LookupStore, SearchLog, decode_cached};
use crate::{
    error::StoreError,
    types::{AggregatedEntry, AggregatedPayload, SearchEvent, TrendingWord, Word},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

struct StoredEntry {
    // Serialized form, so a corrupted entry is representable.
    raw: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Process-local store backing both the cache and the search log.
///
/// Entries are lost on restart. Used by tests and by the `memory` backend
/// of the server for running without a database.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<Word, StoredEntry>>,
    searches: Mutex<Vec<SearchEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `raw` verbatim under `word`, bypassing serialization.
    pub fn insert_raw(&self, word: Word, raw: impl Into<String>) {
        let now = Utc::now();
        self.entries.lock().insert(
            word,
            StoredEntry {
                raw: raw.into(),
                created_at: now,
                updated_at: now,
            },
        );
    }

    /// The decoded entry for `word`, if present and valid.
    pub fn entry(&self, word: &Word) -> Option<AggregatedEntry> {
        let entries = self.entries.lock();
        let stored = entries.get(word)?;
        Some(AggregatedEntry {
            word: word.clone(),
            payload: serde_json::from_str(&stored.raw).ok()?,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn search_events(&self) -> Vec<SearchEvent> {
        self.searches.lock().clone()
    }
}

#[async_trait]
impl LookupStore for MemoryStore {
    async fn get(&self, word: &Word) -> Result<Option<AggregatedPayload>, StoreError> {
        let entries = self.entries.lock();
        Ok(entries
            .get(word)
            .and_then(|stored| decode_cached(word, &stored.raw)))
    }

    async fn put(&self, word: &Word, payload: &AggregatedPayload) -> Result<(), StoreError> {
        let raw = serde_json::to_string(payload)?;
        let now = Utc::now();
        self.entries
            .lock()
            .entry(word.clone())
            .and_modify(|stored| {
                stored.raw.clone_from(&raw);
                stored.updated_at = now;
            })
            .or_insert_with(|| StoredEntry {
                raw: raw.clone(),
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }
}

#[async_trait]
impl SearchLog for MemoryStore {
    async fn record(&self, event: SearchEvent) -> Result<(), StoreError> {
        self.searches.lock().push(event);
        Ok(())
    }

    async fn trending(&self, limit: usize) -> Result<Vec<TrendingWord>, StoreError> {
        let mut counts: HashMap<String, i64> = HashMap::new();
        for event in self.searches.lock().iter() {
            *counts.entry(event.word.as_str().to_owned()).or_default() += 1;
        }

        let mut trending: Vec<_> = counts
            .into_iter()
            .map(|(word, count)| TrendingWord { word, count })
            .collect();
        trending.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
        trending.truncate(limit);
        Ok(trending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TRENDING_LIMIT;
    use serde_json::json;

    fn word(raw: &str) -> Word {
        Word::parse(raw).unwrap()
    }

    fn payload(tag: &str) -> AggregatedPayload {
        AggregatedPayload {
            collegiate: json!([{ "meta": { "id": tag } }]),
            thesaurus: json!([]),
        }
    }

    #[tokio::test]
    async fn get_returns_what_put_stored() {
        let store = MemoryStore::new();
        store.put(&word("cat"), &payload("cat")).await.unwrap();

        assert_eq!(store.get(&word("cat")).await.unwrap(), Some(payload("cat")));
        assert_eq!(store.get(&word("dog")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupted_entry_reads_as_absent() {
        let store = MemoryStore::new();
        store.insert_raw(word("cat"), "{\"collegiate\": [");

        assert_eq!(store.get(&word("cat")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn repeated_put_keeps_one_entry_and_creation_time() {
        let store = MemoryStore::new();
        store.put(&word("cat"), &payload("first")).await.unwrap();
        let created = store.entry(&word("cat")).unwrap().created_at;

        store.put(&word("cat"), &payload("second")).await.unwrap();

        let entry = store.entry(&word("cat")).unwrap();
        assert_eq!(store.entry_count(), 1);
        assert_eq!(entry.created_at, created);
        assert_eq!(entry.payload, payload("second"));
    }

    #[tokio::test]
    async fn trending_ranks_by_frequency() {
        let store = MemoryStore::new();
        for (raw, times) in [("cat", 3), ("dog", 5), ("bird", 1)] {
            for _ in 0..times {
                store.record(SearchEvent::anonymous(word(raw))).await.unwrap();
            }
        }

        let trending = store.trending(TRENDING_LIMIT).await.unwrap();

        let ranked: Vec<_> = trending.iter().map(|t| (t.word.as_str(), t.count)).collect();
        assert_eq!(ranked, vec![("dog", 5), ("cat", 3), ("bird", 1)]);
    }

    #[tokio::test]
    async fn trending_is_capped_and_breaks_ties_by_word() {
        let store = MemoryStore::new();
        for raw in ["f", "e", "d", "c", "b", "a", "a"] {
            store.record(SearchEvent::anonymous(word(raw))).await.unwrap();
        }

        let trending = store.trending(TRENDING_LIMIT).await.unwrap();

        let words: Vec<_> = trending.iter().map(|t| t.word.as_str()).collect();
        assert_eq!(words, vec!["a", "b", "c", "d", "e"]);
    }
}
