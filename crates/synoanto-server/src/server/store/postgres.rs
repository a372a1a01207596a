//! Postgres backend for the lookup cache and search log.
//!
//! Schema lives in `migrations/` and is applied at startup. The `word`
//! column of `dictionary_entries` carries a unique index; inserts resolve
//! conflicts on it by replacing the payload, so concurrent writers for the
//! same word never error and a corrupted row is overwritten by the refetch
//! that discarded it.

use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions, types::Json};
use synoanto_core::{
    AggregatedPayload, SearchEvent, StoreError, TrendingWord, Word,
    store::{LookupStore, SearchLog, decode_cached},
};

const SELECT_ENTRY: &str = "SELECT definition_data::text FROM dictionary_entries WHERE word = $1";

const UPSERT_ENTRY: &str = r#"
    INSERT INTO dictionary_entries (word, definition_data)
    VALUES ($1, $2)
    ON CONFLICT (word) DO UPDATE
        SET definition_data = EXCLUDED.definition_data,
            updated_at = now()
"#;

const INSERT_SEARCH: &str =
    "INSERT INTO search_logs (word, user_id, search_time) VALUES ($1, $2, $3)";

const SELECT_TRENDING: &str = r#"
    SELECT word, COUNT(*) AS count
    FROM search_logs
    GROUP BY word
    ORDER BY count DESC, word ASC
    LIMIT $1
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(StoreError::backend)?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(StoreError::backend)
    }
}

#[async_trait]
impl LookupStore for PgStore {
    async fn get(&self, word: &Word) -> Result<Option<AggregatedPayload>, StoreError> {
        let raw: Option<String> = sqlx::query_scalar(SELECT_ENTRY)
            .bind(word.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(raw.and_then(|raw| decode_cached(word, &raw)))
    }

    async fn put(&self, word: &Word, payload: &AggregatedPayload) -> Result<(), StoreError> {
        sqlx::query(UPSERT_ENTRY)
            .bind(word.as_str())
            .bind(Json(payload))
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }
}

#[async_trait]
impl SearchLog for PgStore {
    async fn record(&self, event: SearchEvent) -> Result<(), StoreError> {
        sqlx::query(INSERT_SEARCH)
            .bind(event.word.as_str())
            .bind(event.user_id)
            .bind(event.searched_at)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn trending(&self, limit: usize) -> Result<Vec<TrendingWord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<(String, i64)> = sqlx::query_as(SELECT_TRENDING)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(rows
            .into_iter()
            .map(|(word, count)| TrendingWord { word, count })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn word(raw: &str) -> Word {
        Word::parse(raw).unwrap()
    }

    fn payload(tag: &str) -> AggregatedPayload {
        AggregatedPayload {
            collegiate: json!([{ "shortdef": [tag] }]),
            thesaurus: json!([{ "syns": [[tag]] }]),
        }
    }

    async fn row_count(pool: &PgPool, raw: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM dictionary_entries WHERE word = $1")
            .bind(raw)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn repeated_put_keeps_one_row(pool: PgPool) {
        let store = PgStore { pool: pool.clone() };
        let cat = word("cat");

        store.put(&cat, &payload("first")).await.unwrap();
        store.put(&cat, &payload("second")).await.unwrap();

        assert_eq!(row_count(&pool, "cat").await, 1);
        assert_eq!(store.get(&cat).await.unwrap(), Some(payload("second")));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_puts_for_one_word_both_succeed(pool: PgPool) {
        let store = PgStore { pool: pool.clone() };
        let dog = word("dog");
        let (left, right) = (payload("left"), payload("right"));

        let (a, b) = tokio::join!(store.put(&dog, &left), store.put(&dog, &right));

        a.unwrap();
        b.unwrap();
        assert_eq!(row_count(&pool, "dog").await, 1);
        let stored = store.get(&dog).await.unwrap().unwrap();
        assert!(stored == left || stored == right);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn row_missing_a_provider_reads_as_absent_until_rewritten(pool: PgPool) {
        let store = PgStore { pool: pool.clone() };
        let cat = word("cat");
        sqlx::query(
            "INSERT INTO dictionary_entries (word, definition_data) VALUES ($1, '{\"collegiate\":1}'::jsonb)",
        )
        .bind("cat")
        .execute(&pool)
        .await
        .unwrap();

        assert_eq!(store.get(&cat).await.unwrap(), None);

        store.put(&cat, &payload("healed")).await.unwrap();
        assert_eq!(store.get(&cat).await.unwrap(), Some(payload("healed")));
        assert_eq!(row_count(&pool, "cat").await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn trending_ranks_by_count(pool: PgPool) {
        let store = PgStore { pool };
        for (raw, times) in [("cat", 3), ("dog", 5), ("bird", 1)] {
            for _ in 0..times {
                store.record(SearchEvent::anonymous(word(raw))).await.unwrap();
            }
        }

        let trending = store.trending(5).await.unwrap();

        assert_eq!(
            trending,
            vec![
                TrendingWord { word: "dog".into(), count: 5 },
                TrendingWord { word: "cat".into(), count: 3 },
                TrendingWord { word: "bird".into(), count: 1 },
            ]
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn trending_caps_results_and_breaks_ties_by_word(pool: PgPool) {
        let store = PgStore { pool };
        for raw in ["f", "e", "d", "c", "b", "a"] {
            store.record(SearchEvent::anonymous(word(raw))).await.unwrap();
        }

        let words: Vec<_> = store
            .trending(5)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.word)
            .collect();

        assert_eq!(words, vec!["a", "b", "c", "d", "e"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn anonymous_search_stores_null_user(pool: PgPool) {
        let store = PgStore { pool: pool.clone() };

        store.record(SearchEvent::anonymous(word("cat"))).await.unwrap();

        let user_id: Option<i64> = sqlx::query_scalar("SELECT user_id FROM search_logs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(user_id, None);
    }
}
