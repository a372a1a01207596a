//! Cache-or-fetch lookup orchestration.
//!
//! [`LookupService`] is the single entry point for word lookups. For every
//! request it:
//!
//! 1. Queues a search event (best-effort, never observed by the caller).
//! 2. Reads the cache and answers immediately on a hit.
//! 3. On a miss, fans out to both providers through the [`Coordinator`].
//! 4. On success, queues the aggregated payload for persistence and answers
//!    without waiting for the write.
//!
//! Only upstream failures reach the caller. Cache read errors degrade to a
//! miss, and background write failures are logged by the writers.

use crate::server::{
    config::ServerConfig,
    pool::{manager::WriterPool, request::WriteRequest},
    telemetry::{
        increment_cache_hits, increment_cache_misses, increment_lookups,
        increment_upstream_failures, increment_writes_dropped, record_lookup_duration,
    },
};
use std::sync::Arc;
use synoanto_core::{
    AggregatedPayload, Error, SearchEvent, TRENDING_LIMIT, TrendingWord, Word,
    coordinator::Coordinator,
    store::{LookupStore, SearchLog},
    upstream::Fetch,
};

/// The persistence backends a [`LookupService`] reads from and writes to.
#[derive(Clone)]
pub struct Backends {
    pub cache: Arc<dyn LookupStore>,
    pub search_log: Arc<dyn SearchLog>,
}

impl Backends {
    /// Uses one value for both roles.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: LookupStore + SearchLog + 'static,
    {
        Self {
            cache: store.clone(),
            search_log: store,
        }
    }
}

#[derive(Clone)]
pub struct LookupService {
    cache: Arc<dyn LookupStore>,
    search_log: Arc<dyn SearchLog>,
    coordinator: Coordinator<dyn Fetch>,
    writers: Arc<WriterPool>,
}

impl LookupService {
    /// Creates the service and spawns its background writer pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &ServerConfig, fetcher: Arc<dyn Fetch>, backends: Backends) -> Self {
        let writers = WriterPool::spawn(
            config.num_writers,
            config.writer_queue_size,
            config.shutdown_timeout,
            Arc::clone(&backends.cache),
            Arc::clone(&backends.search_log),
        );

        Self {
            cache: backends.cache,
            search_log: backends.search_log,
            coordinator: Coordinator::new(fetcher, config.upstream.timeout),
            writers: Arc::new(writers),
        }
    }

    /// Resolves `word` from the cache, or from both providers on a miss.
    ///
    /// # Errors
    ///
    /// [`Error::Upstream`] if either provider failed on a cache miss. Nothing
    /// is cached in that case.
    #[tracing::instrument(skip_all, fields(%word))]
    pub async fn handle_lookup(&self, word: &Word) -> Result<AggregatedPayload, Error> {
        let start = std::time::Instant::now();
        increment_lookups();

        self.submit_background(WriteRequest::RecordSearch {
            event: SearchEvent::anonymous(word.clone()),
        });

        let result = self.resolve(word).await;
        record_lookup_duration(start.elapsed().as_secs_f64() * 1000.0);
        result
    }

    async fn resolve(&self, word: &Word) -> Result<AggregatedPayload, Error> {
        match self.cache.get(word).await {
            Ok(Some(payload)) => {
                increment_cache_hits();
                tracing::debug!("cache hit");
                return Ok(payload);
            }
            Ok(None) => tracing::debug!("cache miss"),
            Err(e) => tracing::warn!("cache read failed, fetching upstream: {e}"),
        }
        increment_cache_misses();

        let payload = self.coordinator.lookup(word).await.map_err(|e| {
            increment_upstream_failures();
            tracing::warn!("upstream lookup failed: {e}");
            Error::Upstream(e)
        })?;

        self.submit_background(WriteRequest::PersistEntry {
            word: word.clone(),
            payload: payload.clone(),
        });

        Ok(payload)
    }

    /// The most searched words, at most [`TRENDING_LIMIT`] of them.
    pub async fn trending(&self) -> Result<Vec<TrendingWord>, Error> {
        Ok(self.search_log.trending(TRENDING_LIMIT).await?)
    }

    /// Stops accepting background writes and drains the pending ones.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.writers.shutdown().await
    }

    fn submit_background(&self, request: WriteRequest) {
        if let Err(e) = self.writers.submit(request) {
            increment_writes_dropped();
            tracing::warn!("dropping background write: {e}");
        }
    }
}
