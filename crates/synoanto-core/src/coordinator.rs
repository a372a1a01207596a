//! Fan-out/fan-in over the two upstream providers.
//!
//! [`Coordinator::lookup`] drives both provider fetches concurrently inside
//! the calling task and joins on both before deciding the outcome. A failure
//! in either branch voids the aggregation; the other branch's value is
//! discarded. Each branch is individually bounded by the configured timeout,
//! and dropping the lookup future cancels both in-flight calls.
//!
//! Both branches are polled by `tokio::join!` on one task rather than
//! spawned. The network waits overlap, but the two bodies are decoded one
//! after the other on whichever worker thread polls the task. Spawning each
//! branch would decode in parallel, at the cost of detached fetches that keep
//! running after the caller has gone away.

use crate::{
    error::{FetchError, FetchErrorKind},
    types::{AggregatedPayload, Provider, Word},
    upstream::Fetch,
};
use core::time::Duration;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::timeout;

pub struct Coordinator<F: ?Sized> {
    fetcher: Arc<F>,
    per_call_timeout: Duration,
}

impl<F: ?Sized> Clone for Coordinator<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            per_call_timeout: self.per_call_timeout,
        }
    }
}

impl<F: Fetch + ?Sized> Coordinator<F> {
    pub fn new(fetcher: Arc<F>, per_call_timeout: Duration) -> Self {
        Self {
            fetcher,
            per_call_timeout,
        }
    }

    /// Fetches both providers for `word` and combines the results.
    ///
    /// # Errors
    ///
    /// Returns the first failure in provider order (collegiate, then
    /// thesaurus) if either call failed. Both calls have completed or timed
    /// out by the time this returns.
    pub async fn lookup(&self, word: &Word) -> Result<AggregatedPayload, FetchError> {
        let (collegiate, thesaurus) = tokio::join!(
            self.bounded_fetch(Provider::Collegiate, word),
            self.bounded_fetch(Provider::Thesaurus, word),
        );

        if let (Err(_), Err(e)) = (&collegiate, &thesaurus) {
            tracing::debug!("both providers failed, thesaurus error: {e}");
        }

        Ok(AggregatedPayload {
            collegiate: collegiate?,
            thesaurus: thesaurus?,
        })
    }

    async fn bounded_fetch(&self, provider: Provider, word: &Word) -> Result<Value, FetchError> {
        match timeout(self.per_call_timeout, self.fetcher.fetch(provider, word)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::new(
                provider,
                FetchErrorKind::Timeout,
                format!("no response within {:?}", self.per_call_timeout),
            )),
        }
    }
}
