use crate::server::{
    pool::request::WriteRequest,
    telemetry::{increment_search_log_failures, increment_write_failures},
};
use std::sync::Arc;
use synoanto_core::store::{LookupStore, SearchLog};
use tokio::sync::mpsc;

/// Writer task responsible for processing [`WriteRequest`] messages.
///
/// Failures are logged and counted, never reported back: by the time a write
/// runs, the lookup that produced it has already answered its caller.
///
/// Runs until a [`WriteRequest::Shutdown`] arrives or every sender is
/// dropped.
pub async fn writer_loop(
    writer_id: usize,
    mut rx: mpsc::Receiver<WriteRequest>,
    cache: Arc<dyn LookupStore>,
    search_log: Arc<dyn SearchLog>,
) {
    tracing::trace!("Writer {writer_id} started");

    while let Some(request) = rx.recv().await {
        match request {
            WriteRequest::PersistEntry { word, payload } => {
                if let Err(e) = cache.put(&word, &payload).await {
                    increment_write_failures();
                    tracing::warn!(%word, "Writer {writer_id} failed to persist entry: {e}");
                } else {
                    tracing::debug!(%word, "Writer {writer_id} persisted entry");
                }
            }
            WriteRequest::RecordSearch { event } => {
                if let Err(e) = search_log.record(event).await {
                    increment_search_log_failures();
                    tracing::warn!("Writer {writer_id} failed to record search: {e}");
                }
            }
            WriteRequest::Shutdown { response } => {
                tracing::debug!("Writer {writer_id} received shutdown signal");

                if response.send(()).is_err() {
                    tracing::error!("Writer {writer_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    tracing::trace!("Writer {writer_id} stopped");
}
