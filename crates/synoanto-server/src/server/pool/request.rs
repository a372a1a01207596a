use synoanto_core::{AggregatedPayload, SearchEvent, Word};
use tokio::sync::oneshot;

/// A message sent from the [`WriterPool`] to an individual writer task.
///
/// Writers process their queue in order, so a `Shutdown` is only seen after
/// every write queued ahead of it has been attempted.
///
/// [`WriterPool`]: super::manager::WriterPool
#[derive(Debug)]
pub enum WriteRequest {
    /// Insert or replace the cached payload for `word`.
    PersistEntry {
        word: Word,
        payload: AggregatedPayload,
    },

    /// Append a search event to the log.
    RecordSearch { event: SearchEvent },

    /// Request the writer to stop after draining its queue.
    ///
    /// - `response`: One-shot channel acknowledging the writer has stopped.
    Shutdown { response: oneshot::Sender<()> },
}
