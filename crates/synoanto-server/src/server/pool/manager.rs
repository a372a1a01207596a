//! Asynchronous writer pool for fire-and-forget persistence.
//!
//! This module defines the [`WriterPool`] struct, which owns a fixed set of
//! writer tasks. Each writer listens on its own bounded [`mpsc::Receiver`];
//! the pool distributes requests round-robin and never waits for queue
//! space. A request that finds its queue full is rejected immediately, so a
//! slow database sheds background writes instead of growing memory or
//! stalling lookups.

use crate::server::pool::{request::WriteRequest, worker::writer_loop};
use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use synoanto_core::{
    Error,
    store::{LookupStore, SearchLog},
};
use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

pub struct WriterPool {
    writers: Vec<mpsc::Sender<WriteRequest>>,
    next_writer: AtomicUsize,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl WriterPool {
    /// Spawns `num_writers` writer tasks, each with a queue of `queue_size`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        num_writers: usize,
        queue_size: usize,
        shutdown_timeout: Duration,
        cache: Arc<dyn LookupStore>,
        search_log: Arc<dyn SearchLog>,
    ) -> Self {
        let mut writers = Vec::with_capacity(num_writers);

        for writer_id in 0..num_writers {
            let (tx, rx) = mpsc::channel(queue_size);
            writers.push(tx);

            tokio::spawn(writer_loop(
                writer_id,
                rx,
                Arc::clone(&cache),
                Arc::clone(&search_log),
            ));
        }

        Self {
            writers,
            next_writer: AtomicUsize::new(0),
            shutdown_token: CancellationToken::new(),
            shutdown_timeout,
        }
    }

    /// Returns the index of the next writer to receive work (round-robin).
    pub fn next_writer_index(&self) -> usize {
        self.next_writer.fetch_add(1, Ordering::Relaxed) % self.writers.len()
    }

    /// Queues `request` on the next writer without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The pool is shutting down.
    /// - The chosen writer's queue is full or closed.
    pub fn submit(&self, request: WriteRequest) -> Result<(), Error> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let writer_idx = self.next_writer_index();
        self.writers[writer_idx]
            .try_send(request)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => Error::ChannelError {
                    context: format!("Writer {writer_idx} queue full"),
                },
                mpsc::error::TrySendError::Closed(_) => Error::ChannelError {
                    context: format!("Writer {writer_idx} channel closed"),
                },
            })
    }

    /// Stops accepting writes and waits for every writer to drain.
    ///
    /// - Cancels the shared [`CancellationToken`] so `submit` refuses work.
    /// - Queues a [`WriteRequest::Shutdown`] behind each writer's pending
    ///   writes.
    /// - Waits up to `shutdown_timeout` per writer for the acknowledgement.
    ///
    /// Calling this more than once is harmless.
    pub async fn shutdown(&self) -> Result<(), Error> {
        if self.shutdown_token.is_cancelled() {
            return Ok(());
        }

        tracing::info!("Refusing new background writes");
        self.shutdown_token.cancel();

        tracing::debug!("Notifying all writers to shut down");
        let mut shutdown_handles = Vec::with_capacity(self.writers.len());

        for (i, writer) in self.writers.iter().enumerate() {
            let (tx, rx) = oneshot::channel();
            match timeout(
                self.shutdown_timeout,
                writer.send(WriteRequest::Shutdown { response: tx }),
            )
            .await
            {
                Ok(Ok(())) => shutdown_handles.push((i, rx)),
                Ok(Err(e)) => tracing::error!("Failed to send shutdown to writer {i}: {e}"),
                Err(_) => tracing::warn!("Writer {i} queue did not free up before shutdown"),
            }
        }

        let grace = self.shutdown_timeout;
        let acknowledgements = shutdown_handles.into_iter().map(|(i, rx)| async move {
            match timeout(grace, rx).await {
                Ok(Ok(())) => tracing::trace!("Writer {i} shutdown acknowledged"),
                Ok(Err(e)) => tracing::error!("Writer {i} returned error: {e}"),
                Err(_) => tracing::warn!("Writer {i} shutdown timed out"),
            }
        });

        futures::future::join_all(acknowledgements).await;

        tracing::info!("Writer pool shutdown complete");
        Ok(())
    }
}
