//! Bounded background writer pool.
//!
//! Cache inserts and search events are persisted off the request path by a
//! fixed set of writer tasks, each fed through its own bounded queue.
//!
//! - [`manager`] - the [`manager::WriterPool`] handle used by the service.
//! - [`worker`] - the per-writer event loop.
//! - [`request`] - the messages a writer accepts.

pub mod manager;
pub mod request;
pub mod worker;
