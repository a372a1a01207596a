//! Lookup service implementation and its HTTP surface.
//!
//! ## Structure
//!
//! - [`handler`] - the cache-or-fetch orchestrator (`LookupService`).
//! - [`routes`] - the axum router and CORS policy exposing it under `/api`.

pub mod handler;
pub mod routes;
