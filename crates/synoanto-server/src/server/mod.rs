//! Server-side components of the lookup service.
//!
//! ## Submodules
//!
//! - [`config`] - CLI and environment configuration.
//! - [`pool`] - the bounded background writer pool.
//! - [`service`] - the lookup orchestrator and HTTP routes.
//! - [`store`] - the Postgres backend and backend selection.
//! - [`telemetry`] - logging, tracing and metrics initialization.

pub mod config;
pub mod pool;
pub mod service;
pub mod store;
pub mod telemetry;
