//! Error types for the dictionary lookup service.
//!
//! This module defines the central [`Error`] enum returned by the lookup
//! path, plus the narrower [`FetchError`] produced by the upstream client and
//! [`StoreError`] produced by persistence backends. [`Error`] implements
//! [`IntoResponse`] so handlers can return it directly.
//!
//! ## Error Cases
//! - `InvalidWord`: The requested word was empty.
//! - `Upstream`: One of the two provider fetches failed, voiding the whole
//!   aggregation. Clients only ever see a generic message for this case.
//! - `Store`: A persistence backend failed on a path where the failure is
//!   reportable (the trending query).
//! - `ChannelError`: An internal communication failure between tasks or
//!   workers.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.

use super::types::Provider;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Message returned to clients for any upstream aggregation failure.
pub const UPSTREAM_FAILURE_MESSAGE: &str = "Failed to fetch from external dictionary";

/// Unified error type for the lookup service.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The lookup key was empty.
    #[error("Invalid word: {reason}")]
    InvalidWord { reason: String },

    /// Fetching from an upstream provider failed.
    #[error("Upstream aggregation failed: {0}")]
    Upstream(#[from] FetchError),

    /// A persistence backend failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Internal channel send/receive failure (e.g., closed or full channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

/// How a single provider fetch failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Connection refused, DNS failure, reset, or a malformed request URL.
    Transport,
    /// The body could not be decoded as JSON.
    Decode,
    /// The call did not complete within the configured bound.
    Timeout,
}

/// A failed call to one upstream provider.
#[derive(thiserror::Error, Clone, Debug)]
#[error("{provider} fetch failed ({kind:?}): {detail}")]
pub struct FetchError {
    pub provider: Provider,
    pub kind: FetchErrorKind,
    pub detail: String,
}

impl FetchError {
    pub fn new(provider: Provider, kind: FetchErrorKind, detail: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            detail: detail.into(),
        }
    }

    pub fn transport(provider: Provider, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FetchErrorKind::Timeout
        } else {
            FetchErrorKind::Transport
        };
        Self::new(provider, kind, err.to_string())
    }
}

/// Failures raised by a cache or search log backend.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The underlying database or storage engine reported an error.
    #[error("Backend error: {context}")]
    Backend { context: String },

    /// A payload could not be serialized for storage.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn backend(err: impl core::fmt::Display) -> Self {
        Self::Backend {
            context: err.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Error::InvalidWord { reason } => (StatusCode::BAD_REQUEST, reason),
            Error::Upstream(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                UPSTREAM_FAILURE_MESSAGE.to_string(),
            ),
            Error::Store(_) | Error::ChannelError { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            Error::ServiceShutdown => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service is shutting down".to_string(),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upstream_failure_hides_provider_detail() {
        let err = Error::Upstream(FetchError::new(
            Provider::Thesaurus,
            FetchErrorKind::Decode,
            "expected value at line 1 column 1",
        ));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "error": UPSTREAM_FAILURE_MESSAGE }));
    }

    #[test]
    fn invalid_word_is_a_client_error() {
        let err = Error::InvalidWord {
            reason: "word must not be empty".to_string(),
        };
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn shutdown_is_unavailable() {
        assert_eq!(
            Error::ServiceShutdown.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
