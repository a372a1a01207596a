//! HTTP client for the two upstream lexical-data providers.
//!
//! [`UpstreamClient`] performs a single `GET {base_url}/{word}?key={credential}`
//! against one provider and decodes the body as an opaque JSON document. It
//! performs no retries. Both providers share one [`reqwest::Client`] and its
//! connection pool; a response is either fully read or dropped before the
//! call returns, which hands the connection back to the pool.
//!
//! The [`Fetch`] trait is the seam the coordinator is written against, so
//! tests can substitute counting or delaying doubles.

use crate::{
    error::{FetchError, FetchErrorKind},
    types::{Provider, Word},
};
use async_trait::async_trait;
use core::time::Duration;
use reqwest::{Url, header::ACCEPT};
use serde_json::Value;

/// Default endpoint of the definitions provider.
pub const COLLEGIATE_API_URL: &str =
    "https://www.dictionaryapi.com/api/v3/references/collegiate/json";

/// Default endpoint of the synonyms/antonyms provider.
pub const THESAURUS_API_URL: &str =
    "https://www.dictionaryapi.com/api/v3/references/thesaurus/json";

/// Default bound for a single upstream call.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Performs one lookup of `word` against one provider.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, provider: Provider, word: &Word) -> Result<Value, FetchError>;
}

/// Where a provider lives and the credential it expects.
#[derive(Clone)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub credential: String,
}

impl core::fmt::Debug for ProviderEndpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProviderEndpoint")
            .field("base_url", &self.base_url)
            .field("credential", &"<redacted>")
            .finish()
    }
}

impl ProviderEndpoint {
    pub fn new(base_url: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credential: credential.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub collegiate: ProviderEndpoint,
    pub thesaurus: ProviderEndpoint,
    /// Applied to each call individually, not to the pair.
    pub timeout: Duration,
}

impl UpstreamConfig {
    pub fn endpoint(&self, provider: Provider) -> &ProviderEndpoint {
        match provider {
            Provider::Collegiate => &self.collegiate,
            Provider::Thesaurus => &self.thesaurus,
        }
    }
}

/// Reqwest-backed [`Fetch`] implementation.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /// Builds the shared HTTP client.
    ///
    /// # Errors
    ///
    /// Fails only if the TLS backend cannot be initialised.
    pub fn new(config: UpstreamConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("synoanto/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Builds the request URL, percent-encoding `word` as a single path
    /// segment.
    pub fn request_url(&self, provider: Provider, word: &Word) -> Result<Url, FetchError> {
        let endpoint = self.config.endpoint(provider);
        let mut url = Url::parse(&endpoint.base_url).map_err(|e| {
            FetchError::new(
                provider,
                FetchErrorKind::Transport,
                format!("invalid endpoint {}: {e}", endpoint.base_url),
            )
        })?;

        url.path_segments_mut()
            .map_err(|()| {
                FetchError::new(
                    provider,
                    FetchErrorKind::Transport,
                    format!("endpoint {} cannot carry a path", endpoint.base_url),
                )
            })?
            .pop_if_empty()
            .push(word.as_str());
        url.query_pairs_mut()
            .append_pair("key", &endpoint.credential);

        Ok(url)
    }
}

#[async_trait]
impl Fetch for UpstreamClient {
    #[tracing::instrument(skip_all, fields(%provider, %word))]
    async fn fetch(&self, provider: Provider, word: &Word) -> Result<Value, FetchError> {
        let url = self.request_url(provider, word)?;

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::transport(provider, &e))?;

        // Providers answer unknown words with a JSON suggestion list, so the
        // status alone does not decide the outcome.
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%status, "non-success status from provider");
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(provider, &e))?;

        let value = serde_json::from_slice(&body)
            .map_err(|e| FetchError::new(provider, FetchErrorKind::Decode, e.to_string()))?;

        tracing::trace!(bytes = body.len(), "upstream response decoded");
        Ok(value)
    }
}
