use crate::server::service::handler::LookupService;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderValue, Method, header},
    routing::get,
};
use core::time::Duration;
use serde::Serialize;
use serde_json::{Value, json};
use synoanto_core::{AggregatedPayload, Error, TrendingWord, Word};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Serialize)]
struct TrendingResponse {
    trending: Vec<TrendingWord>,
}

/// Builds the `/api` router over `service`.
pub fn router(service: LookupService, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route("/ping", get(ping))
        .route("/word/{word}", get(lookup_word))
        .route("/stats/trending", get(trending));

    Router::new()
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(service)
}

/// CORS policy for the browser front-end.
///
/// # Errors
///
/// Fails if an origin is not a valid header value.
pub fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin.trim()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 60 * 60)))
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

async fn lookup_word(
    State(service): State<LookupService>,
    Path(word): Path<String>,
) -> Result<Json<AggregatedPayload>, Error> {
    let word = Word::parse(word)?;
    service.handle_lookup(&word).await.map(Json)
}

async fn trending(State(service): State<LookupService>) -> Result<Json<TrendingResponse>, Error> {
    let trending = service.trending().await?;
    Ok(Json(TrendingResponse { trending }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{
        config::{ServerConfig, StoreBackend},
        service::handler::Backends,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use synoanto_core::{
        FetchError, FetchErrorKind, Provider, SearchEvent,
        error::UPSTREAM_FAILURE_MESSAGE,
        store::{MemoryStore, SearchLog},
        upstream::{Fetch, ProviderEndpoint, UpstreamConfig},
    };
    use tower::ServiceExt;

    struct EchoProviders {
        fail: bool,
    }

    #[async_trait]
    impl Fetch for EchoProviders {
        async fn fetch(&self, provider: Provider, word: &Word) -> Result<Value, FetchError> {
            if self.fail {
                return Err(FetchError::new(provider, FetchErrorKind::Transport, "refused"));
            }
            Ok(json!([format!("{provider}:{word}")]))
        }
    }

    fn app(fail: bool, store: Arc<MemoryStore>) -> Router {
        let config = ServerConfig {
            server_addr: "127.0.0.1:0".to_string(),
            store: StoreBackend::Memory,
            database_url: None,
            database_max_connections: 1,
            upstream: UpstreamConfig {
                collegiate: ProviderEndpoint::new("http://127.0.0.1:1/c", "c"),
                thesaurus: ProviderEndpoint::new("http://127.0.0.1:1/t", "t"),
                timeout: Duration::from_secs(1),
            },
            num_writers: 1,
            writer_queue_size: 8,
            shutdown_timeout: Duration::from_secs(1),
            cors_origins: vec!["http://localhost:5173".to_string()],
        };
        let service = LookupService::new(
            &config,
            Arc::new(EchoProviders { fail }),
            Backends::shared(store),
        );
        router(service, cors_layer(&config.cors_origins).unwrap())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn ping_answers_pong() {
        let (status, body) = get_json(app(false, Arc::new(MemoryStore::new())), "/api/ping").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "pong" }));
    }

    #[tokio::test]
    async fn word_lookup_returns_both_payloads() {
        let (status, body) =
            get_json(app(false, Arc::new(MemoryStore::new())), "/api/word/cat").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "collegiate": ["collegiate:cat"], "thesaurus": ["thesaurus:cat"] })
        );
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_generic_error() {
        let (status, body) =
            get_json(app(true, Arc::new(MemoryStore::new())), "/api/word/cat").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": UPSTREAM_FAILURE_MESSAGE }));
    }

    #[tokio::test]
    async fn whitespace_word_is_looked_up_like_any_other() {
        let store = Arc::new(MemoryStore::new());
        let (status, body) = get_json(app(false, store.clone()), "/api/word/%20").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "collegiate": ["collegiate: "], "thesaurus": ["thesaurus: "] })
        );

        // The search event is queued in the background.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let events = store.search_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].word.as_str(), " ");
    }

    #[tokio::test]
    async fn trending_is_wrapped_in_an_object() {
        let store = Arc::new(MemoryStore::new());
        for raw in ["dog", "dog", "cat"] {
            store
                .record(SearchEvent::anonymous(Word::parse(raw).unwrap()))
                .await
                .unwrap();
        }

        let (status, body) = get_json(app(false, store), "/api/stats/trending").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "trending": [
                { "word": "dog", "count": 2 },
                { "word": "cat", "count": 1 },
            ]})
        );
    }

    #[tokio::test]
    async fn cors_preflight_allows_configured_origin() {
        let response = app(false, Arc::new(MemoryStore::new()))
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/word/cat")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }
}
