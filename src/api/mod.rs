//! REST API layer: route handlers, DTOs, OpenAPI document, and router
//! composition.
//!
//! Resource endpoints are mounted under `/api/v1`; health and chain
//! configuration live at the root.

pub mod docs;
pub mod dto;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
        )
    };

    router
}

/// Builds the full application: REST, WebSocket, tracing, and CORS layers,
/// bound to `state`.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::chain::{EventSource, MemoryChain, ObjectSource};
    use crate::config::{ChainConfig, EngineSettings};
    use crate::domain::{EventBus, SnapshotStore};
    use crate::service::ReconstructionEngine;

    fn app() -> Router {
        let chain = Arc::new(MemoryChain::new());
        let engine = Arc::new(ReconstructionEngine::new(
            Arc::clone(&chain) as Arc<dyn EventSource>,
            chain as Arc<dyn ObjectSource>,
            ChainConfig::default(),
            EngineSettings::default(),
        ));
        build_app(AppState::new(
            engine,
            Arc::new(SnapshotStore::default()),
            EventBus::new(8),
        ))
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let Ok(request) = Request::builder().method(method).uri(uri).body(Body::empty()) else {
            panic!("request");
        };
        let response = match app().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        response.status()
    }

    #[tokio::test]
    async fn routes_are_mounted() {
        assert_eq!(status_of("GET", "/health").await, StatusCode::OK);
        assert_eq!(status_of("GET", "/config/chain").await, StatusCode::OK);
        assert_eq!(status_of("GET", "/api/v1/listings").await, StatusCode::ACCEPTED);
        assert_eq!(
            status_of("POST", "/api/v1/refresh").await,
            StatusCode::ACCEPTED
        );
        assert_eq!(status_of("GET", "/api/v1/unknown").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn refresh_rejects_bad_topic() {
        let body = Body::from(r#"{"topic":"nonsense"}"#);
        let Ok(request) = Request::builder()
            .method("POST")
            .uri("/api/v1/refresh")
            .body(body)
        else {
            panic!("request");
        };
        let response = match app().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[cfg(feature = "swagger-ui")]
    #[tokio::test]
    async fn openapi_document_is_served() {
        assert_eq!(status_of("GET", "/api-docs/openapi.json").await, StatusCode::OK);
    }
}
