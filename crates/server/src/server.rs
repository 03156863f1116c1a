use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use store::ThreadStore;

use crate::config::ServerConfig;
use crate::routes;
use crate::state::ServerState;

/// Build the query-API router. All routes are read-only and unauthenticated,
/// consistent with this surface being an internal lookup API rather than a
/// public ingest path.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/canonical/{file_name}", get(routes::canonical_by_file_name))
        .route("/documents/{cano_id}", get(routes::documents_by_cano_id))
        .route("/children/{cano_id}", get(routes::children_by_cano_id))
        .route("/parent/{cano_id}", get(routes::parent_by_cano_id))
        .route("/upstream/{cano_id}", get(routes::upstream_chain_by_cano_id))
        .layer(TimeoutLayer::new(state.config.timeout()))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize structured logging, build the router, and serve until a
/// Ctrl+C or SIGTERM is received.
pub async fn start_server(config: ServerConfig, store: Arc<dyn ThreadStore>) -> anyhow::Result<()> {
    let addr: SocketAddr = config.socket_addr()?;
    let state = Arc::new(ServerState::new(config, store));
    let app = build_router(state.clone());

    tracing::info!(resource = "server", action = "start", %addr, "starting query API");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(resource = "server", action = "stop", "shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(resource = "server", action = "stop", "received ctrl-c, shutting down"),
        _ = terminate => tracing::info!(resource = "server", action = "stop", "received sigterm, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use store::{CanonicalThread, Document, InMemoryBackend};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn seeded_store() -> Arc<dyn ThreadStore> {
        let backend = Arc::new(InMemoryBackend::new());
        let cano_id = Uuid::new_v4();
        let mut session = backend.begin_write().unwrap();
        session
            .insert_canonical_thread(CanonicalThread {
                cano_id,
                fp: 1,
                parent_fp: None,
                length: 1,
                parent_id: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();
        session
            .insert_document(Document {
                doc_id: Uuid::new_v4(),
                file_name: "a.txt".into(),
                raw_content: b"hi".to_vec(),
                cano_id,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();
        session.commit().unwrap();
        backend
    }

    #[tokio::test]
    async fn canonical_lookup_returns_404_for_unknown_file() {
        let state = Arc::new(ServerState::new(ServerConfig::default(), seeded_store()));
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/canonical/missing.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn canonical_lookup_returns_200_for_known_file() {
        let state = Arc::new(ServerState::new(ServerConfig::default(), seeded_store()));
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/canonical/a.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn children_of_unknown_id_is_200_with_empty_array() {
        let state = Arc::new(ServerState::new(ServerConfig::default(), seeded_store()));
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/children/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_uuid_path_param_is_400() {
        let state = Arc::new(ServerState::new(ServerConfig::default(), seeded_store()));
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/parent/not-a-uuid").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
