use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use parley_agent::AgentRuntime;
use parley_core::ParleyConfig;
use parley_sessions::SessionStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::http;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: ParleyConfig,
    pub agent: AgentRuntime,
    pub sessions: SessionStore,
    /// Active WS connections: conn_id -> outbound text frames.
    pub ws_clients: DashMap<String, mpsc::Sender<String>>,
}

impl AppState {
    pub fn new(config: ParleyConfig, agent: AgentRuntime, sessions: SessionStore) -> Self {
        Self {
            config,
            agent,
            sessions,
            ws_clients: DashMap::new(),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    // JSON endpoints only; compressing SSE would buffer the stream.
    let sessions = Router::new()
        .route(
            "/api/chat/sessions",
            get(http::sessions::list_sessions)
                .post(http::sessions::create_session)
                .delete(http::sessions::clear_sessions),
        )
        .route(
            "/api/chat/sessions/{id}",
            get(http::sessions::get_session)
                .put(http::sessions::rename_session)
                .delete(http::sessions::delete_session),
        )
        .layer(CompressionLayer::new());

    Router::new()
        .route("/", get(http::health::root_handler))
        .route("/api/health", get(http::health::health_handler))
        .route("/api/openai/prompt", post(http::prompt::prompt_handler))
        .route("/api/chat/stream", get(http::stream::stream_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .merge(sessions)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_credentials(true);
    match HeaderValue::from_str(origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(%origin, "invalid CORS origin, cross-origin requests will be refused");
            layer
        }
    }
}
