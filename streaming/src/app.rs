//! Axum app: shared dispatcher state and the route table (spec.md §4.4
//! surface: `serveStream`/`cancel`).

use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::dispatcher::StreamDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<StreamDispatcher>,
}

/// Builds the streaming dispatcher's router: one SSE route per surface
/// (`chat`, `council`, `summarize`) plus a cancel endpoint.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/stream/chat", post(crate::routes::chat))
        .route("/stream/council", post(crate::routes::council))
        .route("/stream/summarize", post(crate::routes::summarize))
        .route("/stream/:request_id/cancel", post(crate::routes::cancel))
        .layer(cors_layer_from_env())
        .with_state(state)
}

/// Builds the router's CORS layer from `CORS_ORIGIN` (spec.md §6 env
/// surface): unset or `*` allows any origin; otherwise only the named
/// origin is allowed. Methods/headers stay permissive either way since this
/// surface carries no cookies or other origin-sensitive credentials.
fn cors_layer_from_env() -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match std::env::var("CORS_ORIGIN") {
        Ok(origin) if origin != "*" && !origin.is_empty() => {
            match axum::http::HeaderValue::from_str(&origin) {
                Ok(value) => layer.allow_origin(value),
                Err(_) => layer.allow_origin(Any),
            }
        }
        _ => layer.allow_origin(Any),
    }
}
