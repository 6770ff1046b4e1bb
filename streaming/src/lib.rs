//! Streaming Dispatcher (spec.md §4.4): serves synchronous streaming
//! requests — direct chat, the multi-member "council" pattern, and
//! summarization — as server-sent token streams, with mid-stream
//! cancellation via an in-flight registry and a shared response cache.
//!
//! **Public API**: register providers on a [`StreamDispatcher`], then serve
//! it behind an axum [`Router`](axum::Router) built by [`app::router`], or
//! bind one directly with [`run_server`].

mod app;
mod cache_key;
mod dispatcher;
mod registry;
mod response_cache;
mod routes;
mod types;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

pub use app::{router, AppState};
pub use dispatcher::{StreamDispatcher, PROVIDER_ATTEMPT_TIMEOUT};
pub use registry::StreamRegistry;
pub use response_cache::{ResponseCache, DEFAULT_RESPONSE_TTL};
pub use types::{ChatStreamRequest, CouncilStreamRequest, ProviderTarget};

const DEFAULT_ADDR: &str = "127.0.0.1:8090";

/// Binds and serves the streaming dispatcher's HTTP surface on `addr`
/// (default `127.0.0.1:8090`), running until the process is signaled to
/// stop. Used by the runtime binary; tests bind their own listener via
/// [`router`] directly instead.
pub async fn run_server(
    dispatcher: Arc<StreamDispatcher>,
    addr: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "streaming dispatcher listening");

    let state = Arc::new(AppState { dispatcher });
    let app = router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
