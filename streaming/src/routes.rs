//! HTTP handlers: each streaming surface turns a [`StreamDispatcher`] event
//! receiver into an SSE response (spec.md §6 "bot API shape" sibling —
//! here, the HTTP-facing shape for the streaming dispatcher).

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::{Json, http::StatusCode};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::app::AppState;
use crate::types::{ChatStreamRequest, CouncilStreamRequest};

fn to_sse_stream(
    rx: tokio::sync::mpsc::Receiver<optimaizer_protocol::ProtocolEvent>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(rx).map(|event| {
        let payload = event
            .to_value()
            .unwrap_or_else(|_| serde_json::json!({"type": "error", "error": "serialization error"}));
        Ok(Event::default()
            .json_data(payload)
            .unwrap_or_else(|_| Event::default().data("{\"type\":\"error\"}")))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatStreamRequest>,
) -> impl IntoResponse {
    to_sse_stream(state.dispatcher.serve_chat(request))
}

pub async fn summarize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatStreamRequest>,
) -> impl IntoResponse {
    to_sse_stream(state.dispatcher.serve_summarize(request))
}

pub async fn council(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CouncilStreamRequest>,
) -> impl IntoResponse {
    to_sse_stream(state.dispatcher.serve_council(request))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> impl IntoResponse {
    if state.dispatcher.cancel(&request_id) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}
