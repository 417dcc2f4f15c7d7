//! HTTP handlers

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::broadcast::ChunkReader;
use crate::constants::AUDIO_CONTENT_TYPE;
use crate::http::server::AppState;
use crate::source::SourceState;

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}

/// Relay status
#[derive(serde::Serialize)]
pub struct RelayStatus {
    pub listeners: usize,
    pub source_state: SourceState,
    pub chunks_read: u64,
    pub bytes_read: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
}

/// Get relay status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<RelayStatus>> {
    let status = RelayStatus {
        listeners: state.broadcaster.subscriber_count(),
        source_state: state.source_stats.state(),
        chunks_read: state.source_stats.chunks_read(),
        bytes_read: state.source_stats.bytes_read(),
        started_at: state.started_at,
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
    };

    Json(ApiResponse::ok(status))
}

/// Stream the live audio to one listener
///
/// The subscription is released when hyper drops the body, which happens on
/// every exit path: client disconnect, write error, or server shutdown.
pub async fn stream_audio(State(state): State<Arc<AppState>>) -> Response {
    let reader = ChunkReader::new(&state.broadcaster);

    tracing::info!(
        subscriber = %reader.id(),
        listeners = state.broadcaster.subscriber_count(),
        "Listener connected"
    );

    (
        [(header::CONTENT_TYPE, AUDIO_CONTENT_TYPE)],
        Body::from_stream(reader),
    )
        .into_response()
}
