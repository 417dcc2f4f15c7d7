//! HTTP listener and router

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::broadcast::Broadcaster;
use crate::error::ServerError;
use crate::http::handlers;
use crate::source::SourceStats;

/// State shared by all handlers
pub struct AppState {
    pub broadcaster: Broadcaster,
    pub source_stats: Arc<SourceStats>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(broadcaster: Broadcaster, source_stats: Arc<SourceStats>) -> Self {
        Self {
            broadcaster,
            source_stats,
            started_at: Utc::now(),
        }
    }
}

/// Build the router: `/status` reports, every other path streams audio
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .fallback(handlers::stream_audio)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bound HTTP listener, ready to serve
pub struct StreamServer {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl StreamServer {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr, state: Arc<AppState>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::BindFailed { addr, source })?;

        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::Serve)
    }

    /// Serve until `shutdown` resolves
    ///
    /// Every listener stream is closed as soon as shutdown begins so the
    /// graceful drain does not wait on endless response bodies.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let broadcaster = self.state.broadcaster.clone();
        let app = router(self.state);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutting down, closing listener streams");
                broadcaster.close_all();
            })
            .await
            .map_err(ServerError::Serve)
    }
}
