//! HTTP listener with the stream and still routes registered

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, response::Response, routing::get, Router};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::capture::CaptureSource;
use crate::error::ServerError;
use crate::handlers::{capture_still, serve_stream, StreamEnd};
use crate::http::channel_response;
use crate::shutdown::ShutdownSignal;
use crate::{ServerConfig, StreamConfig};

/// Shared by every request
pub struct AppState {
    pub source: Arc<dyn CaptureSource>,
    pub stream: StreamConfig,
    pub shutdown: ShutdownSignal,
}

impl AppState {
    pub fn new(
        source: Arc<dyn CaptureSource>,
        stream: StreamConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            source,
            stream,
            shutdown,
        }
    }
}

/// `GET /` streams MJPEG, `GET /jpg` returns one capture.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(stream_endpoint))
        .route("/jpg", get(still_endpoint))
        .with_state(Arc::new(state))
}

async fn stream_endpoint(State(state): State<Arc<AppState>>) -> Response {
    let (mut writer, pending) = channel_response();

    tokio::task::spawn_blocking(move || {
        let outcome = serve_stream(&*state.source, &mut writer, &state.stream, &state.shutdown);
        if let StreamEnd::Shutdown = outcome.end {
            info!("Stream ended by shutdown after {} frames", outcome.frames);
        }
    });

    pending.into_response().await
}

async fn still_endpoint(State(state): State<Arc<AppState>>) -> Response {
    let (mut writer, pending) = channel_response();

    tokio::task::spawn_blocking(move || {
        if let Err(e) = capture_still(&*state.source, &mut writer) {
            warn!("Still capture failed: {}", e);
        }
    });

    pending.into_response().await
}

/// Serve on an already bound listener until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: ShutdownSignal,
) -> Result<(), ServerError> {
    let app = router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
        .map_err(ServerError::Serve)
}

/// Bind the configured address and serve.
pub async fn run(
    config: &ServerConfig,
    state: AppState,
    shutdown: ShutdownSignal,
) -> Result<(), ServerError> {
    let addr_str = format!("{}:{}", config.bind_address, config.port);
    let addr: SocketAddr = addr_str.parse().map_err(|source| ServerError::Address {
        addr: addr_str.clone(),
        source,
    })?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr_str.clone(),
            source,
        })?;

    info!("Starting server on http://{}", addr);
    info!("MJPEG stream: http://{}/", addr);
    info!("JPEG capture: http://{}/jpg", addr);

    let result = serve(listener, state, shutdown).await;
    if let Err(e) = &result {
        error!("Server stopped: {}", e);
    }
    result
}
