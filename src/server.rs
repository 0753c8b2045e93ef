//! HTTP surface: an axum router in front of [`ImageController`].
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /health` | 200, plain text |
//! | `GET <prefix>{*path}` | [`ImageController::dispatch`] on the blocking pool |
//!
//! Image work is synchronous (file I/O, decode, encode), so every request
//! is handed to `spawn_blocking` with the request span carried along.

use crate::controller::ImageController;
use crate::fallback::PLACEHOLDER_PNG;
use crate::imaging::ImageCodec;
use crate::response::{CacheStatus, ImageResponse};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the router. `route_prefix` must start and end with `/`.
pub fn router<B: ImageCodec + 'static>(
    controller: Arc<ImageController<B>>,
    route_prefix: &str,
) -> Router {
    let image_route = format!("{route_prefix}{{*path}}");
    Router::new()
        .route("/health", get(health_check))
        .route(&image_route, get(serve_image::<B>))
        .with_state(controller)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn serve_image<B: ImageCodec + 'static>(
    State(controller): State<Arc<ImageController<B>>>,
    Path(path): Path<String>,
) -> Response {
    let span = tracing::Span::current();
    let result = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        controller.dispatch(&path)
    })
    .await;

    match result {
        Ok(image) => image.into_response(),
        Err(e) => {
            error!(error = %e, "image task failed");
            ImageResponse::new(PLACEHOLDER_PNG.to_vec(), CacheStatus::Placeholder).into_response()
        }
    }
}

/// Serve `app` on `listener` until SIGINT/SIGTERM.
pub async fn run(listener: TcpListener, app: Router) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        address = %addr,
        "Server listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, starting graceful shutdown");
}
