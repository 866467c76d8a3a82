//! Router construction and HTTP entrypoint (SPEC_FULL.md §6).

use axum::{
    Json, Router,
    http::{Method, StatusCode, Uri},
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{
    models::NotFoundResponse,
    services::{create_job, get_job, health},
    state::AppState,
    webhook::vendor_webhook,
};

/// Builds the router for a given `AppState`. Split out from `run` so integration
/// tests can drive it directly with `tower::ServiceExt::oneshot`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs", post(create_job))
        .route("/jobs/{requestId}", get(get_job))
        .route("/vendor-webhook/{vendor}", post(vendor_webhook))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(state)
        // Automatically decompress gzip/deflate/brotli request bodies.
        .layer(RequestDecompressionLayer::new())
        .layer(CorsLayer::permissive())
}

async fn not_found(method: Method, uri: Uri) -> (StatusCode, Json<NotFoundResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: "Not found",
            path: uri.path().to_string(),
            method: method.to_string(),
        }),
    )
}

/// Serves the API until `shutdown` is cancelled.
pub async fn serve(
    address: std::net::SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), crate::AnyError> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(%address, "dispatch API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
