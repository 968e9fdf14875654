use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use packtrack_core::Result;

use crate::handlers;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cron = get(handlers::cron_info).merge(post(handlers::run_cron).route_layer(
        axum::middleware::from_fn_with_state(state.clone(), crate::auth::require_auth),
    ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/cron/update-packages", cron)
        .route("/api/webhook/telegram", post(handlers::telegram_webhook))
        .route("/api/packages", post(handlers::create_package))
        .route("/api/track", post(handlers::refresh_tracking))
        .layer(DefaultBodyLimit::max(256 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` fires, then drain in-flight requests.
pub async fn serve(addr: SocketAddr, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "http server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("http server stopped");
    Ok(())
}
