pub mod api;
pub mod config;
pub mod error;
pub mod state;
pub mod templates;
pub mod uploads;
pub mod web;

pub use config::GatewayConfig;
pub use state::AppState;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// All routes: the JSON API, the web UI and the stored uploads.
pub fn router(state: AppState) -> Router {
    let stored_uploads = ServeDir::new(state.uploads.dir());

    Router::new()
        .route("/", get(web::index))
        .route("/upload", post(web::upload))
        .route("/download_pdf", post(web::download_pdf))
        .route("/predict", post(api::predict))
        .route("/health", get(api::health))
        .nest_service(uploads::UPLOADS_ROUTE, stored_uploads)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
