pub mod api;
pub mod app_state;
pub mod chat;
pub mod config;
pub mod media;
pub mod storage;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Extension};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

//
// Re-export
//
pub use api::{ApiError, log_request_errors};
pub use app_state::AppState;
pub use chat::{ChatClient, ChatError, ChatProvider, ChatSettings};
pub use config::Config;
pub use media::{Codecs, RangeError, TrimRange, VideoInfo};

/// Build the HTTP router over `state`
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(api::index))
        .route("/chat", post(api::chat))
        // size is enforced while streaming, see storage::write_limited
        .route("/upload", post(api::upload).layer(DefaultBodyLimit::disable()))
        .route("/cut", post(api::cut))
        .route("/download/{filename}", get(api::download))
        .route("/cleanup", post(api::cleanup))
        .layer(axum::middleware::from_fn(log_request_errors))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state))
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    ffmpeg_next::init()?;

    let state = AppState::new(&config)?;
    info!(
        uploads = ?state.uploads_dir(),
        processed = ?state.processed_dir(),
        max_upload_size = state.max_upload_size,
        "Workspace ready"
    );

    let addr = format!("0.0.0.0:{}", config.listen_on_port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(?error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
