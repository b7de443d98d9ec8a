use crate::backend::{build_backend, UpscaleBackend};
use crate::config::Config;
use crate::images::{MediaStorage, UpscaleService};
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod page;
pub mod routes_upscale;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Upload handler bound to the media directory and backend
    pub service: UpscaleService,
}

impl AppContext {
    /// Build a context from configuration and an already constructed backend
    pub fn new(config: Config, backend: Arc<dyn UpscaleBackend>) -> Self {
        let storage = MediaStorage::new(config.media.root.clone(), config.media.url.clone());
        Self {
            service: UpscaleService::new(storage, backend),
            config: Arc::new(config),
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let mut app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Upload page
        .merge(routes_upscale::page_routes())
        // JSON API
        .nest("/api", routes_upscale::api_routes());

    // Serve stored images when the media URL is a path on this server
    if let Some(mount) = media_mount(&ctx.config.media.url) {
        tracing::info!(
            "Serving media from {:?} at {}",
            ctx.config.media.root,
            mount
        );
        app = app.nest_service(&mount, ServeDir::new(&ctx.config.media.root));
    }

    app.layer(DefaultBodyLimit::max(ctx.config.server.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Route prefix to mount the media directory on, if the media URL is local.
fn media_mount(url: &str) -> Option<String> {
    if !url.starts_with('/') {
        return None;
    }
    let mount = url.trim_end_matches('/');
    if mount.is_empty() {
        tracing::warn!("media.url is '/', not serving media files from this server");
        return None;
    }
    Some(mount.to_string())
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let backend = build_backend(&config.backend).context("Failed to initialise backend")?;
    start_server_with_backend(config, backend).await
}

/// Start the HTTP server with an explicit backend
pub async fn start_server_with_backend(
    config: Config,
    backend: Arc<dyn UpscaleBackend>,
) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let ctx = AppContext::new(config, backend);
    ctx.service
        .storage()
        .ensure_root()
        .await
        .context("Failed to prepare media directory")?;

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_mount() {
        assert_eq!(media_mount("/media/").as_deref(), Some("/media"));
        assert_eq!(media_mount("/static/uploads").as_deref(), Some("/static/uploads"));
        assert_eq!(media_mount("https://cdn.example.com/media/"), None);
        assert_eq!(media_mount("/"), None);
    }
}
