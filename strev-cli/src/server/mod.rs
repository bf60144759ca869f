//! HTTP edge service.
//!
//! Serves stream resolution, the batch fetch gateway and title metadata.
//! Cacheable routes answer through the cache layer with the request URL as the
//! edge key, and every response carries a permissive CORS origin.

mod error;
mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::HeaderValue;
use axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use axum::routing::get;
use platforms_parser::aggregator::Aggregator;
use platforms_parser::enrichment::EnrichmentClient;
use platforms_parser::gateway::BatchGateway;
use platforms_parser::resolver::StreamResolver;
use strev_cache::CacheManager;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::commands::CommandExecutor;
use crate::error::Result;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<StreamResolver>,
    pub gateway: Arc<BatchGateway>,
    pub enrichment: Arc<EnrichmentClient>,
    pub cache: Arc<CacheManager>,
}

impl AppState {
    pub async fn from_executor(executor: &CommandExecutor) -> Result<Self> {
        let cache = Arc::new(CacheManager::new(executor.config().cache.clone()).await?);
        let aggregator = Arc::new(Aggregator::new(Arc::new(executor.factory())));
        Ok(Self {
            resolver: Arc::new(StreamResolver::new(aggregator, Some(cache.clone()))),
            gateway: Arc::new(executor.gateway()),
            enrichment: Arc::new(executor.enrichment()),
            cache,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/manifest.json", get(handlers::manifest))
        .route("/api/streams/{provider}/{episode_id}", get(handlers::streams))
        .route("/api/fetch", get(handlers::fetch))
        .route("/api/search", get(handlers::search))
        .route("/api/titles/{id}", get(handlers::title))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
}

pub async fn serve(state: AppState, bind: &str, maintenance_interval: Duration) -> Result<()> {
    let maintenance = state.cache.clone().start_maintenance_task(maintenance_interval);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %bind, "server listening");

    axum::serve(listener, build_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    maintenance.abort();
    state.cache.settle().await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
