pub mod handlers;

use axum::routing::get;
use axum::Router;
use openfactory_core::RoutingController;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

/// Version metadata surfaced at `/info`, sourced from the environment.
#[derive(Clone)]
pub struct VersionInfo {
    pub application_version: String,
    pub application_manufacturer: String,
    pub openfactory_version: String,
}

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<RoutingController>,
    pub state_query_client: reqwest::Client,
    pub version: VersionInfo,
}

impl AppState {
    pub fn new(controller: Arc<RoutingController>, version: VersionInfo) -> anyhow::Result<Self> {
        let state_query_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { controller, state_query_client, version })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/asset_stream", get(handlers::asset_stream))
        .route("/asset_state", get(handlers::asset_state))
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/info", get(handlers::info))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
