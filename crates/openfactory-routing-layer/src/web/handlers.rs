//! C4 — Routing Front-End HTTP handlers.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use openfactory_core::AssetUuid;
use serde_json::json;
use std::collections::HashMap;

use crate::error::RoutingError;
use crate::sse_proxy;
use crate::web::AppState;

/// Parameters the front-end forwards downstream; anything outside this
/// whitelist is a client-supplied parameter we refuse to propagate.
const STREAM_WHITELIST: &[&str] = &["asset_uuid", "id", "start_time", "end_time"];
const STATE_WHITELIST: &[&str] = &["asset_uuid", "id", "start_time", "end_time", "granularity"];

fn forwarded_query(params: &HashMap<String, String>, whitelist: &[&str]) -> String {
    let pairs: Vec<String> = whitelist
        .iter()
        .filter_map(|key| params.get(*key).map(|v| format!("{key}={}", urlencode(v))))
        .collect();
    pairs.join("&")
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn asset_uuid_param(params: &HashMap<String, String>) -> Option<AssetUuid> {
    params.get("asset_uuid").cloned().and_then(AssetUuid::parse)
}

pub async fn asset_stream(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(asset) = asset_uuid_param(&params) else {
        return RoutingError::GroupNotFound.into_response();
    };

    let base_url = match state.controller.route(&asset).await {
        Ok(Some(url)) => url,
        Ok(None) => return RoutingError::GroupNotFound.into_response(),
        Err(err) => return RoutingError::Core(err).into_response(),
    };

    let query = forwarded_query(&params, STREAM_WHITELIST);
    let upstream = match base_url.join(&format!("asset_stream?{query}")) {
        Ok(url) => url,
        Err(err) => {
            return RoutingError::Core(openfactory_core::CoreError::Internal {
                message: err.to_string(),
            })
            .into_response()
        }
    };

    sse_proxy::proxy_event_stream(upstream).await
}

pub async fn asset_state(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let state_api_url = match state.controller.state_api_url() {
        Ok(url) => url,
        Err(_) => return RoutingError::StateApiUnresolvable.into_response(),
    };

    let query = forwarded_query(&params, STATE_WHITELIST);
    let upstream = match state_api_url.join(&format!("asset_state?{query}")) {
        Ok(url) => url,
        Err(err) => {
            return RoutingError::Core(openfactory_core::CoreError::Internal {
                message: err.to_string(),
            })
            .into_response()
        }
    };

    match state.state_query_client.get(upstream).send().await {
        Ok(resp) => {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            (status, body).into_response()
        }
        Err(err) => RoutingError::DownstreamUnreachable(err).into_response(),
    }
}

pub async fn health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

pub async fn ready(State(state): State<AppState>) -> Response {
    let (is_ready, issues) = state.controller.ready().await;
    if is_ready {
        Json(json!({ "status": "ready" })).into_response()
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready", "issues": issues })),
        )
            .into_response()
    }
}

pub async fn info(State(state): State<AppState>) -> Response {
    Json(json!({
        "version": state.version.application_version,
        "build_origin": state.version.application_manufacturer,
        "openfactory_version": state.version.openfactory_version,
    }))
    .into_response()
}
