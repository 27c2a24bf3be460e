//! Error taxonomy for the routing front-end, mapping onto the HTTP status
//! codes in the component design's error table.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use openfactory_core::error::CoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("asset group not found")]
    GroupNotFound,

    #[error("state API not configured")]
    StateApiUnresolvable,

    #[error("error contacting the downstream service")]
    DownstreamUnreachable(#[from] reqwest::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl IntoResponse for RoutingError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            Self::GroupNotFound => (StatusCode::NOT_FOUND, "Asset group not found".to_string()),
            Self::StateApiUnresolvable => {
                (StatusCode::NOT_FOUND, "State API is not available".to_string())
            }
            Self::DownstreamUnreachable(_) => (
                StatusCode::BAD_GATEWAY,
                "Error contacting the State API.".to_string(),
            ),
            Self::Core(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
