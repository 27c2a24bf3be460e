use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamApiError {
    #[error("dispatcher failed to acquire a partition assignment in time")]
    PartitionAssignmentTimeout,

    #[error(transparent)]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error(transparent)]
    Configuration(#[from] openfactory_core::CoreError),
}

impl IntoResponse for StreamApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready", "issues": self.to_string() })),
        )
            .into_response()
    }
}
