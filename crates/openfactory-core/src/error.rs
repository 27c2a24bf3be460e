//! Error taxonomy shared by every crate in the workspace.
//!
//! One `thiserror` enum with `#[from]` conversions from the libraries we
//! actually call, holding only the variants this domain needs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("external service error ({service}): {message}")]
    ExternalService { service: &'static str, message: String },

    #[error("deployment backend unreachable: {message}")]
    BackendUnreachable { message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Docker(#[from] bollard::errors::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("internal error: {message}")]
    Internal { message: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { resource, id: id.into() }
    }

    pub fn external_service(service: &'static str, message: impl Into<String>) -> Self {
        Self::ExternalService { service, message: message.into() }
    }
}
