use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Reference catalog error: {0}")]
    Catalog(#[from] crate::catalog::CatalogError),

    #[error("Parse error: {0}")]
    Parse(#[from] crate::datex::ParseError),

    #[error("Integrity mismatch: {0}")]
    Integrity(String),

    #[error("Upstream feed error: {0}")]
    Upstream(String),

    #[error("Time-series store error: {0}")]
    Store(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Upstream(msg) => {
                tracing::error!("Upstream feed error: {msg}");
                (StatusCode::BAD_GATEWAY, format!("Upstream feed error: {msg}"))
            }
            Self::Store(msg) => {
                tracing::error!("Time-series store error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Time-series store unavailable".to_string(),
                )
            }
            Self::Parse(e) => {
                tracing::error!("Parse error: {e}");
                (StatusCode::BAD_GATEWAY, "Malformed feed document".to_string())
            }
            Self::Config(_) | Self::Catalog(_) | Self::Integrity(_) | Self::Internal(_) => {
                tracing::error!("Internal error: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
