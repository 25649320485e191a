use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{field}: {message}")]
    InvalidInput { field: &'static str, message: String },

    #[error("too many submissions, please wait before trying again")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    PolicyViolation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("notification error: {0}")]
    Notification(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        AppError::InvalidInput {
            field,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PolicyViolation(_) => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::InvalidInput { field, .. } => {
                serde_json::json!({ "error": self.to_string(), "field": field })
            }
            AppError::RateLimited { reset_at } => serde_json::json!({
                "error": self.to_string(),
                "retry_after_secs": (*reset_at - Utc::now()).num_seconds().max(0),
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, axum::Json(body)).into_response()
    }
}
