use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Unknown match id")]
    InvalidMatchId,

    #[error("Unknown community")]
    InvalidCommunity,

    #[error("No statistics recorded for steam id")]
    InvalidSteamId,

    #[error("Demo already uploaded for this match")]
    DemoAlreadyUploaded,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Invalid request: {0}")]
    BadRequest(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Demo storage error: {0}")]
    Storage(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Steam API error: {0}")]
    Steam(String),
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            BackendError::InvalidMatchId
            | BackendError::InvalidCommunity
            | BackendError::InvalidSteamId => (StatusCode::NOT_FOUND, self.to_string()),
            BackendError::DemoAlreadyUploaded => (StatusCode::CONFLICT, self.to_string()),
            BackendError::NotLoggedIn => (StatusCode::UNAUTHORIZED, self.to_string()),
            BackendError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            BackendError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            BackendError::Pool(e) => {
                tracing::error!("Database pool error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            BackendError::Storage(e) => {
                tracing::error!("Demo storage error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Demo storage error".to_string(),
                )
            }
            BackendError::Session(e) => {
                tracing::error!("Session error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Session error".to_string(),
                )
            }
            BackendError::Steam(e) => {
                tracing::error!("Steam API error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Steam API error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
