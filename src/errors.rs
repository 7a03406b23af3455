use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpsError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailure {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Administrator privileges required")]
    Unauthorized,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl OpsError {
    /// Spawn errors count as tool failures: the executable never produced a result.
    pub fn tool_spawn(tool: &str, err: std::io::Error) -> Self {
        OpsError::ToolFailure {
            tool: tool.to_string(),
            status: "spawn error".to_string(),
            stderr: err.to_string(),
        }
    }

    pub fn storage(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        OpsError::Storage(format!("{}: {}", context, err))
    }
}

impl IntoResponse for OpsError {
    fn into_response(self) -> Response {
        let status = match self {
            OpsError::Validation(_) => StatusCode::BAD_REQUEST,
            OpsError::NotFound(_) => StatusCode::NOT_FOUND,
            OpsError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, OpsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            OpsError::Validation("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OpsError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            OpsError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            OpsError::Storage("disk".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_tool_failure_message_carries_stderr() {
        let err = OpsError::ToolFailure {
            tool: "pg_dump".into(),
            status: "exit status: 1".into(),
            stderr: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("pg_dump"));
        assert!(msg.contains("connection refused"));
    }
}
