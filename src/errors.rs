use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::BookingStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    NotFound,
    Validation,
    Transport,
    Timeout,
    Unexpected,
    NotReady,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid field values: {0}")]
    InvalidFields(String),

    #[error("booking cannot move from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected response: {0}")]
    Unexpected(String),

    #[error("backend connection is not ready")]
    NotReady,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Unauthorized(_) => ErrorKind::Authorization,
            ClientError::NotFound(_) => ErrorKind::NotFound,
            ClientError::InvalidFields(_) | ClientError::InvalidTransition { .. } => {
                ErrorKind::Validation
            }
            ClientError::Transport(_) => ErrorKind::Transport,
            ClientError::Timeout(_) => ErrorKind::Timeout,
            ClientError::Unexpected(_) => ErrorKind::Unexpected,
            ClientError::NotReady => ErrorKind::NotReady,
        }
    }

    /// Only transport failures are worth another attempt. The booking
    /// timeout is a hard ceiling and business answers will not change.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    pub fn user_message(&self) -> String {
        match self {
            ClientError::Unauthorized(_) => {
                "You are not allowed to do that. Try signing in again.".to_string()
            }
            ClientError::NotFound(what) => format!("We couldn't find that {what}."),
            ClientError::InvalidFields(msg) => format!("Please check the form: {msg}."),
            ClientError::InvalidTransition { from, to } => {
                format!("A {from} booking can't be marked {to}.")
            }
            ClientError::Transport(_) => {
                "We couldn't reach the server. Check your connection and try again.".to_string()
            }
            ClientError::Timeout(_) => {
                "The server may be busy. Please try again in a moment.".to_string()
            }
            ClientError::Unexpected(_) => "Something went wrong. Please try again.".to_string(),
            ClientError::NotReady => "Still connecting. Please wait a moment.".to_string(),
        }
    }

    /// Maps a gateway error response back onto the taxonomy.
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::InvalidFields(message)
            }
            s if s.is_server_error() => ClientError::Transport(format!("{s}: {message}")),
            s => ClientError::Unexpected(format!("{s}: {message}")),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Unexpected(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Unexpected(e.to_string())
    }
}

impl IntoResponse for ClientError {
    fn into_response(self) -> Response {
        let status = match &self {
            ClientError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ClientError::NotFound(_) => StatusCode::NOT_FOUND,
            ClientError::InvalidFields(_) | ClientError::InvalidTransition { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ClientError::Transport(_) => StatusCode::BAD_GATEWAY,
            ClientError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ClientError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ClientError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(ClientError::Transport("connection reset".into()).is_retryable());
        assert!(!ClientError::Timeout(Duration::from_secs(15)).is_retryable());
        assert!(!ClientError::Unauthorized("nope".into()).is_retryable());
        assert!(!ClientError::NotFound("booking".into()).is_retryable());
        assert!(!ClientError::InvalidFields("duration".into()).is_retryable());
        assert!(!ClientError::Unexpected("garbage".into()).is_retryable());
    }

    #[test]
    fn test_timeout_message_mentions_busy_server() {
        let msg = ClientError::Timeout(Duration::from_secs(15)).user_message();
        assert!(msg.contains("server may be busy"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ClientError::from_status(StatusCode::FORBIDDEN, "x".into()).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            ClientError::from_status(StatusCode::NOT_FOUND, "x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ClientError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ClientError::from_status(StatusCode::SERVICE_UNAVAILABLE, "x".into()).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            ClientError::from_status(StatusCode::IM_A_TEAPOT, "x".into()).kind(),
            ErrorKind::Unexpected
        );
    }
}
