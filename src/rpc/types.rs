//! Call results and error definitions.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::auth::AuthError;

/// Errors returned by [`crate::rpc::Client::call`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Server rejected the auth token (401).
    #[error("Unauthorized access - check your authentication credentials")]
    Unauthorized,

    /// Unknown function or base URL (404).
    #[error("Resource not found - check the URL or function name")]
    NotFound,

    /// Server failed while handling the call (500).
    #[error("Internal server error")]
    ServerError,

    /// Any other non-success status.
    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),

    /// Server answered with `success: false`.
    #[error("API Error: {0}")]
    ApiError(Value),

    /// Request could not be sent or the response body could not be read.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Envelope generation failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Base URL or function name does not form a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Map a non-success status to its error kind.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
            StatusCode::NOT_FOUND => ClientError::NotFound,
            StatusCode::INTERNAL_SERVER_ERROR => ClientError::ServerError,
            other => ClientError::UnexpectedStatus(other.as_u16()),
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Unauthorized => "unauthorized",
            ClientError::NotFound => "not_found",
            ClientError::ServerError => "server_error",
            ClientError::UnexpectedStatus(_) => "unexpected_status",
            ClientError::ApiError(_) => "api_error",
            ClientError::Transport(_) => "transport",
            ClientError::Auth(_) => "auth",
            ClientError::InvalidUrl(_) => "invalid_url",
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Size of a drained event stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub chunks: usize,
    pub bytes: usize,
}

/// Successful call result, by response content type.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutput {
    /// `application/json` body.
    Json(Value),
    /// `text/event-stream` body, consumed until the server closed it.
    Stream(StreamSummary),
    /// Any other body, as text.
    Text(String),
}

impl CallOutput {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            CallOutput::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            CallOutput::Json(value) => Some(value),
            _ => None,
        }
    }
}
