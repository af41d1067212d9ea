//! Error types for Todoist API operations.

use std::time::Duration;

use thiserror::Error;

use crate::http::HttpError;
use crate::provider::ProviderError;

/// Errors that can occur when interacting with the Todoist API.
#[derive(Debug, Error)]
pub enum TodoistError {
    /// Transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Response body did not decode.
    #[error("JSON error on {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP 429.
    #[error("Rate limited on {path}")]
    RateLimited {
        path: String,
        retry_after: Option<Duration>,
    },

    /// HTTP 401 or 403.
    #[error("Authentication failed on {path}: {message}")]
    Auth { path: String, message: String },

    /// HTTP 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-2xx status.
    #[error("HTTP {status} from {path}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TodoistError {
    /// Classify a non-2xx response.
    pub fn from_status(path: &str, status: u16, message: String) -> Self {
        match status {
            401 | 403 => TodoistError::Auth {
                path: path.to_string(),
                message,
            },
            404 => TodoistError::NotFound(path.to_string()),
            _ => TodoistError::Status {
                path: path.to_string(),
                status,
                message,
            },
        }
    }
}

impl From<TodoistError> for ProviderError {
    fn from(err: TodoistError) -> Self {
        match err {
            TodoistError::Http(e) => ProviderError::network(e.to_string()),
            TodoistError::Json { path, source } => ProviderError::Decode {
                endpoint: path,
                message: source.to_string(),
            },
            TodoistError::RateLimited { path, retry_after } => ProviderError::RateLimited {
                endpoint: path,
                retry_after,
            },
            TodoistError::Auth { message, .. } => ProviderError::Auth { message },
            TodoistError::NotFound(resource) => ProviderError::NotFound { resource },
            TodoistError::Status {
                path,
                status,
                message,
            } => ProviderError::api(path, Some(status), message),
            TodoistError::Config(message) => ProviderError::api("config", None, message),
        }
    }
}
