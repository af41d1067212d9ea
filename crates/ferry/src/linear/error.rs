//! Error types for Linear GraphQL operations.

use std::time::Duration;

use thiserror::Error;

use super::types::GraphQlError;
use crate::http::HttpError;
use crate::provider::ProviderError;

/// Errors that can occur when interacting with the Linear API.
#[derive(Debug, Error)]
pub enum LinearError {
    /// Transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Response body did not decode.
    #[error("JSON error on {operation}: {source}")]
    Json {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP status outside 2xx without a GraphQL error body.
    #[error("HTTP {status} from {operation}: {message}")]
    Status {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// Non-empty `errors` array.
    #[error("GraphQL error on {operation}: {message}")]
    GraphQl {
        operation: &'static str,
        code: Option<String>,
        message: String,
    },

    /// `RATELIMITED` error or HTTP 429.
    #[error("Rate limited on {operation}")]
    RateLimited {
        operation: &'static str,
        retry_after: Option<Duration>,
    },

    /// Token rejected or forbidden.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A queried entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl LinearError {
    /// Classify the first entry of a GraphQL `errors` array.
    pub fn from_graphql(operation: &'static str, errors: &[GraphQlError]) -> Self {
        let Some(first) = errors.first() else {
            return LinearError::GraphQl {
                operation,
                code: None,
                message: "empty error list".to_string(),
            };
        };

        match first.code() {
            Some("RATELIMITED") => LinearError::RateLimited {
                operation,
                retry_after: None,
            },
            Some("AUTHENTICATION_ERROR") | Some("FORBIDDEN") => {
                LinearError::Auth(first.message.clone())
            }
            code => LinearError::GraphQl {
                operation,
                code: code.map(String::from),
                message: errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            },
        }
    }
}

impl From<LinearError> for ProviderError {
    fn from(err: LinearError) -> Self {
        match err {
            LinearError::Http(e) => ProviderError::network(e.to_string()),
            LinearError::Json { operation, source } => ProviderError::Decode {
                endpoint: operation.to_string(),
                message: source.to_string(),
            },
            LinearError::Status {
                operation,
                status,
                message,
            } => match status {
                401 | 403 => ProviderError::Auth { message },
                _ => ProviderError::api(operation, Some(status), message),
            },
            LinearError::GraphQl {
                operation,
                code,
                message,
            } => match code.as_deref() {
                Some("INTERNAL_SERVER_ERROR") => ProviderError::api(operation, Some(500), message),
                _ => ProviderError::api(operation, None, message),
            },
            LinearError::RateLimited {
                operation,
                retry_after,
            } => ProviderError::RateLimited {
                endpoint: operation.to_string(),
                retry_after,
            },
            LinearError::Auth(message) => ProviderError::Auth { message },
            LinearError::NotFound(resource) => ProviderError::NotFound { resource },
            LinearError::Config(message) => ProviderError::api("config", None, message),
        }
    }
}

/// Check if an error is a rate limit error.
pub fn is_rate_limit_error(err: &LinearError) -> bool {
    matches!(
        err,
        LinearError::RateLimited { .. } | LinearError::Status { status: 429, .. }
    )
}
