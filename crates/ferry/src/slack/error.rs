//! Error types for Slack Web API operations.

use std::time::Duration;

use thiserror::Error;

use crate::http::HttpError;
use crate::provider::ProviderError;

/// `error` codes meaning the token itself is unusable.
const AUTH_ERRORS: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "token_revoked",
    "token_expired",
    "account_inactive",
];

/// Auth codes meaning the grant is gone for good rather than stale.
const REVOKED_ERRORS: &[&str] = &["token_revoked", "account_inactive"];

/// `error` codes meaning Slack failed on its side.
const SERVER_ERRORS: &[&str] = &[
    "internal_error",
    "fatal_error",
    "service_unavailable",
    "request_timeout",
];

/// Errors that can occur when interacting with the Slack Web API.
#[derive(Debug, Error)]
pub enum SlackError {
    /// Transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Response body did not decode.
    #[error("JSON error on {method}: {source}")]
    Json {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP status outside 2xx.
    #[error("HTTP {status} from {method}: {message}")]
    Status {
        method: String,
        status: u16,
        message: String,
    },

    /// `ok: false` with an error code.
    #[error("Slack API error on {method}: {error}")]
    Api { method: String, error: String },

    /// HTTP 429 or `error: ratelimited`.
    #[error("Rate limited on {method}")]
    RateLimited {
        method: String,
        retry_after: Option<Duration>,
    },

    /// Token rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Token lacks a scope.
    #[error("Missing scope: {0}")]
    MissingScope(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SlackError {
    /// Classify an `ok: false` response.
    pub fn from_error_code(method: &str, error: &str, needed: Option<&str>) -> Self {
        match error {
            "ratelimited" | "rate_limited" => SlackError::RateLimited {
                method: method.to_string(),
                retry_after: None,
            },
            "missing_scope" => SlackError::MissingScope(needed.unwrap_or("unknown").to_string()),
            e if AUTH_ERRORS.contains(&e) => SlackError::Auth(e.to_string()),
            e => SlackError::Api {
                method: method.to_string(),
                error: e.to_string(),
            },
        }
    }
}

impl From<SlackError> for ProviderError {
    fn from(err: SlackError) -> Self {
        match err {
            SlackError::Http(e) => ProviderError::network(e.to_string()),
            SlackError::Json { method, source } => ProviderError::Decode {
                endpoint: method,
                message: source.to_string(),
            },
            SlackError::Status {
                method,
                status,
                message,
            } => match status {
                401 | 403 => ProviderError::Auth { message },
                404 => ProviderError::not_found(method),
                _ => ProviderError::api(method, Some(status), message),
            },
            SlackError::Api { method, error } => {
                if SERVER_ERRORS.contains(&error.as_str()) {
                    ProviderError::api(method, Some(503), error)
                } else if error.ends_with("_not_found") {
                    ProviderError::not_found(format!("{} ({})", method, error))
                } else {
                    ProviderError::api(method, None, error)
                }
            }
            SlackError::RateLimited {
                method,
                retry_after,
            } => ProviderError::RateLimited {
                endpoint: method,
                retry_after,
            },
            SlackError::Auth(message) if REVOKED_ERRORS.contains(&message.as_str()) => {
                ProviderError::Revoked { message }
            }
            SlackError::Auth(message) => ProviderError::Auth { message },
            SlackError::MissingScope(scope) => ProviderError::MissingScope { scope },
            SlackError::Config(message) => ProviderError::api("config", None, message),
        }
    }
}

/// Check if an error is a rate limit error.
pub fn is_rate_limit_error(err: &SlackError) -> bool {
    matches!(
        err,
        SlackError::RateLimited { .. } | SlackError::Status { status: 429, .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;

    #[test]
    fn test_error_code_classification() {
        assert!(is_rate_limit_error(&SlackError::from_error_code(
            "users.list",
            "ratelimited",
            None
        )));
        assert!(matches!(
            SlackError::from_error_code("auth.test", "token_revoked", None),
            SlackError::Auth(_)
        ));
        assert!(matches!(
            SlackError::from_error_code("users.list", "missing_scope", Some("users:read")),
            SlackError::MissingScope(scope) if scope == "users:read"
        ));
        assert!(matches!(
            SlackError::from_error_code("conversations.history", "channel_not_found", None),
            SlackError::Api { .. }
        ));
    }

    #[test]
    fn test_conversion_to_provider_error() {
        let not_found: ProviderError =
            SlackError::from_error_code("conversations.history", "channel_not_found", None).into();
        assert!(matches!(not_found, ProviderError::NotFound { .. }));

        let auth: ProviderError = SlackError::Auth("invalid_auth".to_string()).into();
        assert!(auth.is_auth_failure());
        assert!(matches!(auth, ProviderError::Auth { .. }));

        let revoked: ProviderError =
            SlackError::from_error_code("auth.test", "token_revoked", None).into();
        assert!(matches!(revoked, ProviderError::Revoked { .. }));
        assert_eq!(
            revoked.connection_status(),
            Some(crate::entity::ConnectionStatus::Revoked)
        );

        let limited: ProviderError = SlackError::RateLimited {
            method: "users.list".to_string(),
            retry_after: Some(Duration::from_secs(3)),
        }
        .into();
        assert!(limited.is_rate_limited());
    }

    #[test]
    fn test_server_error_codes_are_retryable() {
        let policy = RetryPolicy::default();
        let internal: ProviderError =
            SlackError::from_error_code("conversations.history", "internal_error", None).into();
        let invalid: ProviderError =
            SlackError::from_error_code("conversations.history", "invalid_cursor", None).into();

        assert!(policy.is_retryable(&internal));
        assert!(!policy.is_retryable(&invalid));
    }
}
