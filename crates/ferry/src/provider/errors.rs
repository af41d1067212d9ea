use std::time::Duration;

use thiserror::Error;

use crate::entity::{ConnectionStatus, Platform};
use crate::retry::RetryClassify;

/// Errors surfaced by an [`ImportProvider`](super::ImportProvider).
///
/// Wire-specific envelopes (Slack `ok` flags, GraphQL `errors` arrays) are
/// unwrapped inside each provider and converted into this type.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credential rejected or required scope missing.
    #[error("Connection invalid: {message}")]
    ConnectionInvalid {
        message: String,
        #[source]
        source: Option<Box<ProviderError>>,
    },

    /// Authentication failed on an individual call.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The credential was revoked or its account deactivated.
    #[error("Credential revoked: {message}")]
    Revoked { message: String },

    /// The token lacks a scope the call needs.
    #[error("Missing required scope: {scope}")]
    MissingScope { scope: String },

    /// Rate limit exceeded and retries exhausted.
    #[error("Rate limit exceeded on {endpoint}")]
    RateLimited {
        endpoint: String,
        retry_after: Option<Duration>,
    },

    /// The provider answered with an error.
    #[error("API error on {endpoint}: {message}")]
    Api {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// Resource not found (channel, team, issue, etc.).
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Network or connection error.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The response body did not have the expected shape.
    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// Optional operation the provider does not implement.
    #[error("{platform} does not support {operation}")]
    Unsupported {
        platform: Platform,
        operation: &'static str,
    },

    /// Cancellation observed inside a provider's own pagination loop.
    #[error("Import cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Create an API error.
    #[inline]
    pub fn api(endpoint: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a network error.
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Wrap a failure observed while validating a connection.
    ///
    /// Only credential failures become `ConnectionInvalid`; transport,
    /// rate-limit and server errors pass through unchanged so a transient
    /// outage never condemns a good token. An error that already is
    /// `ConnectionInvalid` is returned unchanged.
    pub fn connection_invalid(message: impl Into<String>, source: ProviderError) -> Self {
        match source {
            already @ Self::ConnectionInvalid { .. } => already,
            credential @ (Self::Auth { .. }
            | Self::Revoked { .. }
            | Self::MissingScope { .. }
            | Self::Api {
                status: Some(401 | 403),
                ..
            }) => Self::ConnectionInvalid {
                message: message.into(),
                source: Some(Box::new(credential)),
            },
            other => other,
        }
    }

    /// The status a connection should move to after this error, if the
    /// error condemns the credential.
    pub fn connection_status(&self) -> Option<ConnectionStatus> {
        match self {
            Self::ConnectionInvalid { source, .. } => Some(
                source
                    .as_deref()
                    .and_then(Self::connection_status)
                    .unwrap_or(ConnectionStatus::Expired),
            ),
            Self::Revoked { .. } => Some(ConnectionStatus::Revoked),
            Self::MissingScope { .. } => Some(ConnectionStatus::Error),
            Self::Auth { .. }
            | Self::Api {
                status: Some(401 | 403),
                ..
            } => Some(ConnectionStatus::Expired),
            _ => None,
        }
    }

    /// Check if this error is a rate limit error.
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Check if this error means the credential itself is unusable.
    #[inline]
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionInvalid { .. }
                | Self::Auth { .. }
                | Self::Revoked { .. }
                | Self::MissingScope { .. }
        )
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl RetryClassify for ProviderError {
    fn error_tag(&self) -> Option<&'static str> {
        match self {
            Self::RateLimited { .. } => Some("rate_limited"),
            Self::Network { .. } => Some("network"),
            _ => None,
        }
    }

    fn http_status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Api { status, .. } => *status,
            Self::Auth { .. }
            | Self::Revoked { .. }
            | Self::MissingScope { .. }
            | Self::ConnectionInvalid { .. } => Some(401),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which keeps multi-line
/// provider bodies out of progress output and result lists.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
