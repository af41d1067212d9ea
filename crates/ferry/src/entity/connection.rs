//! An authorized connection to one external platform.
//!
//! Connections are created when an OAuth exchange completes (outside this
//! crate) and read by every import run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::platform::Platform;

/// Lifecycle status of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Active,
    Expired,
    Revoked,
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Active => write!(f, "active"),
            ConnectionStatus::Expired => write!(f, "expired"),
            ConnectionStatus::Revoked => write!(f, "revoked"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

/// Credentials and status for one platform connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct ImportConnection {
    pub id: Uuid,
    pub platform: Platform,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Scopes granted to the token.
    pub scope: Vec<String>,
    /// Provider-specific team/org id (Slack team, Linear org, Todoist workspace).
    pub team_id: Option<String>,
    pub status: ConnectionStatus,
}

impl std::fmt::Debug for ImportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportConnection")
            .field("id", &self.id)
            .field("platform", &self.platform)
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("team_id", &self.team_id)
            .field("status", &self.status)
            .finish()
    }
}

impl ImportConnection {
    /// Create an active connection with no expiry and no recorded scope.
    pub fn new(platform: Platform, access_token: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            platform,
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            scope: Vec::new(),
            team_id: None,
            status: ConnectionStatus::Active,
        }
    }

    #[must_use]
    pub fn with_team_id(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub fn with_scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = scope.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the token was granted `scope`.
    ///
    /// An empty scope list means the grant was not recorded; every scope is
    /// then assumed present and the provider's own validation decides.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.is_empty() || self.scope.iter().any(|s| s == scope)
    }

    /// Whether a run may start with this connection at `now`.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == ConnectionStatus::Active && self.expires_at.is_none_or(|exp| exp > now)
    }

    /// Mark the connection unusable after an auth failure.
    pub fn invalidate(&mut self, status: ConnectionStatus) {
        tracing::warn!(
            connection_id = %self.id,
            platform = %self.platform,
            status = %status,
            "Invalidating import connection"
        );
        self.status = status;
    }
}
