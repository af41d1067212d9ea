//! Slack Web API client.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde::de::DeserializeOwned;

use super::error::SlackError;
use super::types::{
    AuthTestResponse, ConversationsListResponse, MessagesResponse, SlackEnvelope,
    TeamInfoResponse, UsersListResponse,
};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpRequest, HttpResponse, HttpTransport, form_encode};
use crate::provider::AdaptiveRateLimiter;

/// Default Slack Web API base URL.
pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Page size for list and history calls.
pub const PAGE_SIZE: u32 = 200;

/// Slack Web API client.
///
/// Every call is a form-encoded POST; the `ok` envelope is unwrapped here so
/// callers only see typed payloads or a [`SlackError`].
#[derive(Clone)]
pub struct SlackClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    token: String,
    /// Optional adaptive rate limiter for pacing API requests.
    rate_limiter: Option<AdaptiveRateLimiter>,
}

impl SlackClient {
    /// Create a client talking to slack.com.
    pub fn new(token: &str, rate_limiter: Option<AdaptiveRateLimiter>) -> Result<Self, SlackError> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(30))
            .map_err(|e| SlackError::Config(e.to_string()))?;

        Ok(Self::new_with_transport(
            SLACK_API_BASE,
            token,
            rate_limiter,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        base_url: &str,
        token: &str,
        rate_limiter: Option<AdaptiveRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            rate_limiter,
        }
    }

    /// Wait for rate limiter if one is configured.
    async fn wait_for_rate_limit(&self) {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }
    }

    /// Call a Web API method, returning the decoded payload and the response.
    async fn call_raw<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<(T, HttpResponse), SlackError> {
        self.wait_for_rate_limit().await;

        let url = format!("{}/{}", self.base_url, method);
        let request = HttpRequest::post(url, form_encode(params).into_bytes())
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("User-Agent", "ferry");

        let response = self.transport.send(request).await?;

        if response.status == 429 {
            let retry_after = response.retry_after();
            if let Some(ref limiter) = self.rate_limiter {
                limiter.record_rate_limit(retry_after);
            }
            return Err(SlackError::RateLimited {
                method: method.to_string(),
                retry_after,
            });
        }

        if !response.is_success() {
            if response.status >= 500
                && let Some(ref limiter) = self.rate_limiter
            {
                limiter.record_server_error();
            }
            return Err(SlackError::Status {
                method: method.to_string(),
                status: response.status,
                message: response.text(),
            });
        }

        let json_err = |source| SlackError::Json {
            method: method.to_string(),
            source,
        };
        let value: serde_json::Value = serde_json::from_slice(&response.body).map_err(json_err)?;
        let envelope: SlackEnvelope = serde_json::from_value(value.clone()).map_err(json_err)?;

        if !envelope.ok {
            let error = envelope.error.as_deref().unwrap_or("unknown_error");
            let err = SlackError::from_error_code(method, error, envelope.needed.as_deref());
            if let Some(ref limiter) = self.rate_limiter
                && matches!(err, SlackError::RateLimited { .. })
            {
                limiter.record_rate_limit(None);
            }
            return Err(err);
        }

        if let Some(ref limiter) = self.rate_limiter {
            limiter.record_success(None);
        }

        let data = serde_json::from_value(value).map_err(json_err)?;
        Ok((data, response))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, SlackError> {
        self.call_raw(method, params).await.map(|(data, _)| data)
    }

    /// `auth.test`, returning the granted scopes from `x-oauth-scopes` when sent.
    pub async fn auth_test(&self) -> Result<(AuthTestResponse, Option<Vec<String>>), SlackError> {
        let (auth, response) = self.call_raw::<AuthTestResponse>("auth.test", &[]).await?;
        let scopes = response.header("x-oauth-scopes").map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });
        Ok((auth, scopes))
    }

    pub async fn team_info(&self) -> Result<TeamInfoResponse, SlackError> {
        self.call("team.info", &[]).await
    }

    pub async fn users_list(&self, cursor: Option<&str>) -> Result<UsersListResponse, SlackError> {
        let mut params = vec![("limit", PAGE_SIZE.to_string())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        self.call("users.list", &params).await
    }

    pub async fn conversations_list(
        &self,
        cursor: Option<&str>,
        include_archived: bool,
    ) -> Result<ConversationsListResponse, SlackError> {
        let mut params = vec![
            ("types", "public_channel,private_channel".to_string()),
            ("exclude_archived", (!include_archived).to_string()),
            ("limit", PAGE_SIZE.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        self.call("conversations.list", &params).await
    }

    /// `conversations.history`; `oldest`/`latest` are Slack timestamps.
    pub async fn conversations_history(
        &self,
        channel: &str,
        cursor: Option<&str>,
        oldest: Option<String>,
        latest: Option<String>,
    ) -> Result<MessagesResponse, SlackError> {
        let mut params = vec![
            ("channel", channel.to_string()),
            ("limit", PAGE_SIZE.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        let bounded = oldest.is_some() || latest.is_some();
        if let Some(oldest) = oldest {
            params.push(("oldest", oldest));
        }
        if let Some(latest) = latest {
            params.push(("latest", latest));
        }
        if bounded {
            params.push(("inclusive", "true".to_string()));
        }
        self.call("conversations.history", &params).await
    }

    pub async fn conversations_replies(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<MessagesResponse, SlackError> {
        let params = [
            ("channel", channel.to_string()),
            ("ts", thread_ts.to_string()),
            ("limit", PAGE_SIZE.to_string()),
        ];
        self.call("conversations.replies", &params).await
    }

    /// Download a private file URL with the bot token.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, SlackError> {
        self.wait_for_rate_limit().await;
        let request = HttpRequest::get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "ferry");
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(SlackError::Status {
                method: "files.download".to_string(),
                status: response.status,
                message: response.text(),
            });
        }
        Ok(response.body)
    }
}
