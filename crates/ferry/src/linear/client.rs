//! Linear GraphQL client.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::error::LinearError;
use super::queries;
use super::types::{
    GraphQlResponse, IssueCommentsData, OrganizationData, TeamIssuesData, TeamsData, UsersData,
    ViewerData,
};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::provider::{AdaptiveRateLimiter, RateLimitInfo};

/// Default Linear GraphQL endpoint.
pub const LINEAR_API_URL: &str = "https://api.linear.app/graphql";

/// Page size for user listing.
pub const USERS_PAGE_SIZE: u32 = 100;

/// Page size for team and issue listing.
pub const PAGE_SIZE: u32 = 50;

/// Page size for issue comments.
pub const COMMENTS_PAGE_SIZE: u32 = 100;

/// Parse Linear's request-quota headers.
///
/// `x-ratelimit-requests-reset` is a Unix timestamp in milliseconds.
pub fn parse_rate_limit_headers(response: &HttpResponse) -> Option<RateLimitInfo> {
    let limit = response
        .header("x-ratelimit-requests-limit")?
        .trim()
        .parse()
        .ok()?;
    let remaining = response
        .header("x-ratelimit-requests-remaining")?
        .trim()
        .parse()
        .ok()?;
    let reset_at = response
        .header("x-ratelimit-requests-reset")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    Some(RateLimitInfo {
        limit,
        remaining,
        reset_at,
        retry_after: response.retry_after(),
    })
}

/// Authorization header value for a token.
///
/// Personal API keys are sent as-is, OAuth access tokens as bearer tokens.
pub fn authorization_header(token: &str) -> String {
    if token.starts_with("lin_api_") {
        token.to_string()
    } else {
        format!("Bearer {}", token)
    }
}

/// Linear GraphQL API client.
#[derive(Clone)]
pub struct LinearClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    token: String,
    /// Optional adaptive rate limiter for pacing API requests.
    rate_limiter: Option<AdaptiveRateLimiter>,
}

impl LinearClient {
    /// Create a client talking to api.linear.app.
    pub fn new(token: &str, rate_limiter: Option<AdaptiveRateLimiter>) -> Result<Self, LinearError> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(30))
            .map_err(|e| LinearError::Config(e.to_string()))?;

        Ok(Self::new_with_transport(
            LINEAR_API_URL,
            token,
            rate_limiter,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        endpoint: &str,
        token: &str,
        rate_limiter: Option<AdaptiveRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.to_string(),
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

    /// Execute a query and decode its `data`.
    async fn query<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        document: &str,
        variables: Value,
    ) -> Result<T, LinearError> {
        self.wait_for_rate_limit().await;

        let body = json!({ "query": document, "variables": variables });
        let body = serde_json::to_vec(&body).map_err(|source| LinearError::Json {
            operation,
            source,
        })?;
        let request = HttpRequest::post(self.endpoint.clone(), body)
            .header("Authorization", authorization_header(&self.token))
            .header("Content-Type", "application/json")
            .header("User-Agent", "ferry");

        let response = self.transport.send(request).await?;

        if response.status == 429 {
            let retry_after = response.retry_after();
            if let Some(ref limiter) = self.rate_limiter {
                limiter.record_rate_limit(retry_after);
            }
            return Err(LinearError::RateLimited {
                operation,
                retry_after,
            });
        }

        let json_err = |source| LinearError::Json { operation, source };

        // Linear reports GraphQL errors with 400 as well as 200.
        let parsed = serde_json::from_slice::<GraphQlResponse<Value>>(&response.body);
        if let Ok(envelope) = &parsed
            && !envelope.errors.is_empty()
        {
            let err = LinearError::from_graphql(operation, &envelope.errors);
            if let Some(ref limiter) = self.rate_limiter
                && matches!(err, LinearError::RateLimited { .. })
            {
                limiter.record_rate_limit(response.retry_after());
            }
            return Err(err);
        }

        if !response.is_success() {
            if response.status >= 500
                && let Some(ref limiter) = self.rate_limiter
            {
                limiter.record_server_error();
            }
            return Err(LinearError::Status {
                operation,
                status: response.status,
                message: response.text(),
            });
        }

        if let Some(ref limiter) = self.rate_limiter {
            limiter.record_success(parse_rate_limit_headers(&response).as_ref());
        }

        let data = parsed
            .map_err(json_err)?
            .data
            .ok_or_else(|| LinearError::GraphQl {
                operation,
                code: None,
                message: "response has no data".to_string(),
            })?;
        serde_json::from_value(data).map_err(json_err)
    }

    pub async fn viewer(&self) -> Result<ViewerData, LinearError> {
        self.query("Viewer", queries::VIEWER, json!({})).await
    }

    pub async fn organization(&self) -> Result<OrganizationData, LinearError> {
        self.query("Organization", queries::ORGANIZATION, json!({}))
            .await
    }

    pub async fn users(&self, after: Option<&str>) -> Result<UsersData, LinearError> {
        self.query(
            "Users",
            queries::USERS,
            json!({ "first": USERS_PAGE_SIZE, "after": after }),
        )
        .await
    }

    pub async fn teams(&self, after: Option<&str>) -> Result<TeamsData, LinearError> {
        self.query(
            "Teams",
            queries::TEAMS,
            json!({ "first": PAGE_SIZE, "after": after }),
        )
        .await
    }

    /// One page of a team's issues, oldest first.
    pub async fn team_issues(
        &self,
        team_id: &str,
        after: Option<&str>,
        filter: &Value,
        include_archived: bool,
    ) -> Result<TeamIssuesData, LinearError> {
        self.query(
            "TeamIssues",
            queries::TEAM_ISSUES,
            json!({
                "teamId": team_id,
                "first": PAGE_SIZE,
                "after": after,
                "filter": filter,
                "includeArchived": include_archived,
            }),
        )
        .await
    }

    pub async fn issue_comments(&self, issue_id: &str) -> Result<IssueCommentsData, LinearError> {
        self.query(
            "IssueComments",
            queries::ISSUE_COMMENTS,
            json!({ "issueId": issue_id, "first": COMMENTS_PAGE_SIZE }),
        )
        .await
    }
}
