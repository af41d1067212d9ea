//! Todoist REST client.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde::de::DeserializeOwned;

use super::error::TodoistError;
use super::types::{
    CompletedTasksResponse, TodoistCollaborator, TodoistComment, TodoistProject, TodoistTask,
};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpRequest, HttpTransport, form_encode};
use crate::provider::AdaptiveRateLimiter;

/// Default REST v2 base URL.
pub const TODOIST_REST_BASE: &str = "https://api.todoist.com/rest/v2";

/// Default Sync v9 base URL, used for completed tasks.
pub const TODOIST_SYNC_BASE: &str = "https://api.todoist.com/sync/v9";

/// Completed tasks requested per call; a shorter page is the last one.
pub const COMPLETED_LIMIT: u32 = 200;

/// Todoist API client.
#[derive(Clone)]
pub struct TodoistClient {
    transport: Arc<dyn HttpTransport>,
    rest_base: String,
    sync_base: String,
    token: String,
    /// Optional adaptive rate limiter for pacing API requests.
    rate_limiter: Option<AdaptiveRateLimiter>,
}

impl TodoistClient {
    /// Create a client talking to api.todoist.com.
    pub fn new(token: &str, rate_limiter: Option<AdaptiveRateLimiter>) -> Result<Self, TodoistError> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(30))
            .map_err(|e| TodoistError::Config(e.to_string()))?;

        Ok(Self::new_with_transport(
            TODOIST_REST_BASE,
            TODOIST_SYNC_BASE,
            token,
            rate_limiter,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        rest_base: &str,
        sync_base: &str,
        token: &str,
        rate_limiter: Option<AdaptiveRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            rest_base: rest_base.trim_end_matches('/').to_string(),
            sync_base: sync_base.trim_end_matches('/').to_string(),
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

    async fn get<T: DeserializeOwned>(
        &self,
        base: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, TodoistError> {
        self.wait_for_rate_limit().await;

        let url = if params.is_empty() {
            format!("{}{}", base, path)
        } else {
            format!("{}{}?{}", base, path, form_encode(params))
        };
        let request = HttpRequest::get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .header("User-Agent", "ferry");

        let response = self.transport.send(request).await?;

        if response.status == 429 {
            let retry_after = response.retry_after();
            if let Some(ref limiter) = self.rate_limiter {
                limiter.record_rate_limit(retry_after);
            }
            return Err(TodoistError::RateLimited {
                path: path.to_string(),
                retry_after,
            });
        }

        if !response.is_success() {
            if response.status >= 500
                && let Some(ref limiter) = self.rate_limiter
            {
                limiter.record_server_error();
            }
            return Err(TodoistError::from_status(
                path,
                response.status,
                response.text(),
            ));
        }

        if let Some(ref limiter) = self.rate_limiter {
            limiter.record_success(None);
        }

        serde_json::from_slice(&response.body).map_err(|source| TodoistError::Json {
            path: path.to_string(),
            source,
        })
    }

    pub async fn projects(&self) -> Result<Vec<TodoistProject>, TodoistError> {
        self.get(&self.rest_base, "/projects", &[]).await
    }

    pub async fn collaborators(
        &self,
        project_id: &str,
    ) -> Result<Vec<TodoistCollaborator>, TodoistError> {
        let path = format!("/projects/{}/collaborators", project_id);
        self.get(&self.rest_base, &path, &[]).await
    }

    /// Active tasks of a project.
    pub async fn tasks(&self, project_id: &str) -> Result<Vec<TodoistTask>, TodoistError> {
        self.get(
            &self.rest_base,
            "/tasks",
            &[("project_id", project_id.to_string())],
        )
        .await
    }

    /// One page of completed tasks, starting `offset` records in.
    pub async fn completed_tasks(
        &self,
        project_id: &str,
        offset: usize,
    ) -> Result<CompletedTasksResponse, TodoistError> {
        self.get(
            &self.sync_base,
            "/completed/get_all",
            &[
                ("project_id", project_id.to_string()),
                ("limit", COMPLETED_LIMIT.to_string()),
                ("offset", offset.to_string()),
            ],
        )
        .await
    }

    pub async fn comments(&self, task_id: &str) -> Result<Vec<TodoistComment>, TodoistError> {
        self.get(
            &self.rest_base,
            "/comments",
            &[("task_id", task_id.to_string())],
        )
        .await
    }
}
