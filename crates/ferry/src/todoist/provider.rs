//! [`ImportProvider`] implementation for Todoist.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::client::{COMPLETED_LIMIT, TodoistClient};
use super::convert::{
    order_parents_first, to_external_channel, to_external_comment, to_external_completed_task,
    to_external_task, to_external_user,
};
use super::error::TodoistError;
use crate::entity::{ImportConnection, Platform};
use crate::http::HttpTransport;
use crate::import::ImportContext;
use crate::provider::{
    AdaptiveRateLimiter, ExternalChannel, ExternalMessage, ExternalUser, ImportProvider, ItemPage,
    ProviderError, Result, WorkspaceMetadata,
};
use crate::retry::{RetryObserver, RetryPolicy, with_retry};

/// Workspace id used when the connection carries no team id.
pub const PERSONAL_WORKSPACE: &str = "personal";

/// Todoist task-tracker provider.
pub struct TodoistProvider {
    client: TodoistClient,
    retry_policy: RetryPolicy,
    retry_observer: Option<Arc<RetryObserver>>,
}

impl TodoistProvider {
    pub fn new(token: &str) -> std::result::Result<Self, TodoistError> {
        let limiter = AdaptiveRateLimiter::for_platform(Platform::Todoist);
        Ok(Self::from_client(TodoistClient::new(token, Some(limiter))?))
    }

    /// Create a provider for a Todoist connection.
    pub fn from_connection(
        connection: &ImportConnection,
    ) -> std::result::Result<Self, TodoistError> {
        if connection.platform != Platform::Todoist {
            return Err(TodoistError::Config(format!(
                "connection {} is for {}, not todoist",
                connection.id, connection.platform
            )));
        }
        Self::new(&connection.access_token)
    }

    pub fn new_with_transport(
        rest_base: &str,
        sync_base: &str,
        token: &str,
        rate_limiter: Option<AdaptiveRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self::from_client(TodoistClient::new_with_transport(
            rest_base,
            sync_base,
            token,
            rate_limiter,
            transport,
        ))
    }

    fn from_client(client: TodoistClient) -> Self {
        Self {
            client,
            retry_policy: RetryPolicy::for_platform(Platform::Todoist),
            retry_observer: None,
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    #[must_use]
    pub fn with_retry_observer(mut self, observer: RetryObserver) -> Self {
        self.retry_observer = Some(Arc::new(observer));
        self
    }

    async fn retry<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, TodoistError>>,
    {
        with_retry(
            || {
                let fut = op();
                async move { fut.await.map_err(ProviderError::from) }
            },
            &self.retry_policy,
            label,
            self.retry_observer.as_deref(),
        )
        .await
    }
}

#[async_trait]
impl ImportProvider for TodoistProvider {
    fn platform(&self) -> Platform {
        Platform::Todoist
    }

    async fn validate_connection(&self, ctx: &ImportContext) -> Result<()> {
        ctx.ensure_active()?;
        let projects = self
            .retry("projects", || self.client.projects())
            .await
            .map_err(|e| ProviderError::connection_invalid("Todoist project listing failed", e))?;

        tracing::debug!(projects = projects.len(), "Todoist connection valid");
        Ok(())
    }

    async fn fetch_workspace_metadata(&self, ctx: &ImportContext) -> Result<WorkspaceMetadata> {
        ctx.ensure_active()?;
        let external_id = ctx
            .connection()
            .team_id
            .clone()
            .unwrap_or_else(|| PERSONAL_WORKSPACE.to_string());
        let name = if external_id == PERSONAL_WORKSPACE {
            "Personal".to_string()
        } else {
            format!("Todoist workspace {}", external_id)
        };
        Ok(WorkspaceMetadata {
            external_id,
            name,
            metadata: serde_json::json!({}),
        })
    }

    async fn fetch_users(&self, ctx: &ImportContext) -> Result<Vec<ExternalUser>> {
        ctx.ensure_active()?;
        let projects = self.retry("projects", || self.client.projects()).await?;

        let mut seen = HashSet::new();
        let mut users = Vec::new();
        for project in projects.iter().filter(|p| p.is_shared) {
            ctx.ensure_active()?;
            let collaborators = self
                .retry("projects.collaborators", || {
                    self.client.collaborators(&project.id)
                })
                .await?;
            users.extend(
                collaborators
                    .iter()
                    .filter(|c| seen.insert(c.id.clone()))
                    .map(to_external_user),
            );
        }

        tracing::debug!(count = users.len(), "Fetched Todoist collaborators");
        Ok(users)
    }

    async fn fetch_containers(&self, ctx: &ImportContext) -> Result<Vec<ExternalChannel>> {
        ctx.ensure_active()?;
        let config = ctx.config();
        let projects = self.retry("projects", || self.client.projects()).await?;

        Ok(projects
            .iter()
            .filter(|p| config.matches_container(&p.id, &p.name))
            .map(to_external_channel)
            .collect())
    }

    async fn fetch_items_page(
        &self,
        ctx: &ImportContext,
        container: &ExternalChannel,
        _cursor: Option<&str>,
    ) -> Result<ItemPage> {
        ctx.ensure_active()?;
        let project_id = container.external_id.as_str();

        let tasks = self
            .retry("tasks", || self.client.tasks(project_id))
            .await?;
        let mut items: Vec<ExternalMessage> = tasks.iter().map(to_external_task).collect();

        if ctx.config().include_completed {
            let mut seen: HashSet<String> = items.iter().map(|i| i.external_id.clone()).collect();
            let mut offset = 0;
            loop {
                ctx.ensure_active()?;
                let completed = self
                    .retry("completed.get_all", || {
                        self.client.completed_tasks(project_id, offset)
                    })
                    .await?;
                let fetched = completed.items.len();
                for task in &completed.items {
                    if seen.insert(task.task_id.clone()) {
                        items.push(to_external_completed_task(task));
                    }
                }
                if fetched < COMPLETED_LIMIT as usize {
                    break;
                }
                offset += fetched;
            }
        }

        Ok(ItemPage::last(order_parents_first(items)))
    }

    async fn fetch_replies(
        &self,
        ctx: &ImportContext,
        container: &ExternalChannel,
        parent_external_id: &str,
    ) -> Result<Vec<ExternalMessage>> {
        if !ctx.config().include_comments {
            return Ok(Vec::new());
        }
        ctx.ensure_active()?;

        let comments = self
            .retry("comments", || self.client.comments(parent_external_id))
            .await?;
        Ok(comments
            .iter()
            .map(|c| to_external_comment(&container.external_id, parent_external_id, c))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, HttpResponse, MockTransport, header_get, json_response};
    use crate::import::{ImportConfig, test_context};
    use serde_json::json;

    const REST: &str = "https://todoist.test/rest/v2";
    const SYNC: &str = "https://todoist.test/sync/v9";

    fn provider(transport: &MockTransport) -> TodoistProvider {
        TodoistProvider::new_with_transport(REST, SYNC, "td-token", None, Arc::new(transport.clone()))
    }

    fn ctx(config: ImportConfig) -> ImportContext {
        test_context(ImportConnection::new(Platform::Todoist, "td-token"), config)
    }

    fn project() -> ExternalChannel {
        ExternalChannel {
            external_id: "p1".to_string(),
            name: "Inbox".to_string(),
            kind: crate::entity::EntityKind::Project,
            description: None,
            is_private: true,
            is_archived: false,
            created_at: None,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn validate_connection_lists_projects_with_bearer_token() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{}/projects", REST),
            json_response(200, json!([{"id": "p1", "name": "Inbox"}])),
        );

        provider(&transport)
            .validate_connection(&ctx(ImportConfig::default()))
            .await
            .expect("valid");
        assert_eq!(
            header_get(&transport.requests()[0].headers, "authorization"),
            Some("Bearer td-token")
        );
    }

    #[tokio::test]
    async fn validate_connection_keeps_network_failures_transient() {
        let transport = MockTransport::new();
        transport.push_error(
            HttpMethod::Get,
            format!("{}/projects", REST),
            crate::http::HttpError::Transport("connection reset".to_string()),
        );

        let err = provider(&transport)
            .with_retry_policy(RetryPolicy::new(
                1,
                std::time::Duration::from_millis(1),
                std::time::Duration::from_millis(1),
            ))
            .validate_connection(&ctx(ImportConfig::default()))
            .await
            .expect_err("network failure");
        assert!(matches!(err, ProviderError::Network { .. }));
        assert!(!err.is_auth_failure());
    }

    #[tokio::test]
    async fn validate_connection_fails_on_401() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{}/projects", REST),
            HttpResponse {
                status: 401,
                headers: Vec::new(),
                body: b"Forbidden".to_vec(),
            },
        );

        let err = provider(&transport)
            .validate_connection(&ctx(ImportConfig::default()))
            .await
            .expect_err("unauthorized");
        assert!(matches!(err, ProviderError::ConnectionInvalid { .. }));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn fetch_workspace_metadata_defaults_to_personal() {
        let transport = MockTransport::new();
        let meta = provider(&transport)
            .fetch_workspace_metadata(&ctx(ImportConfig::default()))
            .await
            .expect("metadata");
        assert_eq!(meta.external_id, PERSONAL_WORKSPACE);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn fetch_users_dedupes_collaborators_of_shared_projects() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{}/projects", REST),
            json_response(200, json!([
                {"id": "p1", "name": "Inbox", "is_shared": false},
                {"id": "p2", "name": "Team", "is_shared": true},
                {"id": "p3", "name": "Launch", "is_shared": true}
            ])),
        );
        transport.push_response(
            HttpMethod::Get,
            format!("{}/projects/p2/collaborators", REST),
            json_response(200, json!([
                {"id": "u1", "name": "Ada", "email": "ada@example.com"},
                {"id": "u2", "name": "Grace"}
            ])),
        );
        transport.push_response(
            HttpMethod::Get,
            format!("{}/projects/p3/collaborators", REST),
            json_response(200, json!([{"id": "u1", "name": "Ada"}])),
        );

        let users = provider(&transport)
            .fetch_users(&ctx(ImportConfig::default()))
            .await
            .expect("users");
        let ids: Vec<_> = users.iter().map(|u| u.external_id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2"]);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn fetch_items_page_orders_subtasks_and_appends_completed() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{}/tasks?project_id=p1", REST),
            json_response(200, json!([
                {"id": "t2", "project_id": "p1", "content": "Subtask", "parent_id": "t1", "created_at": "2024-05-01T10:00:00Z"},
                {"id": "t1", "project_id": "p1", "content": "Parent", "comment_count": 2, "created_at": "2024-05-01T09:00:00Z"}
            ])),
        );
        transport.push_response(
            HttpMethod::Get,
            format!("{}/completed/get_all?project_id=p1&limit=200&offset=0", SYNC),
            json_response(200, json!({"items": [
                {"id": "r1", "task_id": "t0", "project_id": "p1", "content": "Done", "completed_at": "2024-04-30T12:00:00Z"}
            ]})),
        );

        let config = ImportConfig {
            include_completed: true,
            ..Default::default()
        };
        let page = provider(&transport)
            .fetch_items_page(&ctx(config), &project(), None)
            .await
            .expect("page");

        let ids: Vec<_> = page.items.iter().map(|i| i.external_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t0"]);
        assert!(!page.has_more);
        assert_eq!(page.items[0].reply_count, Some(2));
        assert_eq!(page.items[2].metadata["completed"], true);
    }

    #[tokio::test]
    async fn fetch_items_page_pages_through_completed_tasks() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{}/tasks?project_id=p1", REST),
            json_response(200, json!([])),
        );
        let full: Vec<serde_json::Value> = (0..200)
            .map(|n| {
                json!({
                    "id": format!("r{}", n),
                    "task_id": format!("t{}", n),
                    "project_id": "p1",
                    "content": "Done",
                    "completed_at": "2024-04-30T12:00:00Z"
                })
            })
            .collect();
        transport.push_response(
            HttpMethod::Get,
            format!("{}/completed/get_all?project_id=p1&limit=200&offset=0", SYNC),
            json_response(200, json!({ "items": full })),
        );
        transport.push_response(
            HttpMethod::Get,
            format!("{}/completed/get_all?project_id=p1&limit=200&offset=200", SYNC),
            json_response(200, json!({"items": [
                {"id": "r200", "task_id": "t200", "project_id": "p1", "content": "Last", "completed_at": "2024-04-30T13:00:00Z"}
            ]})),
        );

        let config = ImportConfig {
            include_completed: true,
            ..Default::default()
        };
        let page = provider(&transport)
            .fetch_items_page(&ctx(config), &project(), None)
            .await
            .expect("page");

        assert_eq!(page.items.len(), 201);
        assert!(page.items.iter().any(|i| i.external_id == "t200"));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn fetch_items_page_skips_completed_by_default() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{}/tasks?project_id=p1", REST),
            json_response(200, json!([])),
        );

        let page = provider(&transport)
            .fetch_items_page(&ctx(ImportConfig::default()), &project(), None)
            .await
            .expect("page");
        assert!(page.items.is_empty());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn fetch_replies_reads_task_comments() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{}/comments?task_id=t1", REST),
            json_response(200, json!([
                {"id": "n1", "task_id": "t1", "content": "On it", "posted_at": "2024-05-02T08:00:00Z"}
            ])),
        );

        let config = ImportConfig {
            include_comments: true,
            ..Default::default()
        };
        let replies = provider(&transport)
            .fetch_replies(&ctx(config), &project(), "t1")
            .await
            .expect("replies");
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].parent_external_id.as_deref(), Some("t1"));
        assert_eq!(replies[0].container_external_id, "p1");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_request_is_retried() {
        let transport = MockTransport::new();
        let url = format!("{}/projects", REST);
        transport.push_response(
            HttpMethod::Get,
            url.clone(),
            HttpResponse {
                status: 429,
                headers: vec![("Retry-After".to_string(), "3".to_string())],
                body: Vec::new(),
            },
        );
        transport.push_response(
            HttpMethod::Get,
            url,
            json_response(200, json!([{"id": "p1", "name": "Inbox"}])),
        );

        let containers = provider(&transport)
            .fetch_containers(&ctx(ImportConfig::default()))
            .await
            .expect("containers");
        assert_eq!(containers.len(), 1);
        assert_eq!(transport.requests().len(), 2);
    }
}
