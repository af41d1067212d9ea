//! [`ImportProvider`] implementation for Linear.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::client::LinearClient;
use super::convert::{
    issue_filter, team_matches, to_external_channel, to_external_comment, to_external_issue,
    to_external_user,
};
use super::error::LinearError;
use crate::entity::{ImportConnection, Platform};
use crate::http::HttpTransport;
use crate::import::ImportContext;
use crate::provider::{
    AdaptiveRateLimiter, ExternalChannel, ExternalMessage, ExternalUser, ImportProvider, ItemPage,
    ProviderError, Result, WorkspaceMetadata,
};
use crate::retry::{RetryObserver, RetryPolicy, with_retry};

/// Linear issue-tracker provider.
pub struct LinearProvider {
    client: LinearClient,
    retry_policy: RetryPolicy,
    retry_observer: Option<Arc<RetryObserver>>,
}

impl LinearProvider {
    /// Create a provider for a personal API key or OAuth token.
    pub fn new(token: &str) -> std::result::Result<Self, LinearError> {
        let limiter = AdaptiveRateLimiter::for_platform(Platform::Linear);
        Ok(Self::from_client(LinearClient::new(token, Some(limiter))?))
    }

    /// Create a provider for a Linear connection.
    pub fn from_connection(
        connection: &ImportConnection,
    ) -> std::result::Result<Self, LinearError> {
        if connection.platform != Platform::Linear {
            return Err(LinearError::Config(format!(
                "connection {} is for {}, not linear",
                connection.id, connection.platform
            )));
        }
        Self::new(&connection.access_token)
    }

    pub fn new_with_transport(
        endpoint: &str,
        token: &str,
        rate_limiter: Option<AdaptiveRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self::from_client(LinearClient::new_with_transport(
            endpoint,
            token,
            rate_limiter,
            transport,
        ))
    }

    fn from_client(client: LinearClient) -> Self {
        Self {
            client,
            retry_policy: RetryPolicy::for_platform(Platform::Linear),
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
        Fut: Future<Output = std::result::Result<T, LinearError>>,
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
impl ImportProvider for LinearProvider {
    fn platform(&self) -> Platform {
        Platform::Linear
    }

    async fn validate_connection(&self, ctx: &ImportContext) -> Result<()> {
        ctx.ensure_active()?;
        let viewer = self
            .retry("viewer", || self.client.viewer())
            .await
            .map_err(|e| ProviderError::connection_invalid("Linear viewer query failed", e))?;

        tracing::debug!(viewer_id = %viewer.viewer.id, "Linear connection valid");
        Ok(())
    }

    async fn fetch_workspace_metadata(&self, ctx: &ImportContext) -> Result<WorkspaceMetadata> {
        ctx.ensure_active()?;
        let org = self
            .retry("organization", || self.client.organization())
            .await?
            .organization;
        Ok(WorkspaceMetadata {
            external_id: org.id,
            name: org.name,
            metadata: serde_json::json!({ "url_key": org.url_key }),
        })
    }

    async fn fetch_users(&self, ctx: &ImportContext) -> Result<Vec<ExternalUser>> {
        let mut users = Vec::new();
        let mut after: Option<String> = None;

        loop {
            ctx.ensure_active()?;
            let page = self
                .retry("users", || self.client.users(after.as_deref()))
                .await?
                .users;
            users.extend(page.nodes.iter().filter(|u| u.active).map(to_external_user));

            match page.next_cursor() {
                Some(next) => after = Some(next),
                None => break,
            }
        }

        tracing::debug!(count = users.len(), "Fetched Linear users");
        Ok(users)
    }

    async fn fetch_containers(&self, ctx: &ImportContext) -> Result<Vec<ExternalChannel>> {
        let config = ctx.config();
        let mut teams = Vec::new();
        let mut after: Option<String> = None;

        loop {
            ctx.ensure_active()?;
            let page = self
                .retry("teams", || self.client.teams(after.as_deref()))
                .await?
                .teams;
            teams.extend(
                page.nodes
                    .iter()
                    .filter(|t| config.include_archived || t.archived_at.is_none())
                    .filter(|t| team_matches(config, t))
                    .map(to_external_channel),
            );

            match page.next_cursor() {
                Some(next) => after = Some(next),
                None => break,
            }
        }

        Ok(teams)
    }

    async fn fetch_items_page(
        &self,
        ctx: &ImportContext,
        container: &ExternalChannel,
        cursor: Option<&str>,
    ) -> Result<ItemPage> {
        ctx.ensure_active()?;
        let config = ctx.config();
        let team_id = container.external_id.as_str();
        let filter = issue_filter(config);

        let data = self
            .retry("team.issues", || {
                self.client
                    .team_issues(team_id, cursor, &filter, config.include_archived)
            })
            .await?;
        let issues = data
            .team
            .ok_or_else(|| ProviderError::not_found(format!("team {}", team_id)))?
            .issues;

        let items = issues
            .nodes
            .iter()
            .map(|issue| to_external_issue(team_id, issue))
            .collect();
        Ok(ItemPage::new(items, issues.next_cursor()))
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

        let data = self
            .retry("issue.comments", || {
                self.client.issue_comments(parent_external_id)
            })
            .await?;
        let Some(issue) = data.issue else {
            return Err(ProviderError::not_found(format!(
                "issue {}",
                parent_external_id
            )));
        };

        let mut comments: Vec<_> = issue
            .comments
            .nodes
            .iter()
            .map(|c| to_external_comment(&container.external_id, parent_external_id, c))
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, HttpResponse, MockTransport, header_get, json_response};
    use crate::import::{ImportConfig, test_context};
    use serde_json::{Value, json};

    const ENDPOINT: &str = "https://linear.test/graphql";

    fn provider(transport: &MockTransport) -> LinearProvider {
        LinearProvider::new_with_transport(ENDPOINT, "lin_api_test", None, Arc::new(transport.clone()))
    }

    fn ctx(config: ImportConfig) -> ImportContext {
        test_context(ImportConnection::new(Platform::Linear, "lin_api_test"), config)
    }

    fn push(transport: &MockTransport, response: HttpResponse) {
        transport.push_response(HttpMethod::Post, ENDPOINT, response);
    }

    fn sent_body(transport: &MockTransport, index: usize) -> Value {
        serde_json::from_slice(&transport.requests()[index].body).expect("request body is JSON")
    }

    fn team() -> ExternalChannel {
        ExternalChannel {
            external_id: "team-1".to_string(),
            name: "Engineering".to_string(),
            kind: crate::entity::EntityKind::Team,
            description: None,
            is_private: false,
            is_archived: false,
            created_at: None,
            metadata: json!({ "key": "ENG" }),
        }
    }

    #[tokio::test]
    async fn validate_connection_sends_personal_key_raw() {
        let transport = MockTransport::new();
        push(&transport, json_response(200, json!({"data": {"viewer": {"id": "u1"}}})));

        provider(&transport)
            .validate_connection(&ctx(ImportConfig::default()))
            .await
            .expect("valid");

        let requests = transport.requests();
        assert_eq!(header_get(&requests[0].headers, "authorization"), Some("lin_api_test"));
        assert!(sent_body(&transport, 0)["query"]
            .as_str()
            .is_some_and(|q| q.contains("viewer")));
    }

    #[tokio::test]
    async fn validate_connection_maps_auth_error_on_http_400() {
        let transport = MockTransport::new();
        push(
            &transport,
            json_response(
                400,
                json!({"errors": [{"message": "Authentication required", "extensions": {"code": "AUTHENTICATION_ERROR"}}]}),
            ),
        );

        let err = provider(&transport)
            .validate_connection(&ctx(ImportConfig::default()))
            .await
            .expect_err("auth failure");
        assert!(matches!(err, ProviderError::ConnectionInvalid { source: Some(_), .. }));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn fetch_users_follows_page_info() {
        let transport = MockTransport::new();
        push(
            &transport,
            json_response(200, json!({"data": {"users": {
                "nodes": [{"id": "u1", "name": "Ada Lovelace", "displayName": "ada", "email": "ada@example.com", "active": true}],
                "pageInfo": {"hasNextPage": true, "endCursor": "c1"}
            }}})),
        );
        push(
            &transport,
            json_response(200, json!({"data": {"users": {
                "nodes": [
                    {"id": "u2", "name": "Grace", "active": true},
                    {"id": "u3", "name": "Suspended", "active": false}
                ],
                "pageInfo": {"hasNextPage": false, "endCursor": null}
            }}})),
        );

        let users = provider(&transport)
            .fetch_users(&ctx(ImportConfig::default()))
            .await
            .expect("users");

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].display_name, "ada");
        assert_eq!(users[1].display_name, "Grace");
        assert_eq!(sent_body(&transport, 1)["variables"]["after"], "c1");
    }

    #[tokio::test]
    async fn fetch_containers_filters_by_key() {
        let transport = MockTransport::new();
        push(
            &transport,
            json_response(200, json!({"data": {"teams": {
                "nodes": [
                    {"id": "team-1", "key": "ENG", "name": "Engineering"},
                    {"id": "team-2", "key": "OPS", "name": "Operations"}
                ],
                "pageInfo": {"hasNextPage": false}
            }}})),
        );

        let config = ImportConfig {
            item_filter: Some(vec!["ENG".to_string()]),
            ..Default::default()
        };
        let teams = provider(&transport)
            .fetch_containers(&ctx(config))
            .await
            .expect("teams");
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].external_id, "team-1");
        assert_eq!(teams[0].metadata["key"], "ENG");
    }

    #[tokio::test]
    async fn fetch_items_page_builds_filter_and_cursor() {
        let transport = MockTransport::new();
        push(
            &transport,
            json_response(200, json!({"data": {"team": {"issues": {
                "nodes": [
                    {"id": "i1", "identifier": "ENG-1", "title": "Parent", "createdAt": "2024-03-01T00:00:00.000Z"},
                    {"id": "i2", "identifier": "ENG-2", "title": "Child", "createdAt": "2024-03-02T00:00:00.000Z", "parent": {"id": "i1"}}
                ],
                "pageInfo": {"hasNextPage": true, "endCursor": "next"}
            }}}})),
        );

        let page = provider(&transport)
            .fetch_items_page(&ctx(ImportConfig::default()), &team(), Some("prev"))
            .await
            .expect("page");

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].body, "ENG-1: Parent");
        assert_eq!(page.items[1].parent_external_id.as_deref(), Some("i1"));
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("next"));

        let variables = &sent_body(&transport, 0)["variables"];
        assert_eq!(variables["teamId"], "team-1");
        assert_eq!(variables["after"], "prev");
        assert_eq!(variables["includeArchived"], false);
        assert_eq!(variables["filter"]["state"]["type"]["nin"], json!(["completed", "canceled"]));
    }

    #[tokio::test]
    async fn fetch_replies_requires_include_comments() {
        let transport = MockTransport::new();
        let replies = provider(&transport)
            .fetch_replies(&ctx(ImportConfig::default()), &team(), "i1")
            .await
            .expect("replies");
        assert!(replies.is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn fetch_replies_links_comments_to_issue_or_parent_comment() {
        let transport = MockTransport::new();
        push(
            &transport,
            json_response(200, json!({"data": {"issue": {"comments": {"nodes": [
                {"id": "c2", "body": "nested", "createdAt": "2024-03-03T00:00:00.000Z", "parent": {"id": "c1"}},
                {"id": "c1", "body": "top", "createdAt": "2024-03-02T00:00:00.000Z", "user": {"id": "u1"}}
            ]}}}})),
        );

        let config = ImportConfig {
            include_comments: true,
            ..Default::default()
        };
        let replies = provider(&transport)
            .fetch_replies(&ctx(config), &team(), "i1")
            .await
            .expect("replies");

        let ids: Vec<_> = replies.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(replies[0].parent_external_id.as_deref(), Some("i1"));
        assert_eq!(replies[1].parent_external_id.as_deref(), Some("c1"));
        assert_eq!(replies[0].author_external_id.as_deref(), Some("u1"));
    }

    #[tokio::test(start_paused = true)]
    async fn ratelimited_graphql_error_is_retried() {
        let transport = MockTransport::new();
        push(
            &transport,
            json_response(
                400,
                json!({"errors": [{"message": "Rate limit exceeded", "extensions": {"code": "RATELIMITED"}}]}),
            ),
        );
        let mut ok = json_response(200, json!({"data": {"organization": {"id": "org-1", "name": "Acme", "urlKey": "acme"}}}));
        ok.headers.push(("x-ratelimit-requests-limit".to_string(), "1500".to_string()));
        ok.headers.push(("x-ratelimit-requests-remaining".to_string(), "1498".to_string()));
        push(&transport, ok);

        let limiter = AdaptiveRateLimiter::new(crate::provider::LimiterConfig::default());
        let provider = LinearProvider::new_with_transport(
            ENDPOINT,
            "oauth-token",
            Some(limiter.clone()),
            Arc::new(transport.clone()),
        );

        let meta = provider
            .fetch_workspace_metadata(&ctx(ImportConfig::default()))
            .await
            .expect("metadata");
        assert_eq!(meta.external_id, "org-1");
        assert_eq!(meta.metadata["url_key"], "acme");
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(
            header_get(&transport.requests()[0].headers, "authorization"),
            Some("Bearer oauth-token")
        );
        assert_eq!(limiter.quota().map(|q| q.remaining), Some(1498));
    }
}
