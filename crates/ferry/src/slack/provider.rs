//! [`ImportProvider`] implementation for Slack.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::client::SlackClient;
use super::convert::{
    datetime_to_ts, is_importable, to_external_channel, to_external_message, to_external_user,
    ts_from_external_id,
};
use super::error::SlackError;
use crate::entity::{ImportConnection, Platform};
use crate::http::HttpTransport;
use crate::import::ImportContext;
use crate::provider::{
    AdaptiveRateLimiter, ExternalAttachment, ExternalChannel, ExternalMessage, ExternalUser,
    ImportProvider, ItemPage, ProviderError, Result, WorkspaceMetadata,
};
use crate::retry::{RetryObserver, RetryPolicy, with_retry};

/// Scopes the import cannot work without.
pub const REQUIRED_SCOPES: &[&str] = &["channels:read", "channels:history", "users:read"];

/// Slack chat-platform provider.
pub struct SlackProvider {
    client: SlackClient,
    retry_policy: RetryPolicy,
    retry_observer: Option<Arc<RetryObserver>>,
}

impl SlackProvider {
    /// Create a provider for a bot or user token.
    pub fn new(token: &str) -> std::result::Result<Self, SlackError> {
        let limiter = AdaptiveRateLimiter::for_platform(Platform::Slack);
        Ok(Self::from_client(SlackClient::new(token, Some(limiter))?))
    }

    /// Create a provider for a Slack connection.
    pub fn from_connection(
        connection: &ImportConnection,
    ) -> std::result::Result<Self, SlackError> {
        if connection.platform != Platform::Slack {
            return Err(SlackError::Config(format!(
                "connection {} is for {}, not slack",
                connection.id, connection.platform
            )));
        }
        Self::new(&connection.access_token)
    }

    pub fn new_with_transport(
        base_url: &str,
        token: &str,
        rate_limiter: Option<AdaptiveRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self::from_client(SlackClient::new_with_transport(
            base_url,
            token,
            rate_limiter,
            transport,
        ))
    }

    fn from_client(client: SlackClient) -> Self {
        Self {
            client,
            retry_policy: RetryPolicy::for_platform(Platform::Slack),
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
        Fut: Future<Output = std::result::Result<T, SlackError>>,
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
impl ImportProvider for SlackProvider {
    fn platform(&self) -> Platform {
        Platform::Slack
    }

    async fn validate_connection(&self, ctx: &ImportContext) -> Result<()> {
        ctx.ensure_active()?;
        let (auth, scopes) = self
            .retry("auth.test", || self.client.auth_test())
            .await
            .map_err(|e| ProviderError::connection_invalid("Slack auth.test failed", e))?;

        let connection = ctx.connection();
        let missing = REQUIRED_SCOPES.iter().find(|required| match &scopes {
            Some(granted) => !granted.iter().any(|g| g == *required),
            None => !connection.has_scope(required),
        });
        if let Some(scope) = missing {
            return Err(ProviderError::connection_invalid(
                format!("Slack token lacks required scope {}", scope),
                ProviderError::MissingScope {
                    scope: scope.to_string(),
                },
            ));
        }

        tracing::debug!(team_id = %auth.team_id, team = ?auth.team, "Slack connection valid");
        Ok(())
    }

    async fn fetch_workspace_metadata(&self, ctx: &ImportContext) -> Result<WorkspaceMetadata> {
        ctx.ensure_active()?;
        let info = self
            .retry("team.info", || self.client.team_info())
            .await?;
        Ok(WorkspaceMetadata {
            external_id: info.team.id,
            name: info.team.name,
            metadata: serde_json::json!({
                "domain": info.team.domain,
                "email_domain": info.team.email_domain,
            }),
        })
    }

    async fn fetch_users(&self, ctx: &ImportContext) -> Result<Vec<ExternalUser>> {
        let mut users = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            ctx.ensure_active()?;
            let page = self
                .retry("users.list", || self.client.users_list(cursor.as_deref()))
                .await?;
            users.extend(
                page.members
                    .iter()
                    .filter(|u| !u.deleted)
                    .map(to_external_user),
            );

            match page.response_metadata.cursor() {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::debug!(count = users.len(), "Fetched Slack users");
        Ok(users)
    }

    async fn fetch_containers(&self, ctx: &ImportContext) -> Result<Vec<ExternalChannel>> {
        let config = ctx.config();
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            ctx.ensure_active()?;
            let page = self
                .retry("conversations.list", || {
                    self.client
                        .conversations_list(cursor.as_deref(), config.include_archived)
                })
                .await?;
            channels.extend(
                page.channels
                    .iter()
                    .filter(|c| config.matches_container(&c.id, &c.name))
                    .map(to_external_channel),
            );

            match page.response_metadata.cursor() {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(channels)
    }

    async fn fetch_items_page(
        &self,
        ctx: &ImportContext,
        container: &ExternalChannel,
        cursor: Option<&str>,
    ) -> Result<ItemPage> {
        ctx.ensure_active()?;
        let config = ctx.config();
        let channel = container.external_id.as_str();
        let oldest = config.date_from.map(datetime_to_ts);
        let latest = config.date_to.map(datetime_to_ts);

        let page = self
            .retry("conversations.history", || {
                self.client
                    .conversations_history(channel, cursor, oldest.clone(), latest.clone())
            })
            .await?;

        // Slack returns newest first; parents must precede their replies.
        let items = page
            .messages
            .iter()
            .rev()
            .filter(|m| is_importable(m))
            .filter_map(|m| to_external_message(channel, m))
            .collect();

        let next_cursor = if page.has_more {
            page.response_metadata.cursor()
        } else {
            None
        };
        Ok(ItemPage::new(items, next_cursor))
    }

    async fn fetch_replies(
        &self,
        ctx: &ImportContext,
        container: &ExternalChannel,
        parent_external_id: &str,
    ) -> Result<Vec<ExternalMessage>> {
        if !ctx.config().include_threads {
            return Ok(Vec::new());
        }
        ctx.ensure_active()?;
        let channel = container.external_id.as_str();
        let thread_ts = ts_from_external_id(parent_external_id);

        let page = self
            .retry("conversations.replies", || {
                self.client.conversations_replies(channel, thread_ts)
            })
            .await?;

        Ok(page
            .messages
            .iter()
            .filter(|m| m.ts != thread_ts && is_importable(m))
            .filter_map(|m| to_external_message(channel, m))
            .map(|mut m| {
                m.parent_external_id = Some(parent_external_id.to_string());
                m
            })
            .collect())
    }

    async fn download_attachment(
        &self,
        ctx: &ImportContext,
        attachment: &ExternalAttachment,
    ) -> Result<Vec<u8>> {
        ctx.ensure_active()?;
        let url = attachment
            .url
            .as_deref()
            .ok_or_else(|| ProviderError::not_found(format!("file {} url", attachment.external_id)))?;
        self.retry("files.download", || self.client.download(url))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, HttpResponse, MockTransport, json_response};
    use crate::import::{ImportConfig, test_context};
    use serde_json::json;

    const BASE: &str = "https://slack.test/api";

    fn provider(transport: &MockTransport) -> SlackProvider {
        SlackProvider::new_with_transport(BASE, "xoxb-test", None, Arc::new(transport.clone()))
    }

    fn ctx(config: ImportConfig) -> ImportContext {
        test_context(ImportConnection::new(Platform::Slack, "xoxb-test"), config)
    }

    fn url(method: &str) -> String {
        format!("{}/{}", BASE, method)
    }

    fn ok(body: serde_json::Value) -> HttpResponse {
        let mut body = body;
        body["ok"] = json!(true);
        json_response(200, body)
    }

    fn body_of(req: &crate::http::HttpRequest) -> String {
        String::from_utf8_lossy(&req.body).to_string()
    }

    #[tokio::test]
    async fn validate_connection_checks_granted_scopes() {
        let transport = MockTransport::new();
        let mut response = ok(json!({"team_id": "T1", "team": "Acme"}));
        response.headers.push((
            "x-oauth-scopes".to_string(),
            "channels:read,channels:history,users:read,files:read".to_string(),
        ));
        transport.push_response(HttpMethod::Post, url("auth.test"), response);

        provider(&transport)
            .validate_connection(&ctx(ImportConfig::default()))
            .await
            .expect("valid connection");

        let requests = transport.requests();
        assert_eq!(
            crate::http::header_get(&requests[0].headers, "authorization"),
            Some("Bearer xoxb-test")
        );
    }

    #[tokio::test]
    async fn validate_connection_fails_on_missing_scope() {
        let transport = MockTransport::new();
        let mut response = ok(json!({"team_id": "T1"}));
        response
            .headers
            .push(("x-oauth-scopes".to_string(), "channels:read".to_string()));
        transport.push_response(HttpMethod::Post, url("auth.test"), response);

        let err = provider(&transport)
            .validate_connection(&ctx(ImportConfig::default()))
            .await
            .expect_err("missing scope");
        assert!(matches!(err, ProviderError::ConnectionInvalid { .. }));
        assert!(err.to_string().contains("channels:history"));
    }

    #[tokio::test]
    async fn validate_connection_wraps_auth_failure_without_retrying() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            url("auth.test"),
            json_response(200, json!({"ok": false, "error": "invalid_auth"})),
        );

        let err = provider(&transport)
            .validate_connection(&ctx(ImportConfig::default()))
            .await
            .expect_err("invalid auth");
        assert!(matches!(err, ProviderError::ConnectionInvalid { source: Some(_), .. }));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn fetch_users_paginates_and_skips_deleted() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            url("users.list"),
            ok(json!({
                "members": [
                    {"id": "U1", "name": "ada", "profile": {"display_name": "Ada", "email": "ada@example.com"}},
                    {"id": "U2", "name": "gone", "deleted": true}
                ],
                "response_metadata": {"next_cursor": "dXNlcjpVMg=="}
            })),
        );
        transport.push_response(
            HttpMethod::Post,
            url("users.list"),
            ok(json!({
                "members": [{"id": "B1", "name": "deploybot", "is_bot": true}],
                "response_metadata": {"next_cursor": ""}
            })),
        );

        let users = provider(&transport)
            .fetch_users(&ctx(ImportConfig::default()))
            .await
            .expect("users");

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].display_name, "Ada");
        assert_eq!(users[0].email.as_deref(), Some("ada@example.com"));
        assert!(users[1].is_bot);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(body_of(&requests[1]).contains("cursor=dXNlcjpVMg%3D%3D"));
    }

    #[tokio::test]
    async fn fetch_containers_applies_filter_and_archive_flag() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            url("conversations.list"),
            ok(json!({
                "channels": [
                    {"id": "C1", "name": "general", "purpose": {"value": "Company-wide"}},
                    {"id": "C2", "name": "random"}
                ]
            })),
        );

        let config = ImportConfig {
            item_filter: Some(vec!["general".to_string()]),
            ..Default::default()
        };
        let channels = provider(&transport)
            .fetch_containers(&ctx(config))
            .await
            .expect("channels");

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].external_id, "C1");
        assert_eq!(channels[0].description.as_deref(), Some("Company-wide"));
        assert!(body_of(&transport.requests()[0]).contains("exclude_archived=true"));
    }

    #[tokio::test]
    async fn fetch_items_page_reverses_and_paginates() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            url("conversations.history"),
            ok(json!({
                "messages": [
                    {"ts": "3.000000", "user": "U1", "text": "reply", "thread_ts": "1.000000"},
                    {"ts": "2.000000", "user": "U2", "subtype": "channel_join", "text": "joined"},
                    {"ts": "1.000000", "user": "U1", "text": "parent", "thread_ts": "1.000000", "reply_count": 1}
                ],
                "has_more": true,
                "response_metadata": {"next_cursor": "bmV4dA=="}
            })),
        );

        let container = to_external_channel(&crate::slack::types::SlackChannel {
            id: "C1".to_string(),
            name: "general".to_string(),
            is_private: false,
            is_archived: false,
            created: None,
            topic: None,
            purpose: None,
            num_members: None,
        });
        let page = provider(&transport)
            .fetch_items_page(&ctx(ImportConfig::default()), &container, None)
            .await
            .expect("page");

        let ids: Vec<_> = page.items.iter().map(|m| m.external_id.as_str()).collect();
        assert_eq!(ids, vec!["C1:1.000000", "C1:3.000000"]);
        assert_eq!(page.items[1].parent_external_id.as_deref(), Some("C1:1.000000"));
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("bmV4dA=="));
        assert!(!body_of(&transport.requests()[0]).contains("oldest"));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_call_is_retried_after_retry_after() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            url("team.info"),
            HttpResponse {
                status: 429,
                headers: vec![("Retry-After".to_string(), "2".to_string())],
                body: Vec::new(),
            },
        );
        transport.push_response(
            HttpMethod::Post,
            url("team.info"),
            ok(json!({"team": {"id": "T1", "name": "Acme", "domain": "acme"}})),
        );

        let limiter = AdaptiveRateLimiter::new(crate::provider::LimiterConfig::default());
        let provider = SlackProvider::new_with_transport(
            BASE,
            "xoxb-test",
            Some(limiter.clone()),
            Arc::new(transport.clone()),
        );

        let meta = provider
            .fetch_workspace_metadata(&ctx(ImportConfig::default()))
            .await
            .expect("metadata");
        assert_eq!(meta.external_id, "T1");
        assert_eq!(meta.metadata["domain"], "acme");
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(limiter.current_delay(), std::time::Duration::ZERO);
    }

    #[tokio::test]
    async fn fetch_replies_excludes_parent_and_links_to_it() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            url("conversations.replies"),
            ok(json!({
                "messages": [
                    {"ts": "1.000000", "user": "U1", "text": "parent", "thread_ts": "1.000000", "reply_count": 2},
                    {"ts": "2.000000", "user": "U2", "text": "first", "thread_ts": "1.000000"},
                    {"ts": "3.000000", "user": "U1", "text": "second", "thread_ts": "1.000000"}
                ]
            })),
        );

        let container = ExternalChannel {
            external_id: "C1".to_string(),
            name: "general".to_string(),
            kind: crate::entity::EntityKind::Channel,
            description: None,
            is_private: false,
            is_archived: false,
            created_at: None,
            metadata: json!({}),
        };
        let config = ImportConfig {
            include_threads: true,
            ..Default::default()
        };
        let replies = provider(&transport)
            .fetch_replies(&ctx(config), &container, "C1:1.000000")
            .await
            .expect("replies");

        assert_eq!(replies.len(), 2);
        assert!(
            replies
                .iter()
                .all(|r| r.parent_external_id.as_deref() == Some("C1:1.000000"))
        );
        assert!(body_of(&transport.requests()[0]).contains("ts=1.000000"));
    }

    #[tokio::test]
    async fn cancelled_context_makes_no_calls() {
        let transport = MockTransport::new();
        let ctx = ImportContext::builder()
            .connection(ImportConnection::new(Platform::Slack, "xoxb-test"))
            .workspace_id(uuid::Uuid::new_v4())
            .owner_id(uuid::Uuid::new_v4())
            .store(Arc::new(crate::store::MemoryStore::new()))
            .cancel_check(|| true)
            .build()
            .unwrap_or_else(|e| panic!("{e}"));

        let err = provider(&transport)
            .fetch_users(&ctx)
            .await
            .expect_err("cancelled");
        assert!(err.is_cancelled());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn download_attachment_fetches_private_url_with_token() {
        let transport = MockTransport::new();
        let file_url = "https://files.slack.test/T1/F1/plan.pdf";
        transport.push_response(
            HttpMethod::Get,
            file_url,
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: b"%PDF".to_vec(),
            },
        );

        let attachment = ExternalAttachment {
            external_id: "F1".to_string(),
            name: "plan.pdf".to_string(),
            mime_type: Some("application/pdf".to_string()),
            size_bytes: Some(4),
            url: Some(file_url.to_string()),
        };
        let bytes = provider(&transport)
            .download_attachment(&ctx(ImportConfig::default()), &attachment)
            .await
            .expect("download");
        assert_eq!(bytes, b"%PDF".to_vec());

        let requests = transport.requests();
        assert_eq!(
            crate::http::header_get(&requests[0].headers, "authorization"),
            Some("Bearer xoxb-test")
        );

        let missing = ExternalAttachment {
            url: None,
            ..attachment
        };
        let err = provider(&transport)
            .download_attachment(&ctx(ImportConfig::default()), &missing)
            .await
            .expect_err("no url");
        assert!(matches!(err, ProviderError::NotFound { .. }));
    }
}
