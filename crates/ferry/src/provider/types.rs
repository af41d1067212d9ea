use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityKind, Platform};
use crate::import::ImportContext;

use super::errors::{ProviderError, Result};

/// Quota information reported by a provider.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Maximum requests allowed per period.
    pub limit: usize,
    /// Remaining requests in current period.
    pub remaining: usize,
    /// When the quota resets.
    pub reset_at: DateTime<Utc>,
    /// Explicit wait requested by the provider, if any.
    pub retry_after: Option<std::time::Duration>,
}

/// Workspace-level information returned during the metadata phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceMetadata {
    pub external_id: String,
    pub name: String,
    /// Free-form platform metadata.
    pub metadata: serde_json::Value,
}

/// A user on the external platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalUser {
    pub external_id: String,
    pub display_name: String,
    pub real_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub is_bot: bool,
}

/// A container (channel, team or project) normalized across platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalChannel {
    pub external_id: String,
    pub name: String,
    pub kind: EntityKind,
    pub description: Option<String>,
    pub is_private: bool,
    pub is_archived: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

/// A reference to a file attached to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalAttachment {
    pub external_id: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub url: Option<String>,
}

/// An item (message, issue, task or reply) normalized across platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalMessage {
    /// Stable across pages and runs.
    pub external_id: String,
    pub container_external_id: String,
    /// Set for thread replies, comments and sub-tasks.
    pub parent_external_id: Option<String>,
    pub author_external_id: Option<String>,
    pub kind: EntityKind,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    /// Known reply/comment count; `None` when the provider does not say.
    pub reply_count: Option<usize>,
    pub attachments: Vec<ExternalAttachment>,
    pub metadata: serde_json::Value,
}

impl ExternalMessage {
    #[inline]
    pub fn is_reply(&self) -> bool {
        self.parent_external_id.is_some()
    }

    /// Whether expansion could find replies for this item.
    #[inline]
    pub fn may_have_replies(&self) -> bool {
        self.reply_count != Some(0)
    }
}

/// One page of items for a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPage {
    pub items: Vec<ExternalMessage>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl ItemPage {
    /// A page continued by `next_cursor`, or the last page when it is `None`.
    pub fn new(items: Vec<ExternalMessage>, next_cursor: Option<String>) -> Self {
        let next_cursor = next_cursor.filter(|c| !c.is_empty());
        Self {
            items,
            has_more: next_cursor.is_some(),
            next_cursor,
        }
    }

    /// The only/last page.
    pub fn last(items: Vec<ExternalMessage>) -> Self {
        Self::new(items, None)
    }
}

/// Trait implemented by every import source.
///
/// # Implementation Notes
///
/// Implementors should:
/// - Paginate internally for users and containers, returning one aggregated list
/// - Keep wire envelopes private and convert errors to `ProviderError`
/// - Pace and retry their own outbound calls
/// - Poll `ctx.is_cancelled()` between pages of internal pagination loops
#[async_trait]
pub trait ImportProvider: Send + Sync {
    /// The platform this provider talks to.
    fn platform(&self) -> Platform;

    /// Perform one cheap authenticated call.
    ///
    /// Fails with `ProviderError::ConnectionInvalid` when the credential is bad
    /// or a required scope is missing.
    async fn validate_connection(&self, ctx: &ImportContext) -> Result<()>;

    /// External workspace id, display name and free-form metadata.
    async fn fetch_workspace_metadata(&self, ctx: &ImportContext) -> Result<WorkspaceMetadata>;

    /// All users of the workspace.
    async fn fetch_users(&self, ctx: &ImportContext) -> Result<Vec<ExternalUser>>;

    /// Containers, filtered to the run configuration's subset if one is set.
    async fn fetch_containers(&self, ctx: &ImportContext) -> Result<Vec<ExternalChannel>>;

    /// One page of items; `cursor = None` requests the first page.
    async fn fetch_items_page(
        &self,
        ctx: &ImportContext,
        container: &ExternalChannel,
        cursor: Option<&str>,
    ) -> Result<ItemPage>;

    /// Thread replies or comments of one item, parents before children.
    ///
    /// Providers without replies return an empty list.
    async fn fetch_replies(
        &self,
        _ctx: &ImportContext,
        _container: &ExternalChannel,
        _parent_external_id: &str,
    ) -> Result<Vec<ExternalMessage>> {
        Ok(Vec::new())
    }

    /// Raw bytes of an attachment.
    async fn download_attachment(
        &self,
        _ctx: &ImportContext,
        _attachment: &ExternalAttachment,
    ) -> Result<Vec<u8>> {
        Err(ProviderError::Unsupported {
            platform: self.platform(),
            operation: "attachment download",
        })
    }
}
