//! Slack Web API data types.
//!
//! Only the fields the import needs are declared, which keeps decoding
//! resilient to additions on Slack's side.
//!
//! API docs: https://api.slack.com/methods

use serde::Deserialize;

/// Envelope shared by every Web API response.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackEnvelope {
    pub ok: bool,
    pub error: Option<String>,
    /// Scope required by the call when `error == "missing_scope"`.
    pub needed: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl ResponseMetadata {
    /// Next cursor, with Slack's empty-string terminator normalized to `None`.
    pub fn cursor(&self) -> Option<String> {
        self.next_cursor.clone().filter(|c| !c.is_empty())
    }
}

/// `auth.test`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTestResponse {
    pub team_id: String,
    pub team: Option<String>,
    pub user_id: Option<String>,
    pub url: Option<String>,
}

/// `team.info`
#[derive(Debug, Clone, Deserialize)]
pub struct TeamInfoResponse {
    pub team: SlackTeam,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackTeam {
    pub id: String,
    pub name: String,
    pub domain: Option<String>,
    pub email_domain: Option<String>,
}

/// `users.list`
#[derive(Debug, Clone, Deserialize)]
pub struct UsersListResponse {
    #[serde(default)]
    pub members: Vec<SlackUser>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
    pub real_name: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub profile: SlackProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackProfile {
    pub display_name: Option<String>,
    pub real_name: Option<String>,
    pub email: Option<String>,
    pub image_72: Option<String>,
}

/// `conversations.list`
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationsListResponse {
    #[serde(default)]
    pub channels: Vec<SlackChannel>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackChannel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_archived: bool,
    /// Unix seconds.
    pub created: Option<i64>,
    pub topic: Option<SlackTextField>,
    pub purpose: Option<SlackTextField>,
    pub num_members: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackTextField {
    pub value: String,
}

/// `conversations.history` and `conversations.replies`
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub messages: Vec<SlackMessage>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackMessage {
    pub ts: String,
    pub user: Option<String>,
    pub bot_id: Option<String>,
    #[serde(default)]
    pub text: String,
    pub subtype: Option<String>,
    pub thread_ts: Option<String>,
    pub reply_count: Option<usize>,
    pub edited: Option<SlackEdited>,
    #[serde(default)]
    pub files: Vec<SlackFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackEdited {
    pub ts: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackFile {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub mimetype: Option<String>,
    pub size: Option<u64>,
    pub url_private: Option<String>,
}
