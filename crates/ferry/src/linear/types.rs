//! Linear GraphQL data types.
//!
//! API docs: https://developers.linear.app/docs/graphql/working-with-the-graphql-api

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// `{data, errors}` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<GraphQlErrorExtensions>,
}

impl GraphQlError {
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref().and_then(|e| e.code.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlErrorExtensions {
    pub code: Option<String>,
}

/// Relay-style connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub nodes: Vec<T>,
    pub page_info: Option<PageInfo>,
}

impl<T> Connection<T> {
    /// Cursor of the next page, if there is one.
    pub fn next_cursor(&self) -> Option<String> {
        self.page_info
            .as_ref()
            .filter(|p| p.has_next_page)
            .and_then(|p| p.end_cursor.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerData {
    pub viewer: LinearViewer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearViewer {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationData {
    pub organization: LinearOrganization,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearOrganization {
    pub id: String,
    pub name: String,
    pub url_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersData {
    pub users: Connection<LinearUser>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearUser {
    pub id: String,
    pub name: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamsData {
    pub teams: Connection<LinearTeam>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearTeam {
    pub id: String,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamIssuesData {
    pub team: Option<TeamIssues>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamIssues {
    pub issues: Connection<LinearIssue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearIssue {
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub priority: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub state: Option<LinearState>,
    pub creator: Option<NodeRef>,
    pub assignee: Option<NodeRef>,
    pub parent: Option<NodeRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearState {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentsData {
    pub issue: Option<IssueComments>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueComments {
    pub comments: Connection<LinearComment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearComment {
    pub id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub user: Option<NodeRef>,
    pub parent: Option<NodeRef>,
}
