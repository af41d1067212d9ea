//! Todoist REST v2 and Sync v9 payloads.
//!
//! API docs: https://developer.todoist.com/rest/v2/

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistProject {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub is_inbox_project: bool,
    #[serde(default)]
    pub is_favorite: bool,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistCollaborator {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistDue {
    pub date: String,
    pub string: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistTask {
    pub id: String,
    pub project_id: String,
    pub section_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub labels: Vec<String>,
    pub parent_id: Option<String>,
    pub priority: Option<u8>,
    pub due: Option<TodoistDue>,
    pub url: Option<String>,
    pub comment_count: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub creator_id: Option<String>,
    pub assignee_id: Option<String>,
}

/// `sync/v9/completed/get_all` response.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedTasksResponse {
    #[serde(default)]
    pub items: Vec<TodoistCompletedTask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistCompletedTask {
    /// Id of the completion record.
    pub id: String,
    /// Id of the completed task.
    pub task_id: String,
    pub project_id: String,
    pub content: String,
    pub completed_at: DateTime<Utc>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub note_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistComment {
    pub id: String,
    pub task_id: Option<String>,
    pub content: String,
    pub posted_at: DateTime<Utc>,
    pub attachment: Option<TodoistAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistAttachment {
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_url: Option<String>,
    pub resource_type: Option<String>,
}
