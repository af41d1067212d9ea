//! Conversion from Linear payloads to normalized entities.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::types::{LinearComment, LinearIssue, LinearTeam, LinearUser};
use crate::entity::EntityKind;
use crate::import::ImportConfig;
use crate::provider::{ExternalChannel, ExternalMessage, ExternalUser};

/// Workflow state types hidden unless completed issues are requested.
pub const CLOSED_STATE_TYPES: &[&str] = &["completed", "canceled"];

/// Whether a team matches the configured subset by id, key or name.
pub fn team_matches(config: &ImportConfig, team: &LinearTeam) -> bool {
    config.matches_container(&team.id, &team.name) || config.matches_container(&team.id, &team.key)
}

/// Build the `IssueFilter` for a run.
pub fn issue_filter(config: &ImportConfig) -> Value {
    let mut filter = serde_json::Map::new();

    let mut created = serde_json::Map::new();
    if let Some(from) = config.date_from {
        created.insert("gte".to_string(), json!(to_rfc3339(from)));
    }
    if let Some(to) = config.date_to {
        created.insert("lte".to_string(), json!(to_rfc3339(to)));
    }
    if !created.is_empty() {
        filter.insert("createdAt".to_string(), Value::Object(created));
    }

    if !config.include_completed {
        filter.insert(
            "state".to_string(),
            json!({ "type": { "nin": CLOSED_STATE_TYPES } }),
        );
    }

    Value::Object(filter)
}

fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Message body of an issue: `"<identifier>: <title>"`, then the description.
pub fn issue_body(issue: &LinearIssue) -> String {
    let heading = format!("{}: {}", issue.identifier, issue.title);
    match issue.description.as_deref().map(str::trim) {
        Some(description) if !description.is_empty() => {
            format!("{}\n\n{}", heading, description)
        }
        _ => heading,
    }
}

pub fn to_external_user(user: &LinearUser) -> ExternalUser {
    let display_name = user
        .display_name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| user.name.clone());

    ExternalUser {
        external_id: user.id.clone(),
        display_name,
        real_name: Some(user.name.clone()),
        email: user.email.clone(),
        avatar_url: user.avatar_url.clone(),
        is_bot: false,
    }
}

pub fn to_external_channel(team: &LinearTeam) -> ExternalChannel {
    ExternalChannel {
        external_id: team.id.clone(),
        name: team.name.clone(),
        kind: EntityKind::Team,
        description: team.description.clone().filter(|d| !d.is_empty()),
        is_private: team.private,
        is_archived: team.archived_at.is_some(),
        created_at: team.created_at,
        metadata: json!({ "key": team.key }),
    }
}

pub fn to_external_issue(team_id: &str, issue: &LinearIssue) -> ExternalMessage {
    let edited_at = issue.updated_at.filter(|u| *u > issue.created_at);

    ExternalMessage {
        external_id: issue.id.clone(),
        container_external_id: team_id.to_string(),
        parent_external_id: issue.parent.as_ref().map(|p| p.id.clone()),
        author_external_id: issue.creator.as_ref().map(|c| c.id.clone()),
        kind: EntityKind::Issue,
        body: issue_body(issue),
        created_at: issue.created_at,
        edited_at,
        reply_count: None,
        attachments: Vec::new(),
        metadata: json!({
            "identifier": issue.identifier,
            "url": issue.url,
            "priority": issue.priority,
            "state": issue.state.as_ref().map(|s| &s.name),
            "state_type": issue.state.as_ref().map(|s| &s.kind),
            "assignee_id": issue.assignee.as_ref().map(|a| &a.id),
            "archived": issue.archived_at.is_some(),
        }),
    }
}

/// Convert a comment; top-level comments hang off the issue.
pub fn to_external_comment(
    team_id: &str,
    issue_id: &str,
    comment: &LinearComment,
) -> ExternalMessage {
    let parent = comment
        .parent
        .as_ref()
        .map_or_else(|| issue_id.to_string(), |p| p.id.clone());

    ExternalMessage {
        external_id: comment.id.clone(),
        container_external_id: team_id.to_string(),
        parent_external_id: Some(parent),
        author_external_id: comment.user.as_ref().map(|u| u.id.clone()),
        kind: EntityKind::Comment,
        body: comment.body.clone(),
        created_at: comment.created_at,
        edited_at: comment.edited_at,
        reply_count: Some(0),
        attachments: Vec::new(),
        metadata: json!({ "issue_id": issue_id }),
    }
}
