//! Conversion from Todoist payloads to normalized entities.

use std::collections::{HashMap, HashSet};

use serde_json::json;

use super::types::{
    TodoistCollaborator, TodoistComment, TodoistCompletedTask, TodoistProject, TodoistTask,
};
use crate::entity::EntityKind;
use crate::provider::{ExternalAttachment, ExternalChannel, ExternalMessage, ExternalUser};

pub fn to_external_user(collaborator: &TodoistCollaborator) -> ExternalUser {
    ExternalUser {
        external_id: collaborator.id.clone(),
        display_name: collaborator.name.clone(),
        real_name: Some(collaborator.name.clone()),
        email: collaborator.email.clone(),
        avatar_url: None,
        is_bot: false,
    }
}

pub fn to_external_channel(project: &TodoistProject) -> ExternalChannel {
    ExternalChannel {
        external_id: project.id.clone(),
        name: project.name.clone(),
        kind: EntityKind::Project,
        description: None,
        is_private: !project.is_shared,
        is_archived: false,
        created_at: None,
        metadata: json!({
            "color": project.color,
            "parent_id": project.parent_id,
            "is_inbox_project": project.is_inbox_project,
            "is_favorite": project.is_favorite,
            "url": project.url,
        }),
    }
}

/// Task content, then the description when present.
fn task_body(content: &str, description: &str) -> String {
    let description = description.trim();
    if description.is_empty() {
        content.to_string()
    } else {
        format!("{}\n\n{}", content, description)
    }
}

pub fn to_external_task(task: &TodoistTask) -> ExternalMessage {
    ExternalMessage {
        external_id: task.id.clone(),
        container_external_id: task.project_id.clone(),
        parent_external_id: task.parent_id.clone(),
        author_external_id: task.creator_id.clone(),
        kind: EntityKind::Task,
        body: task_body(&task.content, &task.description),
        created_at: task.created_at,
        edited_at: None,
        reply_count: task.comment_count,
        attachments: Vec::new(),
        metadata: json!({
            "completed": task.is_completed,
            "priority": task.priority,
            "labels": task.labels,
            "section_id": task.section_id,
            "assignee_id": task.assignee_id,
            "due": task.due.as_ref().map(|d| json!({
                "date": d.date,
                "string": d.string,
                "is_recurring": d.is_recurring,
            })),
            "url": task.url,
        }),
    }
}

/// Completed tasks carry no creation time; the completion time stands in.
pub fn to_external_completed_task(task: &TodoistCompletedTask) -> ExternalMessage {
    ExternalMessage {
        external_id: task.task_id.clone(),
        container_external_id: task.project_id.clone(),
        parent_external_id: None,
        author_external_id: task.user_id.clone(),
        kind: EntityKind::Task,
        body: task.content.clone(),
        created_at: task.completed_at,
        edited_at: None,
        reply_count: Some(task.note_count),
        attachments: Vec::new(),
        metadata: json!({
            "completed": true,
            "completed_at": task.completed_at,
        }),
    }
}

pub fn to_external_comment(
    project_id: &str,
    task_id: &str,
    comment: &TodoistComment,
) -> ExternalMessage {
    let attachments = comment
        .attachment
        .as_ref()
        .map(|a| ExternalAttachment {
            external_id: format!("{}:attachment", comment.id),
            name: a.file_name.clone().unwrap_or_else(|| "attachment".to_string()),
            mime_type: a.file_type.clone(),
            size_bytes: None,
            url: a.file_url.clone(),
        })
        .into_iter()
        .collect();

    ExternalMessage {
        external_id: comment.id.clone(),
        container_external_id: project_id.to_string(),
        parent_external_id: Some(task_id.to_string()),
        author_external_id: None,
        kind: EntityKind::Comment,
        body: comment.content.clone(),
        created_at: comment.posted_at,
        edited_at: None,
        reply_count: Some(0),
        attachments,
        metadata: json!({
            "resource_type": comment.attachment.as_ref().and_then(|a| a.resource_type.clone()),
        }),
    }
}

/// Reorder items so every parent present in the list precedes its children.
///
/// Relative order is otherwise kept. Items whose parent is absent are
/// treated as roots.
pub fn order_parents_first(items: Vec<ExternalMessage>) -> Vec<ExternalMessage> {
    let present: HashSet<String> = items.iter().map(|i| i.external_id.clone()).collect();
    let mut children: HashMap<String, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();

    for (idx, item) in items.iter().enumerate() {
        match item.parent_external_id.as_ref().filter(|p| present.contains(*p)) {
            Some(parent) => children.entry(parent.clone()).or_default().push(idx),
            None => roots.push(idx),
        }
    }

    let mut order = Vec::with_capacity(items.len());
    let mut stack: Vec<usize> = roots.into_iter().rev().collect();
    while let Some(idx) = stack.pop() {
        order.push(idx);
        if let Some(kids) = children.remove(&items[idx].external_id) {
            stack.extend(kids.into_iter().rev());
        }
    }

    // Parent cycles never reach a root; append them as-is.
    let mut seen = vec![false; items.len()];
    for &idx in &order {
        seen[idx] = true;
    }
    order.extend((0..items.len()).filter(|idx| !seen[*idx]));

    let mut slots: Vec<Option<ExternalMessage>> = items.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn task(id: &str, parent: Option<&str>) -> TodoistTask {
        TodoistTask {
            id: id.to_string(),
            project_id: "p1".to_string(),
            section_id: None,
            content: format!("task {}", id),
            description: String::new(),
            is_completed: false,
            labels: Vec::new(),
            parent_id: parent.map(String::from),
            priority: Some(1),
            due: None,
            url: None,
            comment_count: Some(0),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            creator_id: Some("u1".to_string()),
            assignee_id: None,
        }
    }

    fn ids(items: &[ExternalMessage]) -> Vec<&str> {
        items.iter().map(|i| i.external_id.as_str()).collect()
    }

    #[test]
    fn test_to_external_task() {
        let mut t = task("t1", Some("t0"));
        t.description = "details".to_string();
        let msg = to_external_task(&t);
        assert_eq!(msg.kind, EntityKind::Task);
        assert_eq!(msg.body, "task t1\n\ndetails");
        assert_eq!(msg.parent_external_id.as_deref(), Some("t0"));
        assert_eq!(msg.reply_count, Some(0));
        assert!(!msg.may_have_replies());
    }

    #[test]
    fn test_order_parents_first_moves_children_after_parent() {
        let items = vec![
            to_external_task(&task("c1", Some("p"))),
            to_external_task(&task("x", None)),
            to_external_task(&task("gc", Some("c1"))),
            to_external_task(&task("p", None)),
        ];
        let ordered = order_parents_first(items);
        assert_eq!(ids(&ordered), vec!["x", "p", "c1", "gc"]);
    }

    #[test]
    fn test_order_parents_first_keeps_orphans_and_cycles() {
        let items = vec![
            to_external_task(&task("orphan", Some("elsewhere"))),
            to_external_task(&task("a", Some("b"))),
            to_external_task(&task("b", Some("a"))),
        ];
        let ordered = order_parents_first(items);
        assert_eq!(ids(&ordered), vec!["orphan", "a", "b"]);
    }

    #[test]
    fn test_comment_with_attachment() {
        let comment = TodoistComment {
            id: "n1".to_string(),
            task_id: Some("t1".to_string()),
            content: "see file".to_string(),
            posted_at: Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
            attachment: Some(crate::todoist::types::TodoistAttachment {
                file_name: Some("plan.pdf".to_string()),
                file_type: Some("application/pdf".to_string()),
                file_url: Some("https://files.example/plan.pdf".to_string()),
                resource_type: Some("file".to_string()),
            }),
        };
        let msg = to_external_comment("p1", "t1", &comment);
        assert_eq!(msg.parent_external_id.as_deref(), Some("t1"));
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(msg.attachments[0].name, "plan.pdf");
    }
}
