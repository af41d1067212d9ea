//! Conversion from Slack payloads to normalized entities.

use chrono::{DateTime, Utc};

use super::types::{SlackChannel, SlackFile, SlackMessage, SlackUser};
use crate::entity::EntityKind;
use crate::provider::{ExternalAttachment, ExternalChannel, ExternalMessage, ExternalUser};

/// Message subtypes that carry no content worth importing.
const SKIPPED_SUBTYPES: &[&str] = &["channel_join", "channel_leave"];

/// Parse a Slack timestamp (`"1503435956.000247"`).
pub fn ts_to_datetime(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, "0"));
    let secs = secs.parse::<i64>().ok()?;
    let micros = format!("{:0<6}", frac).get(..6)?.parse::<u32>().ok()?;
    DateTime::from_timestamp(secs, micros * 1_000)
}

/// Format an instant as a Slack timestamp.
pub fn datetime_to_ts(dt: DateTime<Utc>) -> String {
    format!("{}.{:06}", dt.timestamp(), dt.timestamp_subsec_micros())
}

/// Stable external id of a message: `<channel>:<ts>`.
pub fn message_external_id(channel: &str, ts: &str) -> String {
    format!("{}:{}", channel, ts)
}

/// The `ts` part of a message external id.
pub fn ts_from_external_id(external_id: &str) -> &str {
    external_id
        .split_once(':')
        .map_or(external_id, |(_, ts)| ts)
}

/// Whether a message should be imported at all.
pub fn is_importable(msg: &SlackMessage) -> bool {
    msg.subtype
        .as_deref()
        .is_none_or(|s| !SKIPPED_SUBTYPES.contains(&s))
}

pub fn to_external_user(user: &SlackUser) -> ExternalUser {
    let display_name = user
        .profile
        .display_name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| user.name.clone());

    ExternalUser {
        external_id: user.id.clone(),
        display_name,
        real_name: user
            .real_name
            .clone()
            .or_else(|| user.profile.real_name.clone()),
        email: user.profile.email.clone(),
        avatar_url: user.profile.image_72.clone(),
        is_bot: user.is_bot,
    }
}

pub fn to_external_channel(channel: &SlackChannel) -> ExternalChannel {
    let description = channel
        .purpose
        .as_ref()
        .map(|p| p.value.clone())
        .filter(|v| !v.is_empty());

    ExternalChannel {
        external_id: channel.id.clone(),
        name: channel.name.clone(),
        kind: EntityKind::Channel,
        description,
        is_private: channel.is_private,
        is_archived: channel.is_archived,
        created_at: channel
            .created
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        metadata: serde_json::json!({
            "topic": channel.topic.as_ref().map(|t| &t.value),
            "num_members": channel.num_members,
        }),
    }
}

fn to_attachment(file: &SlackFile) -> ExternalAttachment {
    ExternalAttachment {
        external_id: file.id.clone(),
        name: file
            .name
            .clone()
            .or_else(|| file.title.clone())
            .unwrap_or_else(|| file.id.clone()),
        mime_type: file.mimetype.clone(),
        size_bytes: file.size,
        url: file.url_private.clone(),
    }
}

/// Convert a message of `channel`.
///
/// Returns `None` when the timestamp does not parse.
pub fn to_external_message(channel: &str, msg: &SlackMessage) -> Option<ExternalMessage> {
    let created_at = ts_to_datetime(&msg.ts)?;
    let is_reply = msg.thread_ts.as_deref().is_some_and(|t| t != msg.ts);
    let parent_external_id = msg
        .thread_ts
        .as_deref()
        .filter(|_| is_reply)
        .map(|t| message_external_id(channel, t));

    // Slack only sends reply_count on thread parents; replies have none.
    let reply_count = if is_reply {
        Some(0)
    } else {
        Some(msg.reply_count.unwrap_or(0))
    };

    Some(ExternalMessage {
        external_id: message_external_id(channel, &msg.ts),
        container_external_id: channel.to_string(),
        parent_external_id,
        author_external_id: msg.user.clone().or_else(|| msg.bot_id.clone()),
        kind: EntityKind::Message,
        body: msg.text.clone(),
        created_at,
        edited_at: msg.edited.as_ref().and_then(|e| ts_to_datetime(&e.ts)),
        reply_count,
        attachments: msg.files.iter().map(to_attachment).collect(),
        metadata: serde_json::json!({
            "ts": msg.ts,
            "thread_ts": msg.thread_ts,
            "subtype": msg.subtype,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(ts: &str, thread_ts: Option<&str>) -> SlackMessage {
        SlackMessage {
            ts: ts.to_string(),
            user: Some("U1".to_string()),
            bot_id: None,
            text: "hello".to_string(),
            subtype: None,
            thread_ts: thread_ts.map(String::from),
            reply_count: None,
            edited: None,
            files: Vec::new(),
        }
    }

    #[test]
    fn test_ts_round_trip_preserves_microseconds() {
        let dt = ts_to_datetime("1503435956.000247").expect("valid ts");
        assert_eq!(dt.timestamp(), 1503435956);
        assert_eq!(dt.timestamp_subsec_micros(), 247);
        assert_eq!(datetime_to_ts(dt), "1503435956.000247");

        let whole = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(datetime_to_ts(whole), "1704067200.000000");
        assert!(ts_to_datetime("garbage").is_none());
    }

    #[test]
    fn test_top_level_message_without_thread_has_no_replies() {
        let msg = to_external_message("C1", &message("1.000100", None)).expect("convert");
        assert_eq!(msg.external_id, "C1:1.000100");
        assert_eq!(msg.parent_external_id, None);
        assert_eq!(msg.reply_count, Some(0));
        assert!(!msg.may_have_replies());
    }

    #[test]
    fn test_thread_parent_and_reply() {
        let mut parent = message("1.000100", Some("1.000100"));
        parent.reply_count = Some(2);
        let parent = to_external_message("C1", &parent).expect("convert");
        assert_eq!(parent.parent_external_id, None);
        assert_eq!(parent.reply_count, Some(2));

        let reply = to_external_message("C1", &message("2.000200", Some("1.000100")))
            .expect("convert");
        assert_eq!(reply.parent_external_id.as_deref(), Some("C1:1.000100"));
        assert!(reply.is_reply());
        assert!(!reply.may_have_replies());
    }

    #[test]
    fn test_skipped_subtypes() {
        let mut join = message("1.0", None);
        join.subtype = Some("channel_join".to_string());
        assert!(!is_importable(&join));

        let mut bot = message("1.0", None);
        bot.subtype = Some("bot_message".to_string());
        assert!(is_importable(&bot));
    }

    #[test]
    fn test_ts_from_external_id() {
        assert_eq!(ts_from_external_id("C1:1.000100"), "1.000100");
        assert_eq!(ts_from_external_id("1.000100"), "1.000100");
    }
}
