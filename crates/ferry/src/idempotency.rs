//! Deterministic idempotency keys for imported entities.
//!
//! A key is `platform:workspaceId:entityKind:externalId`. The external id is
//! the last segment and may itself contain `:` (Slack message ids do).

use uuid::Uuid;

use crate::entity::{EntityKind, Platform};

/// The four fields an idempotency key is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    pub platform: Platform,
    pub workspace_id: Uuid,
    pub kind: EntityKind,
    pub external_id: String,
}

impl IdempotencyKey {
    pub fn new(
        platform: Platform,
        workspace_id: Uuid,
        kind: EntityKind,
        external_id: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            workspace_id,
            kind,
            external_id: external_id.into(),
        }
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.platform, self.workspace_id, self.kind, self.external_id
        )
    }
}

impl std::str::FromStr for IdempotencyKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_key(s).ok_or_else(|| format!("Malformed idempotency key: {s}"))
    }
}

/// Derive the idempotency key for one external entity.
#[must_use]
pub fn generate_key(
    platform: Platform,
    workspace_id: Uuid,
    external_id: &str,
    kind: EntityKind,
) -> String {
    IdempotencyKey::new(platform, workspace_id, kind, external_id).to_string()
}

/// Parse a key produced by [`generate_key`].
///
/// Returns `None` for too few segments, an unknown platform or kind, a
/// workspace id that is not a UUID, or an empty external id.
#[must_use]
pub fn parse_key(key: &str) -> Option<IdempotencyKey> {
    let mut parts = key.splitn(4, ':');
    let platform = parts.next()?.parse::<Platform>().ok()?;
    let workspace_id = Uuid::parse_str(parts.next()?).ok()?;
    let kind = parts.next()?.parse::<EntityKind>().ok()?;
    let external_id = parts.next()?;
    if external_id.is_empty() {
        return None;
    }

    Some(IdempotencyKey::new(platform, workspace_id, kind, external_id))
}
