use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityKind;

use super::errors::Result;

/// A container already present in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredContainer {
    pub internal_id: Uuid,
    pub external_id: String,
    pub name: String,
}

/// An item already present in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    pub internal_id: Uuid,
    pub external_id: String,
    pub container_internal_id: Uuid,
    pub parent_internal_id: Option<Uuid>,
}

/// Container write issued by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub workspace_id: Uuid,
    /// Member performing the import.
    pub owner_id: Uuid,
    pub external_id: String,
    pub idempotency_key: String,
    pub name: String,
    pub kind: EntityKind,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
}

/// Item write issued by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub workspace_id: Uuid,
    /// Member performing the import.
    pub owner_id: Uuid,
    pub container_internal_id: Uuid,
    pub external_id: String,
    pub idempotency_key: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub parent_internal_id: Option<Uuid>,
    /// `None` attributes the item to the importing member.
    pub author_internal_id: Option<Uuid>,
    pub metadata: serde_json::Value,
}

/// Read/write operations the import pipeline needs from persistence.
///
/// # Implementation Notes
///
/// Implementors must make `upsert_*` safe to call concurrently with an
/// equivalent idempotency key (unique constraint or upsert semantics):
/// concurrent runs may race on the same entity.
#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn lookup_container_by_external_id(
        &self,
        workspace_id: Uuid,
        external_id: &str,
    ) -> Result<Option<StoredContainer>>;

    /// Insert the container, or return the id of the one stored under the same key.
    async fn upsert_container(&self, record: ContainerRecord) -> Result<Uuid>;

    async fn rename_container(&self, internal_id: Uuid, name: &str) -> Result<()>;

    async fn lookup_item_by_external_id(
        &self,
        workspace_id: Uuid,
        external_id: &str,
    ) -> Result<Option<StoredItem>>;

    /// Insert the item, or return the id of the one stored under the same key.
    async fn upsert_item(&self, record: ItemRecord) -> Result<Uuid>;

    /// Resolve an external user's email to a workspace member.
    async fn find_member_by_email(&self, _workspace_id: Uuid, _email: &str) -> Result<Option<Uuid>> {
        Ok(None)
    }
}
