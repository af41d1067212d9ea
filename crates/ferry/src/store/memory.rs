use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::errors::{Result, StoreError};
use super::types::{ContainerRecord, ImportStore, ItemRecord, StoredContainer, StoredItem};

#[derive(Default)]
struct MemoryState {
    containers: Vec<(Uuid, ContainerRecord)>,
    items: Vec<(Uuid, ItemRecord)>,
    /// idempotency key -> position in `containers`
    container_keys: HashMap<String, usize>,
    /// idempotency key -> position in `items`
    item_keys: HashMap<String, usize>,
    /// (workspace, lowercase email) -> member id
    members: HashMap<(Uuid, String), Uuid>,
}

/// In-process [`ImportStore`] keyed by idempotency key.
///
/// Records are kept in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a workspace member for author resolution.
    pub fn add_member(&self, workspace_id: Uuid, email: &str, member_id: Uuid) {
        self.lock()
            .members
            .insert((workspace_id, email.to_lowercase()), member_id);
    }

    /// Stored containers in insertion order.
    pub fn containers(&self) -> Vec<(Uuid, ContainerRecord)> {
        self.lock().containers.clone()
    }

    /// Stored items in insertion order.
    pub fn items(&self) -> Vec<(Uuid, ItemRecord)> {
        self.lock().items.clone()
    }

    /// Find a stored item by its external id.
    pub fn item(&self, external_id: &str) -> Option<(Uuid, ItemRecord)> {
        self.lock()
            .items
            .iter()
            .find(|(_, r)| r.external_id == external_id)
            .cloned()
    }

    pub fn container_count(&self) -> usize {
        self.lock().containers.len()
    }

    pub fn item_count(&self) -> usize {
        self.lock().items.len()
    }
}

#[async_trait]
impl ImportStore for MemoryStore {
    async fn lookup_container_by_external_id(
        &self,
        workspace_id: Uuid,
        external_id: &str,
    ) -> Result<Option<StoredContainer>> {
        Ok(self
            .lock()
            .containers
            .iter()
            .find(|(_, r)| r.workspace_id == workspace_id && r.external_id == external_id)
            .map(|(id, r)| StoredContainer {
                internal_id: *id,
                external_id: r.external_id.clone(),
                name: r.name.clone(),
            }))
    }

    async fn upsert_container(&self, record: ContainerRecord) -> Result<Uuid> {
        let mut state = self.lock();
        if let Some(&pos) = state.container_keys.get(&record.idempotency_key) {
            return Ok(state.containers[pos].0);
        }

        let id = Uuid::new_v4();
        let pos = state.containers.len();
        state
            .container_keys
            .insert(record.idempotency_key.clone(), pos);
        state.containers.push((id, record));
        Ok(id)
    }

    async fn rename_container(&self, internal_id: Uuid, name: &str) -> Result<()> {
        let mut state = self.lock();
        let (_, record) = state
            .containers
            .iter_mut()
            .find(|(id, _)| *id == internal_id)
            .ok_or_else(|| StoreError::not_found_by_id(internal_id))?;
        record.name = name.to_string();
        Ok(())
    }

    async fn lookup_item_by_external_id(
        &self,
        workspace_id: Uuid,
        external_id: &str,
    ) -> Result<Option<StoredItem>> {
        Ok(self
            .lock()
            .items
            .iter()
            .find(|(_, r)| r.workspace_id == workspace_id && r.external_id == external_id)
            .map(|(id, r)| StoredItem {
                internal_id: *id,
                external_id: r.external_id.clone(),
                container_internal_id: r.container_internal_id,
                parent_internal_id: r.parent_internal_id,
            }))
    }

    async fn upsert_item(&self, record: ItemRecord) -> Result<Uuid> {
        let mut state = self.lock();
        if let Some(&pos) = state.item_keys.get(&record.idempotency_key) {
            return Ok(state.items[pos].0);
        }

        if !state
            .containers
            .iter()
            .any(|(id, _)| *id == record.container_internal_id)
        {
            return Err(StoreError::not_found_by_id(record.container_internal_id));
        }

        let id = Uuid::new_v4();
        let pos = state.items.len();
        state.item_keys.insert(record.idempotency_key.clone(), pos);
        state.items.push((id, record));
        Ok(id)
    }

    async fn find_member_by_email(&self, workspace_id: Uuid, email: &str) -> Result<Option<Uuid>> {
        Ok(self
            .lock()
            .members
            .get(&(workspace_id, email.to_lowercase()))
            .copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use chrono::Utc;

    fn container(ws: Uuid, external_id: &str, name: &str) -> ContainerRecord {
        ContainerRecord {
            workspace_id: ws,
            owner_id: Uuid::new_v4(),
            external_id: external_id.to_string(),
            idempotency_key: format!("slack:{ws}:channel:{external_id}"),
            name: name.to_string(),
            kind: EntityKind::Channel,
            description: None,
            metadata: serde_json::json!({}),
        }
    }

    fn item(ws: Uuid, container_id: Uuid, external_id: &str) -> ItemRecord {
        ItemRecord {
            workspace_id: ws,
            owner_id: Uuid::new_v4(),
            container_internal_id: container_id,
            external_id: external_id.to_string(),
            idempotency_key: format!("slack:{ws}:message:{external_id}"),
            body: "hello".to_string(),
            timestamp: Utc::now(),
            parent_internal_id: None,
            author_internal_id: None,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn upsert_container_is_idempotent() {
        let store = MemoryStore::new();
        let ws = Uuid::new_v4();

        let first = store
            .upsert_container(container(ws, "C1", "general"))
            .await
            .expect("insert");
        let second = store
            .upsert_container(container(ws, "C1", "general"))
            .await
            .expect("upsert");

        assert_eq!(first, second);
        assert_eq!(store.container_count(), 1);
    }

    #[tokio::test]
    async fn lookup_is_scoped_to_workspace() {
        let store = MemoryStore::new();
        let ws = Uuid::new_v4();
        store
            .upsert_container(container(ws, "C1", "general"))
            .await
            .expect("insert");

        let found = store
            .lookup_container_by_external_id(ws, "C1")
            .await
            .expect("lookup");
        assert_eq!(found.map(|c| c.name), Some("general".to_string()));

        let other = store
            .lookup_container_by_external_id(Uuid::new_v4(), "C1")
            .await
            .expect("lookup");
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn rename_container_updates_name() {
        let store = MemoryStore::new();
        let ws = Uuid::new_v4();
        let id = store
            .upsert_container(container(ws, "C1", "general"))
            .await
            .expect("insert");

        store.rename_container(id, "announcements").await.expect("rename");
        assert_eq!(store.containers()[0].1.name, "announcements");

        let missing = store.rename_container(Uuid::new_v4(), "x").await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn upsert_item_requires_known_container() {
        let store = MemoryStore::new();
        let ws = Uuid::new_v4();

        let err = store
            .upsert_item(item(ws, Uuid::new_v4(), "C1:1.0"))
            .await
            .expect_err("unknown container");
        assert!(matches!(err, StoreError::NotFound { .. }));

        let container_id = store
            .upsert_container(container(ws, "C1", "general"))
            .await
            .expect("insert");
        let a = store
            .upsert_item(item(ws, container_id, "C1:1.0"))
            .await
            .expect("insert item");
        let b = store
            .upsert_item(item(ws, container_id, "C1:1.0"))
            .await
            .expect("upsert item");
        assert_eq!(a, b);
        assert_eq!(store.item_count(), 1);

        let stored = store
            .lookup_item_by_external_id(ws, "C1:1.0")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(stored.internal_id, a);
        assert_eq!(stored.container_internal_id, container_id);
    }

    #[tokio::test]
    async fn find_member_by_email_is_case_insensitive() {
        let store = MemoryStore::new();
        let ws = Uuid::new_v4();
        let member = Uuid::new_v4();
        store.add_member(ws, "Ada@Example.com", member);

        assert_eq!(
            store
                .find_member_by_email(ws, "ada@example.com")
                .await
                .expect("lookup"),
            Some(member)
        );
        assert_eq!(
            store
                .find_member_by_email(Uuid::new_v4(), "ada@example.com")
                .await
                .expect("lookup"),
            None
        );
    }
}
