//! Run configuration, result summary and constants for import runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Containers processed concurrently within one group.
pub const DEFAULT_CONTAINER_CONCURRENCY: usize = 3;

/// Items stored between two cancellation checkpoints / progress updates.
pub const DEFAULT_ITEM_BATCH_SIZE: usize = 20;

/// Caller-supplied configuration for one import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Restrict the run to these containers (matched by external id or name).
    pub item_filter: Option<Vec<String>>,
    /// Only import items created at or after this instant.
    pub date_from: Option<DateTime<Utc>>,
    /// Only import items created at or before this instant.
    pub date_to: Option<DateTime<Utc>>,
    /// Record attachment references on imported items.
    pub include_files: bool,
    /// Expand chat threads into reply items.
    pub include_threads: bool,
    /// Include completed issues/tasks.
    pub include_completed: bool,
    /// Expand issue/task comments into reply items.
    pub include_comments: bool,
    /// Include archived containers and items.
    pub include_archived: bool,
    /// Containers processed concurrently within one group.
    pub container_concurrency: usize,
    /// Items processed between two checkpoints.
    pub item_batch_size: usize,
    /// Wall-clock limit for the whole run, in seconds.
    pub max_run_secs: Option<u64>,
    /// Open-ended platform-specific settings.
    pub platform_options: serde_json::Map<String, serde_json::Value>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            item_filter: None,
            date_from: None,
            date_to: None,
            include_files: false,
            include_threads: false,
            include_completed: false,
            include_comments: false,
            include_archived: false,
            container_concurrency: DEFAULT_CONTAINER_CONCURRENCY,
            item_batch_size: DEFAULT_ITEM_BATCH_SIZE,
            max_run_secs: None,
            platform_options: serde_json::Map::new(),
        }
    }
}

impl ImportConfig {
    /// Whether top-level items should have their replies/comments fetched.
    #[must_use]
    pub fn expands_replies(&self) -> bool {
        self.include_threads || self.include_comments
    }

    /// Whether a container passes the caller's subset filter.
    #[must_use]
    pub fn matches_container(&self, external_id: &str, name: &str) -> bool {
        match &self.item_filter {
            None => true,
            Some(filter) if filter.is_empty() => true,
            Some(filter) => filter
                .iter()
                .any(|f| f == external_id || f.eq_ignore_ascii_case(name)),
        }
    }

    /// Whether a timestamp falls inside the configured date range.
    #[must_use]
    pub fn in_date_range(&self, ts: DateTime<Utc>) -> bool {
        self.date_from.is_none_or(|from| ts >= from) && self.date_to.is_none_or(|to| ts <= to)
    }

    /// Wall-clock limit for the run, if any.
    #[must_use]
    pub fn max_run_duration(&self) -> Option<std::time::Duration> {
        self.max_run_secs.map(std::time::Duration::from_secs)
    }

    /// Look up a platform-specific option.
    #[must_use]
    pub fn platform_option(&self, key: &str) -> Option<&serde_json::Value> {
        self.platform_options.get(key)
    }

    pub(crate) fn effective_concurrency(&self) -> usize {
        self.container_concurrency.max(1)
    }

    pub(crate) fn effective_batch_size(&self) -> usize {
        self.item_batch_size.max(1)
    }
}

/// Summary of a finished import run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Internal ids of containers created by this run.
    pub items_created: Vec<Uuid>,
    /// Containers whose items were processed (created or reused).
    pub containers_imported: usize,
    /// Items (messages/issues/tasks/replies) newly stored.
    pub messages_created: usize,
    /// Items that already existed and were skipped.
    pub messages_existing: usize,
    /// External users known to the run.
    pub users_matched: usize,
    /// Attachment references recorded on stored items.
    pub files_imported: usize,
    /// Non-fatal failures: an entity was skipped, the run continued.
    pub errors: Vec<String>,
    /// Degraded but acceptable outcomes.
    pub warnings: Vec<String>,
}

impl ImportResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Executor phases, in the only order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImportPhase {
    Validating,
    FetchingMetadata,
    FetchingUsers,
    FetchingContainers,
    ImportingContainers,
    ImportingItems,
    Summarizing,
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ImportPhase::Validating => "Validating connection",
            ImportPhase::FetchingMetadata => "Fetching workspace metadata",
            ImportPhase::FetchingUsers => "Fetching users",
            ImportPhase::FetchingContainers => "Fetching containers",
            ImportPhase::ImportingContainers => "Importing containers",
            ImportPhase::ImportingItems => "Importing items",
            ImportPhase::Summarizing => "Summarizing",
        };
        f.write_str(label)
    }
}
