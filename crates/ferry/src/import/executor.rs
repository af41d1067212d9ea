//! Import executor: drives one provider through the phase sequence.
//!
//! `validating → fetching-metadata → fetching-users → fetching-containers →
//! importing-containers → importing-items → summarizing`
//!
//! Containers are stored sequentially, then their items are imported in
//! groups of `container_concurrency` running concurrently. Pages within one
//! container are sequential and items are stored in fetch order. Each
//! container task owns its id map and reports a [`ContainerOutcome`] that the
//! executor merges into the result.

use std::collections::HashMap;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::idempotency::generate_key;
use crate::provider::{
    ExternalChannel, ExternalMessage, ExternalUser, ImportProvider, ProviderError,
    short_error_message,
};
use crate::store::{ContainerRecord, ItemRecord};

use super::context::ImportContext;
use super::error::ImportError;
use super::progress::{ImportProgress, ProgressTracker};
use super::types::{ImportPhase, ImportResult};

/// Run an import to completion.
///
/// Returns the aggregated result, or the fatal error that aborted the run.
/// A cancellation surfaces as [`ImportError::Cancelled`].
pub async fn run(
    ctx: &ImportContext,
    provider: &dyn ImportProvider,
) -> Result<ImportResult, ImportError> {
    ImportExecutor::new(ctx, provider).run().await
}

/// Orchestrates one import run.
pub struct ImportExecutor<'a> {
    ctx: &'a ImportContext,
    provider: &'a dyn ImportProvider,
    tracker: ProgressTracker,
    phase: Option<ImportPhase>,
    started: Instant,
    /// external user id -> workspace member id
    authors: HashMap<String, Uuid>,
}

/// What one container task produced.
#[derive(Debug, Default)]
struct ContainerOutcome {
    created: usize,
    existing: usize,
    files: usize,
    errors: Vec<String>,
    warnings: Vec<String>,
    completed: bool,
    fatal: Option<ImportError>,
}

/// Per-container state, owned by exactly one task.
#[derive(Default)]
struct ContainerRun {
    /// item external id -> internal id
    ids: HashMap<String, Uuid>,
    /// Items whose parent was not resolvable when they arrived.
    deferred: Vec<DeferredItem>,
    outcome: ContainerOutcome,
    /// Items handled (stored, reused, filtered or failed).
    processed: usize,
    /// Replies fetched through expansion.
    replies_fetched: usize,
}

/// An item waiting for its parent.
struct DeferredItem {
    item: ExternalMessage,
    /// Came from a page rather than from reply expansion.
    from_page: bool,
}

/// What happened to one item.
enum ItemDisposition {
    Stored,
    Existing,
    Deferred,
    Skipped,
}

impl<'a> ImportExecutor<'a> {
    pub fn new(ctx: &'a ImportContext, provider: &'a dyn ImportProvider) -> Self {
        Self {
            ctx,
            provider,
            tracker: ProgressTracker::new(ctx.progress_callback()),
            phase: None,
            started: Instant::now(),
            authors: HashMap::new(),
        }
    }

    /// The phase the executor last entered.
    pub fn phase(&self) -> Option<ImportPhase> {
        self.phase
    }

    /// Latest progress snapshot.
    pub fn progress(&self) -> ImportProgress {
        self.tracker.snapshot()
    }

    /// Run every phase in order.
    pub async fn run(mut self) -> Result<ImportResult, ImportError> {
        let span = self.ctx.span().clone();
        async move {
            match self.execute().await {
                Ok(result) => Ok(result),
                Err(e) => {
                    if e.is_cancelled() {
                        tracing::warn!(phase = ?self.phase, "Import cancelled");
                        self.tracker.step("Import cancelled");
                    } else {
                        tracing::error!(phase = ?self.phase, error = %e, "Import failed");
                        self.tracker
                            .step(format!("Import failed: {}", short_error_message(&e)));
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&mut self) -> Result<ImportResult, ImportError> {
        let ctx = self.ctx;
        let provider = self.provider;
        let mut result = ImportResult::default();

        let connection = ctx.connection();
        if !connection.is_usable(Utc::now()) {
            return Err(ImportError::ConnectionUnusable {
                status: connection.status,
            });
        }

        self.enter(ImportPhase::Validating);
        self.call(ImportPhase::Validating, provider.validate_connection(ctx))
            .await?;
        self.tracker.step("Connection validated");

        self.enter(ImportPhase::FetchingMetadata);
        let metadata = self
            .call(
                ImportPhase::FetchingMetadata,
                provider.fetch_workspace_metadata(ctx),
            )
            .await?;
        tracing::info!(
            external_workspace = %metadata.external_id,
            name = %metadata.name,
            "Importing workspace"
        );

        self.enter(ImportPhase::FetchingUsers);
        let users = self
            .call(ImportPhase::FetchingUsers, provider.fetch_users(ctx))
            .await?;
        self.resolve_authors(&users, &mut result).await;
        result.users_matched = users.len();
        self.tracker.update(|p| {
            p.users_imported = users.len();
            p.current_step = format!("Fetched {} users", users.len());
        });

        self.enter(ImportPhase::FetchingContainers);
        let containers: Vec<ExternalChannel> = self
            .call(
                ImportPhase::FetchingContainers,
                provider.fetch_containers(ctx),
            )
            .await?
            .into_iter()
            .filter(|c| ctx.config().matches_container(&c.external_id, &c.name))
            .collect();
        let total = containers.len();
        self.tracker.update(|p| {
            p.items_total = total;
            p.current_step = format!("Found {} containers", total);
        });

        if containers.is_empty() {
            self.enter(ImportPhase::Summarizing);
            self.tracker.step("No containers found");
            tracing::info!("No containers found, nothing to import");
            return Ok(result);
        }

        self.enter(ImportPhase::ImportingContainers);
        let mut stored = Vec::with_capacity(containers.len());
        for container in &containers {
            self.checkpoint()?;
            if let Some(internal_id) = self.store_container(container, &mut result).await {
                stored.push((container, internal_id));
            }
        }

        self.enter(ImportPhase::ImportingItems);
        let this = &*self;
        for group in stored.chunks(ctx.config().effective_concurrency()) {
            this.checkpoint()?;
            let outcomes = join_all(
                group
                    .iter()
                    .map(|(container, internal_id)| this.import_container(container, *internal_id)),
            )
            .await;

            let mut fatal = None;
            for outcome in outcomes {
                if outcome.completed {
                    result.containers_imported += 1;
                }
                result.messages_created += outcome.created;
                result.messages_existing += outcome.existing;
                result.files_imported += outcome.files;
                result.errors.extend(outcome.errors);
                result.warnings.extend(outcome.warnings);
                if fatal.is_none() {
                    fatal = outcome.fatal;
                }
            }
            if let Some(e) = fatal {
                return Err(e);
            }
        }

        self.enter(ImportPhase::Summarizing);
        tracing::info!(
            containers_created = result.items_created.len(),
            containers_imported = result.containers_imported,
            messages_created = result.messages_created,
            messages_existing = result.messages_existing,
            users = result.users_matched,
            files = result.files_imported,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Import complete"
        );
        self.tracker.step("Import complete");
        Ok(result)
    }

    fn enter(&mut self, phase: ImportPhase) {
        debug_assert!(self.phase.is_none_or(|current| current < phase));
        tracing::info!(%phase, "Entering import phase");
        self.phase = Some(phase);
        self.tracker.step(phase.to_string());
    }

    /// Cancellation and deadline check.
    fn checkpoint(&self) -> Result<(), ImportError> {
        if self.ctx.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        if let Some(limit) = self.ctx.config().max_run_duration()
            && self.started.elapsed() >= limit
        {
            return Err(ImportError::TimedOut(limit));
        }
        Ok(())
    }

    /// Checkpoint, then await a provider call whose failure is fatal.
    async fn call<T>(
        &self,
        phase: ImportPhase,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ImportError> {
        self.checkpoint()?;
        call.await
            .map_err(|e| ImportError::from_provider(phase, e))
    }

    async fn resolve_authors(&mut self, users: &[ExternalUser], result: &mut ImportResult) {
        let store = self.ctx.store();
        let mut lookup_failures = 0usize;
        for user in users {
            let Some(email) = user.email.as_deref() else {
                continue;
            };
            match store.find_member_by_email(self.ctx.workspace_id(), email).await {
                Ok(Some(member)) => {
                    self.authors.insert(user.external_id.clone(), member);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(user = %user.external_id, error = %e, "Member lookup failed");
                    lookup_failures += 1;
                }
            }
        }
        if lookup_failures > 0 {
            result.warnings.push(format!(
                "Could not resolve {} users to workspace members; their items are attributed to the importer",
                lookup_failures
            ));
        }
        tracing::debug!(
            users = users.len(),
            matched = self.authors.len(),
            "Resolved authors"
        );
    }

    /// Store-if-absent for one container.
    async fn store_container(
        &self,
        container: &ExternalChannel,
        result: &mut ImportResult,
    ) -> Option<Uuid> {
        let ctx = self.ctx;
        let store = ctx.store();
        let workspace_id = ctx.workspace_id();

        match store
            .lookup_container_by_external_id(workspace_id, &container.external_id)
            .await
        {
            Ok(Some(existing)) => {
                if existing.name != container.name
                    && let Err(e) = store
                        .rename_container(existing.internal_id, &container.name)
                        .await
                {
                    result.warnings.push(format!(
                        "Could not rename {} {} to {}: {}",
                        container.kind, container.external_id, container.name, e
                    ));
                }
                return Some(existing.internal_id);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(container = %container.external_id, error = %e, "Container lookup failed");
                result.errors.push(format!(
                    "Failed to look up {} {}: {}",
                    container.kind, container.external_id, e
                ));
                return None;
            }
        }

        let record = ContainerRecord {
            workspace_id,
            owner_id: ctx.owner_id(),
            external_id: container.external_id.clone(),
            idempotency_key: generate_key(
                self.provider.platform(),
                workspace_id,
                &container.external_id,
                container.kind,
            ),
            name: container.name.clone(),
            kind: container.kind,
            description: container.description.clone(),
            metadata: serde_json::json!({
                "platform": self.provider.platform(),
                "is_private": container.is_private,
                "is_archived": container.is_archived,
                "created_at": container.created_at,
                "source": container.metadata,
            }),
        };

        match store.upsert_container(record).await {
            Ok(internal_id) => {
                tracing::debug!(container = %container.external_id, %internal_id, "Stored container");
                result.items_created.push(internal_id);
                Some(internal_id)
            }
            Err(e) => {
                tracing::warn!(container = %container.external_id, error = %e, "Failed to store container");
                result.errors.push(format!(
                    "Failed to store {} {} ({}): {}",
                    container.kind, container.external_id, container.name, e
                ));
                None
            }
        }
    }

    /// Import every item of one container.
    async fn import_container(
        &self,
        container: &ExternalChannel,
        internal_id: Uuid,
    ) -> ContainerOutcome {
        let mut state = ContainerRun::default();
        if let Err(e) = self.import_pages(container, internal_id, &mut state).await {
            state.outcome.fatal = Some(e);
            return state.outcome;
        }
        if let Err(e) = self.resolve_deferred(container, internal_id, &mut state).await {
            state.outcome.fatal = Some(e);
            return state.outcome;
        }

        state.outcome.completed = true;
        let created = state.outcome.created;
        self.tracker.update(|p| {
            p.items_imported += 1;
            p.current_step = format!("Imported {} ({} new items)", container.name, created);
        });
        tracing::info!(
            container = %container.external_id,
            created = state.outcome.created,
            existing = state.outcome.existing,
            "Container imported"
        );
        state.outcome
    }

    async fn import_pages(
        &self,
        container: &ExternalChannel,
        internal_id: Uuid,
        state: &mut ContainerRun,
    ) -> Result<(), ImportError> {
        let ctx = self.ctx;
        let batch_size = ctx.config().effective_batch_size();
        let mut cursor: Option<String> = None;

        loop {
            self.checkpoint()?;
            let page = match self
                .provider
                .fetch_items_page(ctx, container, cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(ProviderError::Cancelled) => return Err(ImportError::Cancelled),
                Err(e) => {
                    tracing::warn!(container = %container.external_id, error = %e, "Failed to fetch items");
                    state.outcome.errors.push(format!(
                        "Failed to fetch items for {} {}: {}",
                        container.kind,
                        container.external_id,
                        short_error_message(&e)
                    ));
                    return Ok(());
                }
            };
            tracing::debug!(
                container = %container.external_id,
                items = page.items.len(),
                has_more = page.has_more,
                "Fetched items page"
            );

            let fetched = page.items.len();
            self.tracker.update(|p| p.sub_items_total += fetched);

            for batch in page.items.chunks(batch_size) {
                self.checkpoint()?;
                let before = (state.processed, state.replies_fetched, state.outcome.files);
                for item in batch {
                    self.import_item(container, internal_id, item, state).await?;
                }
                let processed = state.processed - before.0;
                let replies = state.replies_fetched - before.1;
                let files = state.outcome.files - before.2;
                self.tracker.update(|p| {
                    p.sub_items_imported += processed;
                    p.sub_items_total += replies;
                    p.files_imported += files;
                });
            }

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }
        Ok(())
    }

    /// Store one page item and, when enabled, its replies.
    ///
    /// The date range applies to page items only; expanded replies are kept.
    async fn import_item(
        &self,
        container: &ExternalChannel,
        container_internal_id: Uuid,
        item: &ExternalMessage,
        state: &mut ContainerRun,
    ) -> Result<(), ImportError> {
        let config = self.ctx.config();
        if !config.in_date_range(item.created_at) {
            state.processed += 1;
            return Ok(());
        }

        let disposition = self
            .import_entry(container, container_internal_id, item, true, state)
            .await;
        if let ItemDisposition::Stored = disposition {
            self.expand_replies(container, container_internal_id, item, state)
                .await?;
        }
        Ok(())
    }

    /// Fetch and store the replies of a stored page item, when enabled.
    async fn expand_replies(
        &self,
        container: &ExternalChannel,
        container_internal_id: Uuid,
        item: &ExternalMessage,
        state: &mut ContainerRun,
    ) -> Result<(), ImportError> {
        if !self.ctx.config().expands_replies() || !item.may_have_replies() {
            return Ok(());
        }

        self.checkpoint()?;
        match self
            .provider
            .fetch_replies(self.ctx, container, &item.external_id)
            .await
        {
            Ok(replies) => {
                state.replies_fetched += replies.len();
                for reply in &replies {
                    self.import_entry(container, container_internal_id, reply, false, state)
                        .await;
                }
            }
            Err(ProviderError::Cancelled) => return Err(ImportError::Cancelled),
            Err(e) => {
                tracing::warn!(item = %item.external_id, error = %e, "Failed to fetch replies");
                state.outcome.warnings.push(format!(
                    "Could not fetch replies for {} {}: {}",
                    item.kind,
                    item.external_id,
                    short_error_message(&e)
                ));
            }
        }
        Ok(())
    }

    /// Store-if-absent for one item, without expansion.
    async fn import_entry(
        &self,
        container: &ExternalChannel,
        container_internal_id: Uuid,
        item: &ExternalMessage,
        from_page: bool,
        state: &mut ContainerRun,
    ) -> ItemDisposition {
        if state.ids.contains_key(&item.external_id) {
            state.processed += 1;
            return ItemDisposition::Skipped;
        }

        match self
            .ctx
            .store()
            .lookup_item_by_external_id(self.ctx.workspace_id(), &item.external_id)
            .await
        {
            Ok(Some(existing)) => {
                state
                    .ids
                    .insert(item.external_id.clone(), existing.internal_id);
                state.outcome.existing += 1;
                state.processed += 1;
                return ItemDisposition::Existing;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(item = %item.external_id, error = %e, "Item lookup failed");
                state.outcome.errors.push(format!(
                    "Failed to look up {} {}: {}",
                    item.kind, item.external_id, e
                ));
                state.processed += 1;
                return ItemDisposition::Skipped;
            }
        }

        let parent_internal_id = match item.parent_external_id.as_deref() {
            None => None,
            Some(parent) => match state.ids.get(parent) {
                Some(id) => Some(*id),
                None => {
                    state.deferred.push(DeferredItem {
                        item: item.clone(),
                        from_page,
                    });
                    return ItemDisposition::Deferred;
                }
            },
        };

        self.store_item(container, container_internal_id, item, parent_internal_id, state)
            .await
    }

    async fn store_item(
        &self,
        container: &ExternalChannel,
        container_internal_id: Uuid,
        item: &ExternalMessage,
        parent_internal_id: Option<Uuid>,
        state: &mut ContainerRun,
    ) -> ItemDisposition {
        let ctx = self.ctx;
        let platform = self.provider.platform();
        let include_files = ctx.config().include_files;

        let mut metadata = serde_json::json!({
            "platform": platform,
            "kind": item.kind,
            "container_external_id": item.container_external_id,
            "parent_external_id": item.parent_external_id,
            "author_external_id": item.author_external_id,
            "edited_at": item.edited_at,
            "source": item.metadata,
        });
        if include_files && !item.attachments.is_empty() {
            metadata["attachments"] = serde_json::json!(item.attachments);
        }

        let record = ItemRecord {
            workspace_id: ctx.workspace_id(),
            owner_id: ctx.owner_id(),
            container_internal_id,
            external_id: item.external_id.clone(),
            idempotency_key: generate_key(
                platform,
                ctx.workspace_id(),
                &item.external_id,
                item.kind,
            ),
            body: item.body.clone(),
            timestamp: item.created_at,
            parent_internal_id,
            author_internal_id: item
                .author_external_id
                .as_ref()
                .and_then(|a| self.authors.get(a))
                .copied(),
            metadata,
        };

        state.processed += 1;
        match ctx.store().upsert_item(record).await {
            Ok(internal_id) => {
                state.ids.insert(item.external_id.clone(), internal_id);
                state.outcome.created += 1;
                if include_files {
                    state.outcome.files += item.attachments.len();
                }
                ItemDisposition::Stored
            }
            Err(e) => {
                tracing::warn!(
                    container = %container.external_id,
                    item = %item.external_id,
                    error = %e,
                    "Failed to store item"
                );
                state.outcome.errors.push(format!(
                    "Failed to store {} {}: {}",
                    item.kind, item.external_id, e
                ));
                ItemDisposition::Skipped
            }
        }
    }

    /// Second pass for items whose parent arrived late or not at all.
    ///
    /// Items are retried against the id map until no more resolve; the rest
    /// check the store, and are otherwise stored unlinked with one warning
    /// each. Page items stored here are expanded like any other page item,
    /// which can defer further replies, so the pass repeats until nothing is
    /// left.
    async fn resolve_deferred(
        &self,
        container: &ExternalChannel,
        container_internal_id: Uuid,
        state: &mut ContainerRun,
    ) -> Result<(), ImportError> {
        if state.deferred.is_empty() {
            return Ok(());
        }
        self.checkpoint()?;

        let before = (state.processed, state.replies_fetched, state.outcome.files);
        while !state.deferred.is_empty() {
            let mut pending = std::mem::take(&mut state.deferred);
            loop {
                let mut progressed = false;
                let mut still_pending = Vec::new();
                for entry in pending {
                    let parent = entry
                        .item
                        .parent_external_id
                        .as_deref()
                        .and_then(|p| state.ids.get(p))
                        .copied();
                    match parent {
                        Some(parent) => {
                            progressed = true;
                            self.store_deferred(
                                container,
                                container_internal_id,
                                entry,
                                Some(parent),
                                state,
                            )
                            .await?;
                        }
                        None => still_pending.push(entry),
                    }
                }
                // Replies deferred while expanding may resolve in the next round.
                still_pending.append(&mut state.deferred);
                pending = still_pending;
                if pending.is_empty() || !progressed {
                    break;
                }
            }

            for entry in pending {
                let parent_external_id = entry
                    .item
                    .parent_external_id
                    .clone()
                    .unwrap_or_default();
                let parent = match state.ids.get(&parent_external_id) {
                    Some(id) => Some(*id),
                    None => self.lookup_parent(&parent_external_id, &entry.item, state).await,
                };
                self.store_deferred(container, container_internal_id, entry, parent, state)
                    .await?;
            }
        }

        let processed = state.processed - before.0;
        let replies = state.replies_fetched - before.1;
        let files = state.outcome.files - before.2;
        tracing::debug!(container = %container.external_id, processed, "Resolved deferred items");
        self.tracker.update(|p| {
            p.sub_items_imported += processed;
            p.sub_items_total += replies;
            p.files_imported += files;
        });
        Ok(())
    }

    /// Store a deferred item and expand it if it came from a page.
    async fn store_deferred(
        &self,
        container: &ExternalChannel,
        container_internal_id: Uuid,
        entry: DeferredItem,
        parent_internal_id: Option<Uuid>,
        state: &mut ContainerRun,
    ) -> Result<(), ImportError> {
        let disposition = self
            .store_item(container, container_internal_id, &entry.item, parent_internal_id, state)
            .await;
        if entry.from_page && matches!(disposition, ItemDisposition::Stored) {
            self.expand_replies(container, container_internal_id, &entry.item, state)
                .await?;
        }
        Ok(())
    }

    /// Find a parent stored by an earlier run.
    ///
    /// A missing parent is a warning; a failed lookup is an error. Either way
    /// the item is stored without its thread link.
    async fn lookup_parent(
        &self,
        parent_external_id: &str,
        item: &ExternalMessage,
        state: &mut ContainerRun,
    ) -> Option<Uuid> {
        match self
            .ctx
            .store()
            .lookup_item_by_external_id(self.ctx.workspace_id(), parent_external_id)
            .await
        {
            Ok(Some(parent)) => Some(parent.internal_id),
            Ok(None) => {
                state.outcome.warnings.push(format!(
                    "Parent {} of {} {} not found; stored without thread link",
                    parent_external_id, item.kind, item.external_id
                ));
                None
            }
            Err(e) => {
                tracing::warn!(
                    item = %item.external_id,
                    parent = %parent_external_id,
                    error = %e,
                    "Parent lookup failed"
                );
                state.outcome.errors.push(format!(
                    "Failed to look up parent {} of {} {}: {}; stored without thread link",
                    parent_external_id, item.kind, item.external_id, e
                ));
                None
            }
        }
    }
}
