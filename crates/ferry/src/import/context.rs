//! Import context builder.
//!
//! The context is the capability bundle every phase receives: credentials,
//! run configuration, the injected store, a cancellation check, a progress
//! sink and the tracing span of the run.
//!
//! # Example
//!
//! ```ignore
//! use ferry::import::ImportContext;
//!
//! let ctx = ImportContext::builder()
//!     .connection(connection)
//!     .workspace_id(workspace_id)
//!     .owner_id(member_id)
//!     .config(config)
//!     .store(Arc::new(MemoryStore::new()))
//!     .shutdown_flag(shutdown)
//!     .progress(callback)
//!     .build()?;
//!
//! let result = ferry::import::run(&ctx, &provider).await?;
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use uuid::Uuid;

use crate::entity::ImportConnection;
use crate::provider::ProviderError;
use crate::store::ImportStore;

use super::progress::ProgressCallback;
use super::types::ImportConfig;

/// Polled cancellation check.
pub type CancelCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Error type for context construction.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Missing required field in builder.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },
}

/// Builder for creating an [`ImportContext`].
#[derive(Default)]
pub struct ImportContextBuilder {
    connection: Option<ImportConnection>,
    workspace_id: Option<Uuid>,
    owner_id: Option<Uuid>,
    config: Option<ImportConfig>,
    store: Option<Arc<dyn ImportStore>>,
    progress: Option<Arc<ProgressCallback>>,
    cancel: Option<CancelCheck>,
    job_id: Option<Uuid>,
}

impl ImportContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the platform connection.
    pub fn connection(mut self, connection: ImportConnection) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Set the workspace receiving the import.
    pub fn workspace_id(mut self, workspace_id: Uuid) -> Self {
        self.workspace_id = Some(workspace_id);
        self
    }

    /// Set the member performing the import.
    pub fn owner_id(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Set the run configuration.
    pub fn config(mut self, config: ImportConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the persistence operations.
    pub fn store(mut self, store: Arc<dyn ImportStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the progress callback.
    pub fn progress(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Cancel when `flag` becomes true.
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(Arc::new(move || flag.load(Ordering::SeqCst)));
        self
    }

    /// Cancel when `check` returns true.
    pub fn cancel_check(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.cancel = Some(Arc::new(check));
        self
    }

    /// Attach the job this run belongs to (for log correlation).
    pub fn job_id(mut self, job_id: Uuid) -> Self {
        self.job_id = Some(job_id);
        self
    }

    /// Build the import context.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::MissingField` if required fields are not set.
    pub fn build(self) -> Result<ImportContext, ContextError> {
        let connection = self
            .connection
            .ok_or(ContextError::MissingField { field: "connection" })?;
        let workspace_id = self
            .workspace_id
            .ok_or(ContextError::MissingField { field: "workspace_id" })?;
        let owner_id = self
            .owner_id
            .ok_or(ContextError::MissingField { field: "owner_id" })?;
        let store = self
            .store
            .ok_or(ContextError::MissingField { field: "store" })?;

        let span = tracing::info_span!(
            "import_run",
            platform = %connection.platform,
            workspace_id = %workspace_id,
            job_id = tracing::field::Empty,
        );
        if let Some(job_id) = self.job_id {
            span.record("job_id", tracing::field::display(job_id));
        }

        Ok(ImportContext {
            connection,
            workspace_id,
            owner_id,
            config: self.config.unwrap_or_default(),
            store,
            progress: self.progress,
            cancel: self.cancel,
            job_id: self.job_id,
            span,
        })
    }
}

/// Everything one import run needs besides the provider.
pub struct ImportContext {
    connection: ImportConnection,
    workspace_id: Uuid,
    owner_id: Uuid,
    config: ImportConfig,
    store: Arc<dyn ImportStore>,
    progress: Option<Arc<ProgressCallback>>,
    cancel: Option<CancelCheck>,
    job_id: Option<Uuid>,
    span: tracing::Span,
}

impl ImportContext {
    /// Create a new builder.
    pub fn builder() -> ImportContextBuilder {
        ImportContextBuilder::new()
    }

    pub fn connection(&self) -> &ImportConnection {
        &self.connection
    }

    pub fn workspace_id(&self) -> Uuid {
        self.workspace_id
    }

    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn ImportStore {
        self.store.as_ref()
    }

    pub(crate) fn progress_callback(&self) -> Option<Arc<ProgressCallback>> {
        self.progress.clone()
    }

    pub fn job_id(&self) -> Option<Uuid> {
        self.job_id
    }

    /// Span all logging of the run is recorded under.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Poll the cancellation check.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|check| check())
    }

    /// Fail with `ProviderError::Cancelled` once cancellation is requested.
    ///
    /// Providers call this between pages of their internal pagination loops.
    pub fn ensure_active(&self) -> Result<(), ProviderError> {
        if self.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        Ok(())
    }
}

/// Context over a fresh `MemoryStore`, for provider tests.
#[cfg(test)]
pub(crate) fn test_context(
    connection: ImportConnection,
    config: ImportConfig,
) -> ImportContext {
    ImportContext::builder()
        .connection(connection)
        .workspace_id(Uuid::new_v4())
        .owner_id(Uuid::new_v4())
        .config(config)
        .store(Arc::new(crate::store::MemoryStore::new()))
        .build()
        .unwrap_or_else(|e| panic!("test context: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Platform;
    use crate::store::MemoryStore;

    fn builder() -> ImportContextBuilder {
        ImportContext::builder()
            .connection(ImportConnection::new(Platform::Slack, "xoxb-token"))
            .workspace_id(Uuid::new_v4())
            .owner_id(Uuid::new_v4())
            .store(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_build_requires_fields() {
        let err = ImportContext::builder()
            .build()
            .err()
            .expect("missing connection");
        assert!(matches!(
            err,
            ContextError::MissingField {
                field: "connection"
            }
        ));

        let err = ImportContext::builder()
            .connection(ImportConnection::new(Platform::Slack, "t"))
            .workspace_id(Uuid::new_v4())
            .owner_id(Uuid::new_v4())
            .build()
            .err()
            .expect("missing store");
        assert!(matches!(err, ContextError::MissingField { field: "store" }));
    }

    #[test]
    fn test_defaults() {
        let ctx = builder().build().expect("context");
        assert_eq!(ctx.config(), &ImportConfig::default());
        assert!(!ctx.is_cancelled());
        assert!(ctx.ensure_active().is_ok());
        assert!(ctx.job_id().is_none());
    }

    #[test]
    fn test_shutdown_flag_cancels() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = builder()
            .shutdown_flag(Arc::clone(&flag))
            .build()
            .expect("context");

        assert!(!ctx.is_cancelled());
        flag.store(true, Ordering::SeqCst);
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.ensure_active(), Err(ProviderError::Cancelled)));
    }

    #[test]
    fn test_cancel_check_closure() {
        let ctx = builder().cancel_check(|| true).build().expect("context");
        assert!(ctx.is_cancelled());
    }
}
