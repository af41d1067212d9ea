//! Import pipeline: context, run configuration, progress and the executor.

mod context;
mod error;
mod executor;
mod progress;
mod types;

pub use context::{CancelCheck, ContextError, ImportContext, ImportContextBuilder};
#[cfg(test)]
pub(crate) use context::test_context;
pub use error::ImportError;
pub use executor::{ImportExecutor, run};
pub use progress::{ImportProgress, ProgressCallback, emit};
pub use types::{
    DEFAULT_CONTAINER_CONCURRENCY, DEFAULT_ITEM_BATCH_SIZE, ImportConfig, ImportPhase,
    ImportResult,
};
