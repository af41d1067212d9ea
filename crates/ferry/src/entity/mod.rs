//! Data model shared by the pipeline and its callers.
//!
//! - [`platform`] - the supported external platforms
//! - [`entity_kind`] - the kinds of external entity an idempotency key can name
//! - [`connection`] - an authorized connection to one platform
//! - [`job`] - one import run and its lifecycle

pub mod connection;
pub mod entity_kind;
pub mod job;
pub mod platform;

pub use connection::{ConnectionStatus, ImportConnection};
pub use entity_kind::EntityKind;
pub use job::{ImportJob, JobError, JobStatus};
pub use platform::Platform;
