//! Ferry - a multi-platform import pipeline.
//!
//! This library synchronizes channels, teams and projects, their messages,
//! issues and tasks, comments and users from Slack, Linear and Todoist into
//! a workspace store supplied by the caller.
//!
//! # Features
//!
//! - `slack` - chat platform provider (form-encoded REST, cursor pagination)
//! - `linear` - issue tracker provider (GraphQL, node/edge pagination)
//! - `todoist` - task tracker provider (plain REST)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ferry::{ImportConnection, ImportContext, MemoryStore, Platform};
//! use ferry::slack::SlackProvider;
//!
//! let connection = ImportConnection::new(Platform::Slack, token);
//! let provider = SlackProvider::from_connection(&connection)?;
//! let ctx = ImportContext::builder()
//!     .connection(connection)
//!     .workspace_id(workspace_id)
//!     .owner_id(member_id)
//!     .store(Arc::new(MemoryStore::new()))
//!     .build()?;
//!
//! let result = ferry::import::run(&ctx, &provider).await?;
//! println!("{} new messages", result.messages_created);
//! ```

pub mod entity;
pub mod http;
pub mod idempotency;
pub mod import;
pub mod provider;
pub mod retry;
pub mod store;

#[cfg(feature = "slack")]
pub mod slack;

#[cfg(feature = "linear")]
pub mod linear;

#[cfg(feature = "todoist")]
pub mod todoist;

pub use entity::{
    ConnectionStatus, EntityKind, ImportConnection, ImportJob, JobError, JobStatus, Platform,
};
pub use idempotency::{IdempotencyKey, generate_key, parse_key};
pub use import::{
    ImportConfig, ImportContext, ImportError, ImportExecutor, ImportProgress, ImportResult,
};
pub use provider::{AdaptiveRateLimiter, ImportProvider, ProviderError};
pub use retry::{RetryPolicy, with_retry};
pub use store::{ImportStore, MemoryStore, StoreError};
