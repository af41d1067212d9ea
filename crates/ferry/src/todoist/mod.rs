//! Todoist import provider.
//!
//! Projects are containers, tasks are items (subtasks carry their parent
//! task), comments are replies. REST v2 returns flat JSON arrays, so every
//! project is a single page.

mod client;
mod convert;
mod error;
mod provider;
mod types;

pub use client::{TODOIST_REST_BASE, TODOIST_SYNC_BASE, TodoistClient};
pub use convert::order_parents_first;
pub use error::TodoistError;
pub use provider::{PERSONAL_WORKSPACE, TodoistProvider};
