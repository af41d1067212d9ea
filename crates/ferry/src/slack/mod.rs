//! Slack import provider.
//!
//! Slack's Web API is form-encoded REST with cursor pagination. Every
//! response carries an `ok` flag that is independent of the HTTP status.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for Slack API operations
//! - [`types`] - Wire payloads
//! - [`client`] - Outbound calls and envelope unwrapping
//! - [`convert`] - Conversion to normalized entities
//! - [`provider`] - The [`ImportProvider`](crate::provider::ImportProvider) implementation

mod client;
mod convert;
mod error;
mod provider;
mod types;

pub use client::{PAGE_SIZE, SLACK_API_BASE, SlackClient};
pub use convert::{datetime_to_ts, message_external_id, ts_to_datetime};
pub use error::{SlackError, is_rate_limit_error};
pub use provider::{REQUIRED_SCOPES, SlackProvider};
