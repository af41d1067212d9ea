//! Linear issue-tracker provider.
//!
//! Teams are containers, issues are items (sub-issues carry their parent
//! issue), comments are replies. Everything goes through one GraphQL
//! endpoint with Relay-style `pageInfo` pagination.

mod client;
mod convert;
mod error;
mod provider;
mod queries;
mod types;

pub use client::{LINEAR_API_URL, LinearClient, authorization_header, parse_rate_limit_headers};
pub use convert::{CLOSED_STATE_TYPES, issue_body, issue_filter};
pub use error::{LinearError, is_rate_limit_error};
pub use provider::LinearProvider;
