//! Provider contract shared by every import source.
//!
//! A provider validates a connection and fetches workspace metadata, users,
//! containers and paginated items, normalized to the shapes in this module.
//! Wire envelopes never leave the concrete provider modules.

mod errors;
mod rate_limit;
mod types;

pub use errors::{ProviderError, Result, short_error_message};
pub use rate_limit::{AdaptiveRateLimiter, LimiterConfig, default_rps_for_platform, rate_limits};
pub use types::{
    ExternalAttachment, ExternalChannel, ExternalMessage, ExternalUser, ImportProvider, ItemPage,
    RateLimitInfo, WorkspaceMetadata,
};
