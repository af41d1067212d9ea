//! Platform enum for type-safe provider selection.

use serde::{Deserialize, Serialize};

use super::entity_kind::EntityKind;

/// External platforms an import can run against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Slack (chat platform).
    Slack,
    /// Linear (issue tracker).
    Linear,
    /// Todoist (task tracker).
    Todoist,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Slack, Platform::Linear, Platform::Todoist];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Slack => "slack",
            Platform::Linear => "linear",
            Platform::Todoist => "todoist",
        }
    }

    /// The kind of grouping unit this platform imports items into.
    #[must_use]
    pub fn container_kind(self) -> EntityKind {
        match self {
            Platform::Slack => EntityKind::Channel,
            Platform::Linear => EntityKind::Team,
            Platform::Todoist => EntityKind::Project,
        }
    }

    /// The kind of top-level item inside a container.
    #[must_use]
    pub fn item_kind(self) -> EntityKind {
        match self {
            Platform::Slack => EntityKind::Message,
            Platform::Linear => EntityKind::Issue,
            Platform::Todoist => EntityKind::Task,
        }
    }

    /// The kind of child item fetched by thread/comment expansion.
    #[must_use]
    pub fn reply_kind(self) -> EntityKind {
        match self {
            Platform::Slack => EntityKind::Message,
            Platform::Linear | Platform::Todoist => EntityKind::Comment,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "slack" => Ok(Platform::Slack),
            "linear" => Ok(Platform::Linear),
            "todoist" => Ok(Platform::Todoist),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}
