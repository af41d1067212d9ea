use serde::{Deserialize, Serialize};

/// Kinds of external entity that can be imported.
///
/// The lowercase name is the `entityKind` segment of an idempotency key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Channel,
    Team,
    Project,
    Message,
    Issue,
    Task,
    Comment,
    Attachment,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Channel => "channel",
            EntityKind::Team => "team",
            EntityKind::Project => "project",
            EntityKind::Message => "message",
            EntityKind::Issue => "issue",
            EntityKind::Task => "task",
            EntityKind::Comment => "comment",
            EntityKind::Attachment => "attachment",
        }
    }

    /// Whether this kind names a container (channel, team or project).
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(
            self,
            EntityKind::Channel | EntityKind::Team | EntityKind::Project
        )
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(EntityKind::User),
            "channel" => Ok(EntityKind::Channel),
            "team" => Ok(EntityKind::Team),
            "project" => Ok(EntityKind::Project),
            "message" => Ok(EntityKind::Message),
            "issue" => Ok(EntityKind::Issue),
            "task" => Ok(EntityKind::Task),
            "comment" => Ok(EntityKind::Comment),
            "attachment" => Ok(EntityKind::Attachment),
            _ => Err(format!("Unknown entity kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_rejects_unknown_and_uppercase() {
        assert_eq!("issue".parse::<EntityKind>(), Ok(EntityKind::Issue));
        assert!("Issue".parse::<EntityKind>().is_err());
        assert!("thread".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_is_container() {
        assert!(EntityKind::Channel.is_container());
        assert!(EntityKind::Project.is_container());
        assert!(!EntityKind::Message.is_container());
        assert!(!EntityKind::User.is_container());
    }
}
