//! GraphQL documents sent to Linear.

pub const VIEWER: &str = "query Viewer { viewer { id name email } }";

pub const ORGANIZATION: &str = "query Organization { organization { id name urlKey } }";

pub const USERS: &str = r#"
query Users($first: Int!, $after: String) {
  users(first: $first, after: $after) {
    nodes { id name displayName email avatarUrl active }
    pageInfo { hasNextPage endCursor }
  }
}"#;

pub const TEAMS: &str = r#"
query Teams($first: Int!, $after: String) {
  teams(first: $first, after: $after) {
    nodes { id key name description private createdAt archivedAt }
    pageInfo { hasNextPage endCursor }
  }
}"#;

pub const TEAM_ISSUES: &str = r#"
query TeamIssues($teamId: String!, $first: Int!, $after: String, $filter: IssueFilter, $includeArchived: Boolean) {
  team(id: $teamId) {
    issues(first: $first, after: $after, filter: $filter, includeArchived: $includeArchived, orderBy: createdAt) {
      nodes {
        id identifier title description url priority
        createdAt updatedAt archivedAt
        state { name type }
        creator { id }
        assignee { id }
        parent { id }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
}"#;

pub const ISSUE_COMMENTS: &str = r#"
query IssueComments($issueId: String!, $first: Int!) {
  issue(id: $issueId) {
    comments(first: $first) {
      nodes { id body createdAt editedAt user { id } parent { id } }
    }
  }
}"#;
