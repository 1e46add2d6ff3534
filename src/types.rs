use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The canonical action a natural-language command requests.
///
/// `Unknown` carries the raw tag so an unrecognised intent produced by the
/// remote model still reaches the dispatcher and is reported there instead of
/// being dropped on the floor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    CreatePr,
    MergePr,
    CommentPr,
    CreateIssue,
    CommentIssue,
    ListItems,
    ViewFile,
    ViewCommit,
    ListIssueComments,
    RepoSummary,
    Unknown(String),
}

impl Intent {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "create_pr" => Intent::CreatePr,
            "merge_pr" => Intent::MergePr,
            "comment_pr" => Intent::CommentPr,
            "create_issue" => Intent::CreateIssue,
            "comment_issue" => Intent::CommentIssue,
            "list_items" => Intent::ListItems,
            "view_file" => Intent::ViewFile,
            "view_commit" => Intent::ViewCommit,
            "list_issue_comments" => Intent::ListIssueComments,
            "repo_summary" => Intent::RepoSummary,
            other => Intent::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Intent::CreatePr => "create_pr",
            Intent::MergePr => "merge_pr",
            Intent::CommentPr => "comment_pr",
            Intent::CreateIssue => "create_issue",
            Intent::CommentIssue => "comment_issue",
            Intent::ListItems => "list_items",
            Intent::ViewFile => "view_file",
            Intent::ViewCommit => "view_commit",
            Intent::ListIssueComments => "list_issue_comments",
            Intent::RepoSummary => "repo_summary",
            Intent::Unknown(tag) => tag,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed, validated user request ready for dispatch.
///
/// Either fully resolved (intent known, required parameters present, defaults
/// filled) or it never left the parser. Parameters are kept as strings; the
/// dispatcher performs numeric coercion at the collaborator boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredCommand {
    pub intent: Intent,
    pub params: BTreeMap<String, String>,
}

impl StructuredCommand {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            params: BTreeMap::new(),
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Ordered list of independently executed action descriptors, produced by the
/// remote parsing strategy.
#[derive(Debug, Clone, Default)]
pub struct ActionBatch(pub Vec<StructuredCommand>);

impl ActionBatch {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of running a command through either parsing strategy.
///
/// Parse failures are values, never errors: both strategies contain their own
/// faults (no rule matched, network failure, malformed model output) and
/// report them through `Unrecognized`.
#[derive(Debug, Clone)]
pub enum Interpretation {
    Command(StructuredCommand),
    Batch(ActionBatch),
    Unrecognized { input: String },
}

/// Outcome of a single dispatched action.
///
/// Serialises untagged so a success renders as `{"message", "data"}` and a
/// failure as `{"error"}`, which keeps the two shapes mutually exclusive.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ActionOutcome {
    Success {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    Failure {
        error: String,
    },
}

impl ActionOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        ActionOutcome::Success {
            message: message.into(),
            data: None,
        }
    }

    pub fn success_with_data(message: impl Into<String>, data: serde_json::Value) -> Self {
        ActionOutcome::Success {
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ActionOutcome::Failure {
            error: error.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ActionOutcome::Failure { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepoError {
    MissingSlash,
    EmptyComponent,
    NotGitHub,
    BadPath,
}

impl std::fmt::Display for RepoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoError::MissingSlash => write!(f, "expected 'owner/repo'"),
            RepoError::EmptyComponent => write!(f, "owner and repo must be non-empty"),
            RepoError::NotGitHub => write!(f, "URL host must be github.com"),
            RepoError::BadPath => write!(f, "URL path must be /owner/repo"),
        }
    }
}

impl std::error::Error for RepoError {}

/// A GitHub repository identifier (owner + name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    pub owner: String,
    pub name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into();
        let name = name.into();
        if owner.is_empty() || name.is_empty() {
            return Err(RepoError::EmptyComponent);
        }
        Ok(Self { owner, name })
    }

    /// Parses either 'owner/repo' or a full https://github.com/owner/repo URL.
    pub fn parse(input: &str) -> Result<Self, RepoError> {
        let input = input.trim();
        if input.starts_with("https://") || input.starts_with("http://") {
            return Self::parse_url(input);
        }
        let parts: Vec<&str> = input.split('/').collect();
        match parts.as_slice() {
            [owner, name] => Repo::new(*owner, *name),
            [_] => Err(RepoError::MissingSlash),
            _ => Err(RepoError::BadPath),
        }
    }

    fn parse_url(input: &str) -> Result<Self, RepoError> {
        let url = url::Url::parse(input).map_err(|_| RepoError::BadPath)?;
        if url.host_str() != Some("github.com") {
            return Err(RepoError::NotGitHub);
        }
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        match segments.as_slice() {
            [owner, name, ..] => Repo::new(*owner, name.trim_end_matches(".git")),
            _ => Err(RepoError::BadPath),
        }
    }
}

impl std::fmt::Display for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Issue state filter for list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueState {
    Open,
    Closed,
    All,
}

impl IssueState {
    pub fn parse(state: &str) -> Option<Self> {
        match state {
            "open" => Some(IssueState::Open),
            "closed" => Some(IssueState::Closed),
            "all" => Some(IssueState::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
            IssueState::All => "all",
        }
    }
}

/// Issue summary as returned by list and create operations.
#[derive(Debug, Clone, Serialize)]
pub struct IssueSummary {
    pub number: u64,
    pub title: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PullSummary {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// One line of recent-commit history.
#[derive(Debug, Clone, Serialize)]
pub struct CommitSummary {
    pub sha: String,
    pub author: String,
    /// First line of the commit message.
    pub message: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitStats {
    pub additions: u64,
    pub deletions: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitFile {
    pub filename: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
}

/// Full detail for a single commit, including per-file change stats.
#[derive(Debug, Clone, Serialize)]
pub struct CommitDetail {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub email: Option<String>,
    pub github_user: Option<String>,
    pub github_url: Option<String>,
    pub date: DateTime<Utc>,
    pub stats: CommitStats,
    pub files_changed: Vec<CommitFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentSummary {
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Contributor {
    pub login: String,
    pub html_url: String,
    pub contributions: u64,
}

/// Aggregate repository metadata for the repo_summary intent and the context
/// export. Deserialize is needed to recover the typed summary from an
/// outcome's JSON payload when rendering.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct RepoSummary {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub open_prs: u64,
    pub recent_commits: Vec<String>,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Entry in a repository file tree listing.
#[derive(Debug, Clone, Serialize)]
pub struct TreeItem {
    pub path: String,
    /// "file" or "dir".
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_parses_owner_slash_name() {
        let repo = Repo::parse("octocat/hello-world").unwrap();
        assert_eq!(repo.owner, "octocat");
        assert_eq!(repo.name, "hello-world");
        assert_eq!(repo.to_string(), "octocat/hello-world");
    }

    #[test]
    fn repo_parses_github_url() {
        let repo = Repo::parse("https://github.com/octocat/hello-world").unwrap();
        assert_eq!(repo.owner, "octocat");
        assert_eq!(repo.name, "hello-world");
    }

    #[test]
    fn repo_rejects_bare_name() {
        assert_eq!(Repo::parse("hello-world"), Err(RepoError::MissingSlash));
    }

    #[test]
    fn repo_rejects_foreign_host() {
        assert_eq!(
            Repo::parse("https://gitlab.com/a/b"),
            Err(RepoError::NotGitHub)
        );
    }

    #[test]
    fn intent_round_trips_known_tags() {
        for tag in [
            "create_pr",
            "merge_pr",
            "comment_pr",
            "create_issue",
            "comment_issue",
            "list_items",
            "view_file",
            "view_commit",
            "list_issue_comments",
            "repo_summary",
        ] {
            assert_eq!(Intent::parse(tag).as_str(), tag);
        }
    }

    #[test]
    fn unknown_intent_keeps_tag() {
        assert_eq!(
            Intent::parse("delete_everything"),
            Intent::Unknown("delete_everything".to_string())
        );
    }

    #[test]
    fn outcome_serialises_mutually_exclusive_shapes() {
        let ok = serde_json::to_value(ActionOutcome::success("done")).unwrap();
        assert_eq!(ok, serde_json::json!({"message": "done"}));

        let err = serde_json::to_value(ActionOutcome::failure("boom")).unwrap();
        assert_eq!(err, serde_json::json!({"error": "boom"}));
    }
}
