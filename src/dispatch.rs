use std::collections::BTreeMap;

use chrono::Utc;

use crate::{
    github::RepoHost,
    types::{ActionBatch, ActionOutcome, Intent, IssueState, Repo, StructuredCommand},
};

/// Routes validated commands to their collaborator operation and normalises
/// every outcome into an [`ActionOutcome`].
///
/// Stateless: each call is independent, and bad parameters or collaborator
/// faults become `Failure` values rather than propagated errors.
pub struct Dispatcher<H> {
    host: H,
}

/// Parameter extraction failures. Folded into `Failure` outcomes by
/// [`Dispatcher::execute`]; they never reach the caller as errors.
#[derive(Debug)]
enum ParamError {
    Missing(&'static str),
    NotANumber { key: &'static str, value: String },
}

impl std::fmt::Display for ParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamError::Missing(key) => write!(f, "Missing required parameter: {key}"),
            ParamError::NotANumber { key, value } => {
                write!(f, "Invalid {key}: '{value}' is not a number")
            }
        }
    }
}

impl std::error::Error for ParamError {}

fn required<'a>(
    params: &'a BTreeMap<String, String>,
    key: &'static str,
) -> Result<&'a str, ParamError> {
    params
        .get(key)
        .map(String::as_str)
        .ok_or(ParamError::Missing(key))
}

fn required_number(params: &BTreeMap<String, String>, key: &'static str) -> Result<u64, ParamError> {
    let value = required(params, key)?;
    value.trim().parse().map_err(|_| ParamError::NotANumber {
        key,
        value: value.to_string(),
    })
}

fn optional<'a>(params: &'a BTreeMap<String, String>, key: &str, default: &'a str) -> &'a str {
    params.get(key).map_or(default, String::as_str)
}

fn json_data<T: serde::Serialize>(message: String, value: &T) -> ActionOutcome {
    match serde_json::to_value(value) {
        Ok(data) => ActionOutcome::success_with_data(message, data),
        Err(err) => ActionOutcome::failure(format!("Failed to encode result: {err}")),
    }
}

impl<H: RepoHost + Sync> Dispatcher<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Executes one command against the host. Never fails: bad parameters,
    /// collaborator faults and unknown intents all come back as
    /// `ActionOutcome::Failure`.
    pub async fn execute(&self, repo: &Repo, cmd: &StructuredCommand) -> ActionOutcome {
        match self.try_execute(repo, cmd).await {
            Ok(outcome) => outcome,
            Err(err) => ActionOutcome::failure(format!("{err:#}")),
        }
    }

    /// Executes an ordered batch, one action at a time. A failing action is
    /// recorded and execution continues; the output always has one outcome
    /// per input action, in order.
    pub async fn run_batch(&self, repo: &Repo, batch: &ActionBatch) -> Vec<ActionOutcome> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for (index, cmd) in batch.0.iter().enumerate() {
            let outcome = self.execute(repo, cmd).await;
            if outcome.is_failure() {
                tracing::debug!(index, intent = %cmd.intent, "batch action failed");
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn try_execute(
        &self,
        repo: &Repo,
        cmd: &StructuredCommand,
    ) -> anyhow::Result<ActionOutcome> {
        let params = &cmd.params;

        let outcome = match &cmd.intent {
            Intent::CreatePr => {
                let head = required(params, "head")?;
                let base = required(params, "base")?;
                // The local parser fills these; remote output may omit them.
                let default_title = format!("PR from {head} to {base}");
                let title = optional(params, "title", &default_title);
                let body = optional(params, "body", "");

                let url = self
                    .host
                    .create_pull_request(repo, base, head, title, body)
                    .await?;
                ActionOutcome::success_with_data(
                    format!("Pull request created: {url}"),
                    serde_json::json!({ "url": url }),
                )
            }

            Intent::MergePr => {
                let number = required_number(params, "pr_number")?;
                let message = optional(params, "message", "Merged via MCP");
                let status = self.host.merge_pull_request(repo, number, message).await?;
                ActionOutcome::success(status)
            }

            Intent::CommentPr => {
                let number = required_number(params, "pr_number")?;
                let comment = required(params, "comment")?;
                self.host
                    .comment_on_pull_request(repo, number, comment)
                    .await?;
                ActionOutcome::success(format!("Comment added to PR #{number}"))
            }

            Intent::CreateIssue => {
                let default_title = format!(
                    "Issue created on {}",
                    Utc::now().date_naive().format("%Y-%m-%d")
                );
                let title = optional(params, "title", &default_title);
                let body = optional(params, "body", "");
                let issue = self.host.create_issue(repo, title, body).await?;
                json_data(
                    format!("Issue #{} created successfully", issue.number),
                    &issue,
                )
            }

            Intent::CommentIssue => {
                let number = required_number(params, "issue_number")?;
                let comment = required(params, "comment")?;
                self.host.comment_on_issue(repo, number, comment).await?;
                ActionOutcome::success(format!("Comment added to issue #{number}"))
            }

            Intent::ListItems => {
                let item_type = required(params, "item_type")?;
                let state = optional(params, "state", "open");
                self.list_items(repo, item_type, state).await?
            }

            Intent::ViewFile => {
                let path = required(params, "file_path")?;
                let branch = optional(params, "branch", "main");
                let content = self.host.file_content(repo, path, branch).await?;
                ActionOutcome::success_with_data(
                    format!("Fetched '{path}' from branch '{branch}'"),
                    serde_json::json!({ "path": path, "branch": branch, "content": content }),
                )
            }

            Intent::ViewCommit => {
                let sha = required(params, "commit_sha")?;
                let detail = self.host.commit_diff(repo, sha).await?;
                json_data(format!("Commit {}", detail.sha), &detail)
            }

            Intent::ListIssueComments => {
                let number = required_number(params, "issue_number")?;
                let comments = self.host.issue_comments(repo, number).await?;
                json_data(
                    format!("Found {} comments on issue #{number}", comments.len()),
                    &comments,
                )
            }

            Intent::RepoSummary => {
                let summary = self.host.repo_summary(repo).await?;
                json_data(format!("Summary of {}", summary.name), &summary)
            }

            Intent::Unknown(tag) => ActionOutcome::failure(format!("Unknown intent: {tag}")),
        };

        Ok(outcome)
    }

    async fn list_items(
        &self,
        repo: &Repo,
        item_type: &str,
        state_str: &str,
    ) -> anyhow::Result<ActionOutcome> {
        let outcome = match item_type {
            "issues" => {
                let Some(state) = IssueState::parse(state_str) else {
                    return Ok(ActionOutcome::failure(format!(
                        "Unknown issue state: {state_str}"
                    )));
                };
                let issues = self.host.list_issues(repo, state).await?;
                json_data(
                    format!("Found {} {} issues", issues.len(), state.as_str()),
                    &issues,
                )
            }
            "pull requests" | "prs" => {
                let pulls = self.host.list_pull_requests(repo).await?;
                json_data(format!("Found {} open pull requests", pulls.len()), &pulls)
            }
            "branches" => {
                let branches = self.host.list_branches(repo).await?;
                json_data(format!("Found {} branches", branches.len()), &branches)
            }
            "commits" => {
                let commits = self.host.list_recent_commits(repo, 5).await?;
                json_data(format!("Last {} commits", commits.len()), &commits)
            }
            other => ActionOutcome::failure(format!("Unknown item type: {other}")),
        };
        Ok(outcome)
    }
}
