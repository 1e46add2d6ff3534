use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{github::RepoHost, types::Repo};

const CONTEXT_URI: &str = "https://modelcontextprotocol.io/context/v1";
const TOP_N: u8 = 5;
const COMMENT_BODY_LIMIT: usize = 200;

/// The exported `mcp.json` document.
#[derive(Debug, Serialize)]
pub struct ModelContextDocument {
    #[serde(rename = "@context")]
    pub context: String,
    pub modelcontext: ModelContext,
}

#[derive(Debug, Serialize)]
pub struct ModelContext {
    pub repository: RepositoryContext,
    pub contributors: Vec<ContributorContext>,
    pub recent_commits: Vec<CommitContext>,
    pub open_issues: Vec<IssueContext>,
    pub closed_issues: Vec<IssueContext>,
    pub issue_comments: Vec<IssueCommentContext>,
    pub open_pull_requests: Vec<PullContext>,
}

#[derive(Debug, Serialize)]
pub struct RepositoryContext {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub stars: u64,
    pub forks: u64,
    pub topics: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ContributorContext {
    pub login: String,
    pub html_url: String,
    pub contributions: u64,
}

#[derive(Debug, Serialize)]
pub struct CommitContext {
    pub sha: String,
    pub author: String,
    pub message: String,
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct IssueContext {
    pub number: u64,
    pub title: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<String>,
    pub user: String,
}

#[derive(Debug, Serialize)]
pub struct IssueCommentContext {
    pub issue_number: u64,
    pub body: String,
    pub user: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct PullContext {
    pub number: u64,
    pub title: String,
    pub created_at: String,
    pub user: String,
}

fn day(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn truncate_body(body: &str, limit: usize) -> String {
    body.chars().take(limit).collect()
}

/// Logs a failed sub-fetch and substitutes the empty sequence so one broken
/// endpoint never sinks the whole export.
fn or_empty<T>(section: &str, result: Result<Vec<T>>) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(err) => {
            tracing::warn!(section, error = %format!("{err:#}"), "export sub-fetch failed");
            Vec::new()
        }
    }
}

/// Assembles the model-context document for a repository.
///
/// The repository metadata itself is required; every other section degrades
/// to an empty list when its fetch fails.
pub async fn generate_context<H: RepoHost + Sync>(
    host: &H,
    repo: &Repo,
) -> Result<ModelContextDocument> {
    let summary = host.repo_summary(repo).await?;

    let contributors = or_empty("contributors", host.contributors(repo, TOP_N).await);
    let commits = or_empty(
        "recent_commits",
        host.list_recent_commits(repo, TOP_N).await,
    );
    let open_issues = or_empty(
        "open_issues",
        host.list_issues(repo, crate::types::IssueState::Open).await,
    );
    let closed_issues = or_empty(
        "closed_issues",
        host.list_issues(repo, crate::types::IssueState::Closed)
            .await,
    );
    let open_pulls = or_empty("open_pull_requests", host.list_pull_requests(repo).await);

    let open_issues: Vec<_> = open_issues.into_iter().take(TOP_N as usize).collect();
    let closed_issues: Vec<_> = closed_issues.into_iter().take(TOP_N as usize).collect();

    let mut issue_comments = Vec::new();
    for issue in &open_issues {
        let comments = or_empty(
            "issue_comments",
            host.issue_comments(repo, issue.number).await,
        );
        issue_comments.extend(comments.into_iter().map(|c| IssueCommentContext {
            issue_number: issue.number,
            body: truncate_body(&c.body, COMMENT_BODY_LIMIT),
            user: c.user,
            created_at: day(c.created_at),
        }));
    }

    Ok(ModelContextDocument {
        context: CONTEXT_URI.to_string(),
        modelcontext: ModelContext {
            repository: RepositoryContext {
                name: summary.name,
                description: summary.description,
                url: summary.url,
                stars: summary.stars,
                forks: summary.forks,
                topics: summary.topics,
                created_at: day(summary.created_at),
                updated_at: day(summary.last_updated),
            },
            contributors: contributors
                .into_iter()
                .map(|c| ContributorContext {
                    login: c.login,
                    html_url: c.html_url,
                    contributions: c.contributions,
                })
                .collect(),
            recent_commits: commits
                .into_iter()
                .map(|c| CommitContext {
                    sha: c.sha,
                    author: c.author,
                    message: c.message,
                    date: day(c.date),
                })
                .collect(),
            open_issues: open_issues
                .into_iter()
                .map(|i| IssueContext {
                    number: i.number,
                    title: i.title,
                    created_at: day(i.created_at),
                    closed_at: None,
                    user: i.creator,
                })
                .collect(),
            closed_issues: closed_issues
                .into_iter()
                .map(|i| IssueContext {
                    number: i.number,
                    title: i.title,
                    created_at: day(i.created_at),
                    closed_at: i.closed_at.map(day),
                    user: i.creator,
                })
                .collect(),
            issue_comments,
            open_pull_requests: open_pulls
                .into_iter()
                .take(TOP_N as usize)
                .map(|pr| PullContext {
                    number: pr.number,
                    title: pr.title,
                    created_at: day(pr.created_at),
                    user: pr.author,
                })
                .collect(),
        },
    })
}

/// Writes the document to disk as pretty-printed JSON.
pub fn write_context(path: &Path, document: &ModelContextDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(document).context("failed to encode mcp context")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        let body = "é".repeat(300);
        let truncated = truncate_body(&body, COMMENT_BODY_LIMIT);
        assert_eq!(truncated.chars().count(), 200);
    }

    #[test]
    fn short_bodies_are_untouched() {
        assert_eq!(truncate_body("hello", COMMENT_BODY_LIMIT), "hello");
    }
}
