use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::Deserialize;

use crate::{
    config::Config,
    types::{
        CommentSummary, CommitDetail, CommitFile, CommitStats, CommitSummary, Contributor,
        IssueState, IssueSummary, PullSummary, Repo, RepoSummary, TreeItem,
    },
};

/// The collaborator boundary: one method per repository-hosting operation,
/// every outcome an explicit `Result`. The dispatcher and the context
/// exporter only ever see this trait, so tests swap in a mock and the
/// production binary plugs in [`GitHubHost`].
#[async_trait]
pub trait RepoHost {
    async fn create_pull_request(
        &self,
        repo: &Repo,
        base: &str,
        head: &str,
        title: &str,
        body: &str,
    ) -> Result<String>;

    async fn merge_pull_request(&self, repo: &Repo, number: u64, message: &str) -> Result<String>;

    async fn comment_on_pull_request(&self, repo: &Repo, number: u64, body: &str) -> Result<()>;

    async fn create_issue(&self, repo: &Repo, title: &str, body: &str) -> Result<IssueSummary>;

    async fn comment_on_issue(&self, repo: &Repo, number: u64, body: &str) -> Result<()>;

    async fn list_issues(&self, repo: &Repo, state: IssueState) -> Result<Vec<IssueSummary>>;

    async fn list_pull_requests(&self, repo: &Repo) -> Result<Vec<PullSummary>>;

    async fn list_branches(&self, repo: &Repo) -> Result<Vec<String>>;

    async fn list_recent_commits(&self, repo: &Repo, count: u8) -> Result<Vec<CommitSummary>>;

    async fn file_content(&self, repo: &Repo, path: &str, branch: &str) -> Result<String>;

    async fn commit_diff(&self, repo: &Repo, sha: &str) -> Result<CommitDetail>;

    async fn issue_comments(&self, repo: &Repo, number: u64) -> Result<Vec<CommentSummary>>;

    async fn repo_summary(&self, repo: &Repo) -> Result<RepoSummary>;

    async fn contributors(&self, repo: &Repo, count: u8) -> Result<Vec<Contributor>>;

    async fn list_user_repos(&self) -> Result<Vec<String>>;

    async fn file_tree(&self, repo: &Repo, branch: &str) -> Result<Vec<TreeItem>>;

    async fn repo_topics(&self, repo: &Repo) -> Result<Vec<String>>;

    async fn add_repo_topics(&self, repo: &Repo, topics: &[String]) -> Result<Vec<String>>;

    async fn update_description(&self, repo: &Repo, description: &str) -> Result<String>;

    async fn repo_license(&self, repo: &Repo) -> Result<String>;
}

// Wire shapes for the REST routes we call directly. Only the fields we read
// are declared; serde ignores the rest.

#[derive(Debug, Deserialize)]
struct UserWire {
    login: String,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IssueWire {
    number: u64,
    title: String,
    user: Option<UserWire>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl IssueWire {
    fn into_summary(self) -> IssueSummary {
        IssueSummary {
            number: self.number,
            title: self.title,
            creator: self
                .user
                .map_or_else(|| "Unknown".to_string(), |u| u.login),
            created_at: self.created_at,
            closed_at: self.closed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PullWire {
    number: u64,
    title: String,
    user: Option<UserWire>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct PullDetailWire {
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    mergeable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct PrCreatedWire {
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct MergeWire {
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitAuthorWire {
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CommitInnerWire {
    message: String,
    author: Option<GitAuthorWire>,
}

#[derive(Debug, Deserialize)]
struct CommitWire {
    sha: String,
    commit: CommitInnerWire,
    #[serde(default)]
    author: Option<UserWire>,
}

#[derive(Debug, Default, Deserialize)]
struct StatsWire {
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct CommitFileWire {
    filename: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    changes: u64,
}

#[derive(Debug, Deserialize)]
struct CommitDetailWire {
    sha: String,
    commit: CommitInnerWire,
    #[serde(default)]
    author: Option<UserWire>,
    #[serde(default)]
    stats: StatsWire,
    #[serde(default)]
    files: Vec<CommitFileWire>,
}

#[derive(Debug, Deserialize)]
struct CommentWire {
    user: Option<UserWire>,
    created_at: DateTime<Utc>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContributorWire {
    login: String,
    html_url: String,
    contributions: u64,
}

#[derive(Debug, Deserialize)]
struct BranchWire {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RepoWire {
    full_name: String,
    description: Option<String>,
    html_url: String,
    stargazers_count: u64,
    forks_count: u64,
    open_issues_count: u64,
    #[serde(default)]
    topics: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RepoNameWire {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct TopicsWire {
    names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TreeWire {
    tree: Vec<TreeEntryWire>,
}

#[derive(Debug, Deserialize)]
struct TreeEntryWire {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct LicenseWire {
    license: Option<LicenseInfoWire>,
}

#[derive(Debug, Deserialize)]
struct LicenseInfoWire {
    name: String,
    #[serde(default)]
    spdx_id: Option<String>,
}

/// Production collaborator backed by the GitHub REST API via octocrab.
pub struct GitHubHost {
    client: Octocrab,
}

impl GitHubHost {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(config.github_token.clone())
            .build()
            .context("Failed to create GitHub client")?;
        Ok(Self { client })
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().to_string()
}

fn author_name(commit: &CommitInnerWire) -> String {
    commit
        .author
        .as_ref()
        .and_then(|a| a.name.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[async_trait]
impl RepoHost for GitHubHost {
    async fn create_pull_request(
        &self,
        repo: &Repo,
        base: &str,
        head: &str,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let created: PrCreatedWire = self
            .client
            .post(
                format!("/repos/{}/{}/pulls", repo.owner, repo.name),
                Some(&serde_json::json!({
                    "title": title,
                    "head": head,
                    "base": base,
                    "body": body,
                })),
            )
            .await
            .with_context(|| format!("Could not create PR in {repo}"))?;
        Ok(created.html_url)
    }

    async fn merge_pull_request(&self, repo: &Repo, number: u64, message: &str) -> Result<String> {
        // Check up front so an already-merged or conflicted PR reports a
        // plain message instead of a 405 from the merge endpoint.
        let detail: PullDetailWire = self
            .client
            .get(
                format!("/repos/{}/{}/pulls/{number}", repo.owner, repo.name),
                None::<&()>,
            )
            .await
            .with_context(|| format!("Could not fetch PR #{number} in {repo}"))?;

        if detail.merged {
            anyhow::bail!("PR #{number} is already merged");
        }
        if detail.mergeable == Some(false) {
            anyhow::bail!("PR #{number} is not mergeable right now");
        }

        let merged: MergeWire = self
            .client
            .put(
                format!("/repos/{}/{}/pulls/{number}/merge", repo.owner, repo.name),
                Some(&serde_json::json!({ "commit_message": message })),
            )
            .await
            .with_context(|| format!("Could not merge PR #{number} in {repo}"))?;

        if merged.merged {
            Ok(format!("Merged PR #{number} successfully"))
        } else {
            let reason = merged.message.unwrap_or_else(|| "unknown reason".to_string());
            anyhow::bail!("PR #{number} was not merged: {reason}")
        }
    }

    async fn comment_on_pull_request(&self, repo: &Repo, number: u64, body: &str) -> Result<()> {
        // PR conversation comments go through the issues endpoint.
        let _: serde_json::Value = self
            .client
            .post(
                format!(
                    "/repos/{}/{}/issues/{number}/comments",
                    repo.owner, repo.name
                ),
                Some(&serde_json::json!({ "body": body })),
            )
            .await
            .with_context(|| format!("Could not comment on PR #{number} in {repo}"))?;
        Ok(())
    }

    async fn create_issue(&self, repo: &Repo, title: &str, body: &str) -> Result<IssueSummary> {
        let issue: IssueWire = self
            .client
            .post(
                format!("/repos/{}/{}/issues", repo.owner, repo.name),
                Some(&serde_json::json!({ "title": title, "body": body })),
            )
            .await
            .with_context(|| format!("Failed to create issue in {repo}"))?;
        Ok(issue.into_summary())
    }

    async fn comment_on_issue(&self, repo: &Repo, number: u64, body: &str) -> Result<()> {
        let _: serde_json::Value = self
            .client
            .post(
                format!(
                    "/repos/{}/{}/issues/{number}/comments",
                    repo.owner, repo.name
                ),
                Some(&serde_json::json!({ "body": body })),
            )
            .await
            .with_context(|| format!("Failed to comment on issue #{number} in {repo}"))?;
        Ok(())
    }

    async fn list_issues(&self, repo: &Repo, state: IssueState) -> Result<Vec<IssueSummary>> {
        let issues: Vec<IssueWire> = self
            .client
            .get(
                format!(
                    "/repos/{}/{}/issues?state={}&per_page=50",
                    repo.owner,
                    repo.name,
                    state.as_str()
                ),
                None::<&()>,
            )
            .await
            .with_context(|| format!("Failed to list issues in {repo}"))?;

        // The issues endpoint also returns pull requests; drop them.
        Ok(issues
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(IssueWire::into_summary)
            .collect())
    }

    async fn list_pull_requests(&self, repo: &Repo) -> Result<Vec<PullSummary>> {
        let pulls: Vec<PullWire> = self
            .client
            .get(
                format!(
                    "/repos/{}/{}/pulls?state=open&per_page=50",
                    repo.owner, repo.name
                ),
                None::<&()>,
            )
            .await
            .with_context(|| format!("Failed to list pull requests in {repo}"))?;
        Ok(pulls
            .into_iter()
            .map(|pr| PullSummary {
                number: pr.number,
                title: pr.title,
                author: pr.user.map_or_else(|| "Unknown".to_string(), |u| u.login),
                created_at: pr.created_at,
            })
            .collect())
    }

    async fn list_branches(&self, repo: &Repo) -> Result<Vec<String>> {
        let branches: Vec<BranchWire> = self
            .client
            .get(
                format!("/repos/{}/{}/branches?per_page=100", repo.owner, repo.name),
                None::<&()>,
            )
            .await
            .with_context(|| format!("Failed to fetch branches in {repo}"))?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    async fn list_recent_commits(&self, repo: &Repo, count: u8) -> Result<Vec<CommitSummary>> {
        let commits: Vec<CommitWire> = self
            .client
            .get(
                format!(
                    "/repos/{}/{}/commits?per_page={count}",
                    repo.owner, repo.name
                ),
                None::<&()>,
            )
            .await
            .with_context(|| format!("Failed to fetch commits in {repo}"))?;
        Ok(commits
            .into_iter()
            .map(|c| CommitSummary {
                author: author_name(&c.commit),
                message: first_line(&c.commit.message),
                date: c
                    .commit
                    .author
                    .map(|a| a.date)
                    .unwrap_or_else(Utc::now),
                sha: c.sha,
            })
            .collect())
    }

    async fn file_content(&self, repo: &Repo, path: &str, branch: &str) -> Result<String> {
        let mut content = self
            .client
            .repos(repo.owner.as_str(), repo.name.as_str())
            .get_content()
            .path(path)
            .r#ref(branch)
            .send()
            .await
            .with_context(|| format!("Could not fetch '{path}' from {repo} ({branch})"))?;

        let item = content
            .take_items()
            .into_iter()
            .next()
            .with_context(|| format!("'{path}' does not exist on branch '{branch}'"))?;
        item.decoded_content()
            .with_context(|| format!("'{path}' is not a decodable text file"))
    }

    async fn commit_diff(&self, repo: &Repo, sha: &str) -> Result<CommitDetail> {
        let detail: CommitDetailWire = self
            .client
            .get(
                format!("/repos/{}/{}/commits/{sha}", repo.owner, repo.name),
                None::<&()>,
            )
            .await
            .with_context(|| format!("Failed to get commit {sha} in {repo}"))?;

        Ok(CommitDetail {
            author: author_name(&detail.commit),
            email: detail.commit.author.as_ref().and_then(|a| a.email.clone()),
            date: detail
                .commit
                .author
                .as_ref()
                .map(|a| a.date)
                .unwrap_or_else(Utc::now),
            github_user: detail.author.as_ref().map(|u| u.login.clone()),
            github_url: detail.author.as_ref().and_then(|u| u.html_url.clone()),
            message: detail.commit.message,
            sha: detail.sha,
            stats: CommitStats {
                additions: detail.stats.additions,
                deletions: detail.stats.deletions,
                total: detail.stats.total,
            },
            files_changed: detail
                .files
                .into_iter()
                .map(|f| CommitFile {
                    filename: f.filename,
                    additions: f.additions,
                    deletions: f.deletions,
                    changes: f.changes,
                })
                .collect(),
        })
    }

    async fn issue_comments(&self, repo: &Repo, number: u64) -> Result<Vec<CommentSummary>> {
        let comments: Vec<CommentWire> = self
            .client
            .get(
                format!(
                    "/repos/{}/{}/issues/{number}/comments?per_page=100",
                    repo.owner, repo.name
                ),
                None::<&()>,
            )
            .await
            .with_context(|| format!("Could not fetch comments for issue #{number} in {repo}"))?;
        Ok(comments
            .into_iter()
            .map(|c| CommentSummary {
                user: c.user.map_or_else(|| "Unknown".to_string(), |u| u.login),
                created_at: c.created_at,
                body: c.body.unwrap_or_default(),
            })
            .collect())
    }

    async fn repo_summary(&self, repo: &Repo) -> Result<RepoSummary> {
        let info: RepoWire = self
            .client
            .get(
                format!("/repos/{}/{}", repo.owner, repo.name),
                None::<&()>,
            )
            .await
            .with_context(|| format!("Failed to fetch repository {repo}"))?;

        let open_prs = self.list_pull_requests(repo).await.unwrap_or_default();
        let commits = self.list_recent_commits(repo, 5).await.unwrap_or_default();

        Ok(RepoSummary {
            name: info.full_name,
            description: info.description,
            url: info.html_url,
            stars: info.stargazers_count,
            forks: info.forks_count,
            open_issues: info.open_issues_count,
            open_prs: open_prs.len() as u64,
            recent_commits: commits
                .iter()
                .map(|c| {
                    let sha = c.sha.get(..7).unwrap_or(&c.sha);
                    format!("{sha} {}", c.message)
                })
                .collect(),
            topics: info.topics,
            created_at: info.created_at,
            last_updated: info.updated_at,
        })
    }

    async fn contributors(&self, repo: &Repo, count: u8) -> Result<Vec<Contributor>> {
        let contributors: Vec<ContributorWire> = self
            .client
            .get(
                format!(
                    "/repos/{}/{}/contributors?per_page={count}",
                    repo.owner, repo.name
                ),
                None::<&()>,
            )
            .await
            .with_context(|| format!("Failed to fetch contributors in {repo}"))?;
        Ok(contributors
            .into_iter()
            .map(|c| Contributor {
                login: c.login,
                html_url: c.html_url,
                contributions: c.contributions,
            })
            .collect())
    }

    async fn list_user_repos(&self) -> Result<Vec<String>> {
        let repos: Vec<RepoNameWire> = self
            .client
            .get("/user/repos?per_page=100&sort=updated", None::<&()>)
            .await
            .context("Failed to list repositories for the authenticated user")?;
        Ok(repos.into_iter().map(|r| r.full_name).collect())
    }

    async fn file_tree(&self, repo: &Repo, branch: &str) -> Result<Vec<TreeItem>> {
        let tree: TreeWire = self
            .client
            .get(
                format!(
                    "/repos/{}/{}/git/trees/{branch}?recursive=1",
                    repo.owner, repo.name
                ),
                None::<&()>,
            )
            .await
            .with_context(|| format!("Failed to fetch file tree for {repo} ({branch})"))?;
        Ok(tree
            .tree
            .into_iter()
            .map(|entry| TreeItem {
                path: entry.path,
                kind: if entry.kind == "tree" { "dir" } else { "file" }.to_string(),
            })
            .collect())
    }

    async fn repo_topics(&self, repo: &Repo) -> Result<Vec<String>> {
        let topics: TopicsWire = self
            .client
            .get(
                format!("/repos/{}/{}/topics", repo.owner, repo.name),
                None::<&()>,
            )
            .await
            .with_context(|| format!("Failed to fetch topics in {repo}"))?;
        Ok(topics.names)
    }

    async fn add_repo_topics(&self, repo: &Repo, topics: &[String]) -> Result<Vec<String>> {
        // Topic replacement is wholesale, so merge with what is there.
        let mut names = self.repo_topics(repo).await?;
        for topic in topics {
            let topic = topic.trim().to_lowercase();
            if !topic.is_empty() && !names.contains(&topic) {
                names.push(topic);
            }
        }

        let updated: TopicsWire = self
            .client
            .put(
                format!("/repos/{}/{}/topics", repo.owner, repo.name),
                Some(&serde_json::json!({ "names": names })),
            )
            .await
            .with_context(|| format!("Failed to update topics in {repo}"))?;
        Ok(updated.names)
    }

    async fn update_description(&self, repo: &Repo, description: &str) -> Result<String> {
        let _: serde_json::Value = self
            .client
            .patch(
                format!("/repos/{}/{}", repo.owner, repo.name),
                Some(&serde_json::json!({ "description": description })),
            )
            .await
            .with_context(|| format!("Failed to update description of {repo}"))?;
        Ok(format!("Description of {repo} updated"))
    }

    async fn repo_license(&self, repo: &Repo) -> Result<String> {
        let license: LicenseWire = self
            .client
            .get(
                format!("/repos/{}/{}/license", repo.owner, repo.name),
                None::<&()>,
            )
            .await
            .with_context(|| format!("No license information found for {repo}"))?;
        Ok(license.license.map_or_else(
            || "No license found".to_string(),
            |info| match info.spdx_id {
                Some(spdx) if spdx != "NOASSERTION" => format!("{} ({spdx})", info.name),
                _ => info.name,
            },
        ))
    }
}
