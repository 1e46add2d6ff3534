use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::{config::Config, llm};

const FALLBACK: &str = "Sorry, I couldn't answer that. Ask about contributors, issues, \
                        pull requests, commits, or the repository itself.";

/// Answers free-text questions about a repository from a previously exported
/// model-context document.
///
/// Two strategies: a deterministic local keyword lookup over the document's
/// sections, and handing the whole document to the hosted model as grounding
/// context. Both read only the file; neither touches the GitHub API.
#[derive(Debug)]
pub struct ContextAgent {
    context: Value,
}

impl ContextAgent {
    /// Reads an exported context document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| {
            format!(
                "Could not read context file {} (generate it with --export first)",
                path.display()
            )
        })?;
        let context = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a valid context document", path.display()))?;
        Ok(Self { context })
    }

    pub fn new(context: Value) -> Self {
        Self { context }
    }

    /// Local keyword lookup, checked in a fixed order so a question touching
    /// several topics gets one deterministic answer. Unknown topics get a
    /// fixed fallback line, never an error.
    pub fn answer(&self, question: &str) -> String {
        let q = question.to_lowercase();
        let sections = &self.context["modelcontext"];

        if q.contains("contributor") {
            return list_or(&sections["contributors"], "No contributors found.", |c| {
                Some(format!(
                    "- {} ({} contributions)",
                    c["login"].as_str()?,
                    c["contributions"].as_u64()?
                ))
            });
        }

        if q.contains("issue") {
            return list_or(&sections["open_issues"], "No open issues.", |i| {
                Some(format!(
                    "- #{}: {}",
                    i["number"].as_u64()?,
                    i["title"].as_str()?
                ))
            });
        }

        if q.contains("pull request") || q.contains(" pr") {
            return list_or(
                &sections["open_pull_requests"],
                "No open pull requests.",
                |p| {
                    Some(format!(
                        "- #{}: {}",
                        p["number"].as_u64()?,
                        p["title"].as_str()?
                    ))
                },
            );
        }

        if q.contains("commit") {
            return list_or(&sections["recent_commits"], "No recent commits.", |c| {
                Some(format!(
                    "- {} | {} | {} | {}",
                    c["sha"].as_str()?,
                    c["author"].as_str()?,
                    c["date"].as_str()?,
                    c["message"].as_str()?
                ))
            });
        }

        if q.contains("describe") || q.contains("summary") || q.contains("what is this repo") {
            let repo = &sections["repository"];
            let name = repo["name"].as_str().unwrap_or("(unknown)");
            let description = repo["description"]
                .as_str()
                .unwrap_or("No description provided.");
            return format!("{name}: {description}");
        }

        FALLBACK.to_string()
    }

    /// Hands the whole document to the hosted model and returns its answer.
    pub async fn ask_model(&self, config: &Config, question: &str) -> Result<String> {
        let api_key = config
            .openrouter_api_key
            .as_deref()
            .context("OPENROUTER_API_KEY is required to ask the hosted model")?;

        let system = format!(
            "You answer questions about a GitHub repository. Ground every answer \
             in the following context document, and say so when it does not \
             contain the answer:\n\n{}",
            serde_json::to_string_pretty(&self.context)?
        );

        let reply = llm::chat_completion(
            &reqwest::Client::new(),
            api_key,
            &config.model,
            &system,
            question,
        )
        .await?;
        Ok(reply.trim().to_string())
    }
}

fn list_or<F>(section: &Value, empty: &str, line: F) -> String
where
    F: Fn(&Value) -> Option<String>,
{
    let lines: Vec<String> = section
        .as_array()
        .map(|items| items.iter().filter_map(|item| line(item)).collect())
        .unwrap_or_default();
    if lines.is_empty() {
        empty.to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_agent() -> ContextAgent {
        ContextAgent::new(serde_json::json!({
            "@context": "https://modelcontextprotocol.io/context/v1",
            "modelcontext": {
                "repository": {
                    "name": "owner/repo",
                    "description": "A test repository"
                },
                "contributors": [
                    {"login": "alice", "html_url": "https://github.com/alice", "contributions": 12}
                ],
                "recent_commits": [
                    {"sha": "abc1230", "author": "carol", "message": "initial import", "date": "2026-08-01"}
                ],
                "open_issues": [
                    {"number": 5, "title": "Fix crash", "created_at": "2026-08-01", "user": "alice"}
                ],
                "open_pull_requests": []
            }
        }))
    }

    #[test]
    fn contributor_question_lists_contributors() {
        let answer = sample_agent().answer("Who is the top contributor?");
        assert_eq!(answer, "- alice (12 contributions)");
    }

    #[test]
    fn issue_question_lists_open_issues() {
        let answer = sample_agent().answer("what open issues are there");
        assert_eq!(answer, "- #5: Fix crash");
    }

    #[test]
    fn empty_section_reports_plainly() {
        let answer = sample_agent().answer("show me the open pull requests");
        assert_eq!(answer, "No open pull requests.");
    }

    #[test]
    fn commit_question_renders_pipe_lines() {
        let answer = sample_agent().answer("recent commits?");
        assert_eq!(answer, "- abc1230 | carol | 2026-08-01 | initial import");
    }

    #[test]
    fn summary_question_names_the_repository() {
        let answer = sample_agent().answer("give me a summary");
        assert_eq!(answer, "owner/repo: A test repository");
    }

    #[test]
    fn unknown_topic_gets_the_fallback() {
        let answer = sample_agent().answer("what's the weather like");
        assert_eq!(answer, FALLBACK);
    }
}
