use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use regex::Regex;

use crate::types::{Intent, Interpretation, Repo, StructuredCommand};

/// A parsing strategy: free text plus the selected repository in, a
/// structured command (or batch, or a contained parse failure) out.
///
/// Implementations must never let a fault escape; anything they cannot
/// interpret comes back as `Interpretation::Unrecognized`.
#[async_trait]
pub trait Interpreter {
    async fn interpret(&self, input: &str, repo: &Repo) -> Interpretation;
}

/// One row of the rule table: a pattern, the intent it maps to, and the
/// parameter names its capture groups bind to (positionally).
struct Rule {
    pattern: Regex,
    intent: Intent,
    params: &'static [&'static str],
}

/// Local pattern-based strategy.
///
/// Rules are evaluated in table order, first match wins. Matching is
/// case-insensitive against the trimmed input so quoted titles and comment
/// bodies keep their original casing in the captured parameters. A capture
/// group that matched nothing is an absent parameter, not an empty string.
/// New intents are added by appending rows, not by adding branches.
pub struct PatternInterpreter {
    rules: Vec<Rule>,
}

// Table order matters: comment rules before the more general create/list
// rules, and issue-comment listing before the generic list_items rule.
const RULE_TABLE: &[(&str, &str, &[&str])] = &[
    (
        r#"^create\s+(?:a\s+)?(?:new\s+)?(?:pull\s+request|pr)\s+from\s+(\S+)\s+to\s+(\S+)(?:\s+with\s+title\s+"([^"]+)")?(?:\s+(?:and\s+)?(?:with\s+)?body\s+"([^"]+)")?$"#,
        "create_pr",
        &["head", "base", "title", "body"],
    ),
    (
        r#"^merge\s+(?:pull\s+request|pr)\s+#?(\d+)(?:\s+with\s+message\s+"([^"]+)")?$"#,
        "merge_pr",
        &["pr_number", "message"],
    ),
    (
        r#"^comment\s+on\s+(?:pull\s+request|pr)\s+#?(\d+)\s+with\s+"([^"]+)"$"#,
        "comment_pr",
        &["pr_number", "comment"],
    ),
    (
        r#"^create\s+(?:a\s+)?(?:new\s+)?issue(?:\s+(?:titled|with\s+title)\s+"([^"]+)")?(?:\s+(?:and\s+)?(?:with\s+)?body\s+"([^"]+)")?$"#,
        "create_issue",
        &["title", "body"],
    ),
    (
        r#"^comment\s+on\s+issue\s+#?(\d+)\s+with\s+"([^"]+)"$"#,
        "comment_issue",
        &["issue_number", "comment"],
    ),
    (
        r"^(?:list|show)\s+(?:the\s+)?comments\s+(?:on|for)\s+issue\s+#?(\d+)$",
        "list_issue_comments",
        &["issue_number"],
    ),
    (
        r"^(?:list|show)\s+(?:all\s+)?(open|closed)?\s*(issues|pull\s+requests|prs|branches|commits)$",
        "list_items",
        &["state", "item_type"],
    ),
    (
        r"^(?:view|show|open)\s+file\s+(\S+)(?:\s+(?:on|from)\s+(?:branch\s+)?(\S+))?$",
        "view_file",
        &["file_path", "branch"],
    ),
    (
        r"^(?:view|show)\s+commit\s+([0-9a-fA-F]{6,40})$",
        "view_commit",
        &["commit_sha"],
    ),
    (
        r"^(?:(?:give\s+me\s+|show\s+)?(?:a\s+)?summary\s+of\s+(?:the\s+|this\s+)?repo(?:sitory)?|describe\s+(?:the\s+|this\s+)?repo(?:sitory)?|repo\s+summary)$",
        "repo_summary",
        &[],
    ),
];

impl PatternInterpreter {
    pub fn new() -> Self {
        let rules = RULE_TABLE
            .iter()
            .map(|&(pattern, tag, params)| Rule {
                pattern: Regex::new(&format!("(?i){pattern}"))
                    .expect("rule table patterns are compile-time constants"),
                intent: Intent::parse(tag),
                params,
            })
            .collect();
        Self { rules }
    }

    /// Matches the input against the rule table and fills intent-specific
    /// defaults. Deterministic: the same input always produces the same
    /// command.
    pub fn parse(&self, input: &str) -> Interpretation {
        let input = input.trim();

        for rule in &self.rules {
            let Some(captures) = rule.pattern.captures(input) else {
                continue;
            };

            let mut params = BTreeMap::new();
            for (index, name) in rule.params.iter().enumerate() {
                if let Some(value) = captures.get(index + 1) {
                    params.insert((*name).to_string(), value.as_str().to_string());
                }
            }

            fill_defaults(&rule.intent, &mut params, Utc::now().date_naive());

            return Interpretation::Command(StructuredCommand {
                intent: rule.intent.clone(),
                params,
            });
        }

        Interpretation::Unrecognized {
            input: input.to_string(),
        }
    }
}

impl Default for PatternInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Interpreter for PatternInterpreter {
    async fn interpret(&self, input: &str, _repo: &Repo) -> Interpretation {
        self.parse(input)
    }
}

/// Fills the intent-specific default parameters so every command leaving the
/// parser is fully resolved.
pub fn fill_defaults(intent: &Intent, params: &mut BTreeMap<String, String>, today: NaiveDate) {
    match intent {
        Intent::CreatePr => {
            if !params.contains_key("title") {
                let head = params.get("head").cloned().unwrap_or_default();
                let base = params.get("base").cloned().unwrap_or_default();
                params.insert("title".to_string(), format!("PR from {head} to {base}"));
            }
            params.entry("body".to_string()).or_default();
        }
        Intent::MergePr => {
            params
                .entry("message".to_string())
                .or_insert_with(|| "Merged via MCP".to_string());
        }
        Intent::CreateIssue => {
            params
                .entry("title".to_string())
                .or_insert_with(|| format!("Issue created on {}", today.format("%Y-%m-%d")));
            params.entry("body".to_string()).or_default();
        }
        Intent::ListItems => {
            params
                .entry("state".to_string())
                .or_insert_with(|| "open".to_string());
            // Normalise shorthand so the dispatcher sees one spelling.
            if let Some(item_type) = params.get_mut("item_type") {
                let collapsed = item_type.to_lowercase();
                let collapsed = collapsed.split_whitespace().collect::<Vec<_>>().join(" ");
                *item_type = if collapsed == "prs" {
                    "pull requests".to_string()
                } else {
                    collapsed
                };
            }
        }
        Intent::ViewFile => {
            params
                .entry("branch".to_string())
                .or_insert_with(|| "main".to_string());
        }
        Intent::CommentPr
        | Intent::CommentIssue
        | Intent::ViewCommit
        | Intent::ListIssueComments
        | Intent::RepoSummary
        | Intent::Unknown(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Interpretation {
        PatternInterpreter::new().parse(input)
    }

    fn expect_command(input: &str) -> StructuredCommand {
        match parse(input) {
            Interpretation::Command(cmd) => cmd,
            other => panic!("expected a command for '{input}', got {other:?}"),
        }
    }

    #[test]
    fn create_pr_with_quoted_title() {
        let cmd = expect_command(r#"create a new pull request from dev to main with title "New Feature""#);
        assert_eq!(cmd.intent, Intent::CreatePr);
        assert_eq!(cmd.param("head"), Some("dev"));
        assert_eq!(cmd.param("base"), Some("main"));
        assert_eq!(cmd.param("title"), Some("New Feature"));
        assert_eq!(cmd.param("body"), Some(""));
    }

    #[test]
    fn create_pr_default_title() {
        let cmd = expect_command("create pull request from feature-x to main");
        assert_eq!(cmd.param("title"), Some("PR from feature-x to main"));
        assert_eq!(cmd.param("body"), Some(""));
    }

    #[test]
    fn merge_pr_fills_default_message() {
        let cmd = expect_command("merge pull request #12");
        assert_eq!(cmd.intent, Intent::MergePr);
        assert_eq!(cmd.param("pr_number"), Some("12"));
        assert_eq!(cmd.param("message"), Some("Merged via MCP"));
    }

    #[test]
    fn merge_pr_keeps_explicit_message() {
        let cmd = expect_command(r#"merge pr #7 with message "ship it""#);
        assert_eq!(cmd.param("message"), Some("ship it"));
    }

    #[test]
    fn list_open_issues() {
        let cmd = expect_command("list open issues");
        assert_eq!(cmd.intent, Intent::ListItems);
        assert_eq!(cmd.param("state"), Some("open"));
        assert_eq!(cmd.param("item_type"), Some("issues"));
    }

    #[test]
    fn list_items_defaults_to_open() {
        let cmd = expect_command("list branches");
        assert_eq!(cmd.param("state"), Some("open"));
        assert_eq!(cmd.param("item_type"), Some("branches"));
    }

    #[test]
    fn list_prs_shorthand_is_normalised() {
        let cmd = expect_command("list prs");
        assert_eq!(cmd.param("item_type"), Some("pull requests"));
    }

    #[test]
    fn comment_on_pr() {
        let cmd = expect_command(r#"comment on pr #3 with "Looks good to me""#);
        assert_eq!(cmd.intent, Intent::CommentPr);
        assert_eq!(cmd.param("pr_number"), Some("3"));
        assert_eq!(cmd.param("comment"), Some("Looks good to me"));
    }

    #[test]
    fn comment_on_issue() {
        let cmd = expect_command(r#"comment on issue #5 with "Looks good""#);
        assert_eq!(cmd.intent, Intent::CommentIssue);
        assert_eq!(cmd.param("issue_number"), Some("5"));
        assert_eq!(cmd.param("comment"), Some("Looks good"));
    }

    #[test]
    fn create_issue_defaults_title_to_today() {
        let cmd = expect_command("create issue");
        assert_eq!(cmd.intent, Intent::CreateIssue);
        let expected = format!(
            "Issue created on {}",
            Utc::now().date_naive().format("%Y-%m-%d")
        );
        assert_eq!(cmd.param("title"), Some(expected.as_str()));
        assert_eq!(cmd.param("body"), Some(""));
    }

    #[test]
    fn view_file_defaults_branch_to_main() {
        let cmd = expect_command("view file src/lib.rs");
        assert_eq!(cmd.intent, Intent::ViewFile);
        assert_eq!(cmd.param("file_path"), Some("src/lib.rs"));
        assert_eq!(cmd.param("branch"), Some("main"));
    }

    #[test]
    fn view_file_with_explicit_branch() {
        let cmd = expect_command("show file README.md on branch develop");
        assert_eq!(cmd.param("branch"), Some("develop"));
    }

    #[test]
    fn view_commit_takes_abbreviated_sha() {
        let cmd = expect_command("view commit abc1234");
        assert_eq!(cmd.intent, Intent::ViewCommit);
        assert_eq!(cmd.param("commit_sha"), Some("abc1234"));
    }

    #[test]
    fn issue_comment_listing_wins_over_list_items() {
        let cmd = expect_command("list comments on issue #9");
        assert_eq!(cmd.intent, Intent::ListIssueComments);
        assert_eq!(cmd.param("issue_number"), Some("9"));
    }

    #[test]
    fn repo_summary_variants() {
        for input in [
            "give me a summary of the repo",
            "Describe this repository",
            "repo summary",
        ] {
            assert_eq!(expect_command(input).intent, Intent::RepoSummary);
        }
    }

    #[test]
    fn unmatched_input_echoes_normalised_text() {
        match parse("  make me a sandwich  ") {
            Interpretation::Unrecognized { input } => {
                assert_eq!(input, "make me a sandwich");
            }
            other => panic!("expected Unrecognized, got {other:?}"),
        }
    }

    #[test]
    fn parsing_is_idempotent() {
        let parser = PatternInterpreter::new();
        let first = parser.parse("merge pull request #12");
        let second = parser.parse("merge pull request #12");
        match (first, second) {
            (Interpretation::Command(a), Interpretation::Command(b)) => assert_eq!(a, b),
            other => panic!("expected two commands, got {other:?}"),
        }
    }
}
