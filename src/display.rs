use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;
use serde_json::Value;

use crate::types::{ActionOutcome, RepoSummary};

pub fn format_relative_time(created_at: DateTime<Utc>) -> String {
    HumanTime::from(created_at).to_string()
}

/// Renders one action outcome to the writer. Failures go out as a single
/// `error:` line; successes print the message followed by whatever data the
/// action produced.
pub fn render_outcome(outcome: &ActionOutcome, out: &mut impl Write) -> Result<()> {
    match outcome {
        ActionOutcome::Failure { error } => writeln!(out, "error: {error}")?,
        ActionOutcome::Success { message, data } => {
            writeln!(out, "{message}")?;
            if let Some(data) = data {
                render_data(data, out)?;
            }
        }
    }
    Ok(())
}

pub fn render_outcomes(outcomes: &[ActionOutcome], out: &mut impl Write) -> Result<()> {
    for (index, outcome) in outcomes.iter().enumerate() {
        writeln!(out, "--- action {} ---", index + 1)?;
        render_outcome(outcome, out)?;
    }
    Ok(())
}

fn render_data(data: &Value, out: &mut impl Write) -> Result<()> {
    // Repo summaries get a dedicated layout; everything else renders either
    // as compact list lines or as pretty JSON.
    if let Ok(summary) = serde_json::from_value::<RepoSummary>(data.clone()) {
        return render_repo_summary(&summary, out);
    }

    match data {
        Value::Array(items) => {
            for item in items {
                writeln!(out, "{}", compact_line(item))?;
            }
        }
        other => writeln!(out, "{}", serde_json::to_string_pretty(other)?)?,
    }
    Ok(())
}

/// One list entry on one line, using the well-known keys when present.
fn compact_line(item: &Value) -> String {
    let Value::Object(fields) = item else {
        // Branch listings are arrays of plain strings; print them bare.
        return match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    };

    let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
    let number = fields.get("number").and_then(Value::as_u64);

    // Issue / PR summaries.
    if let (Some(number), Some(title)) = (number, text("title")) {
        let who = text("creator").or_else(|| text("author")).or_else(|| text("user"));
        let when = text("created_at").and_then(|raw| parse_when(&raw));
        return match (who, when) {
            (Some(who), Some(when)) => {
                format!("#{number}: {title} by {who} ({})", format_relative_time(when))
            }
            (Some(who), None) => format!("#{number}: {title} by {who}"),
            _ => format!("#{number}: {title}"),
        };
    }

    // Commit summaries.
    if let (Some(sha), Some(message)) = (text("sha"), text("message")) {
        let sha = sha.get(..7).unwrap_or(&sha).to_string();
        let author = text("author").unwrap_or_else(|| "Unknown".to_string());
        let date = text("date")
            .and_then(|raw| parse_when(&raw))
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        return format!("{sha} | {author} | {date} | {message}");
    }

    // Issue comment entries.
    if let (Some(user), Some(body)) = (text("user"), text("body")) {
        let when = text("created_at")
            .and_then(|raw| parse_when(&raw))
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        return format!("- {user} at {when}: {body}");
    }

    item.to_string()
}

fn parse_when(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn render_repo_summary(summary: &RepoSummary, out: &mut impl Write) -> Result<()> {
    writeln!(out, "  name:         {}", summary.name)?;
    writeln!(
        out,
        "  description:  {}",
        summary.description.as_deref().unwrap_or("(none)")
    )?;
    writeln!(out, "  url:          {}", summary.url)?;
    writeln!(
        out,
        "  stars/forks:  {} / {}",
        summary.stars, summary.forks
    )?;
    writeln!(
        out,
        "  open:         {} issues, {} pull requests",
        summary.open_issues, summary.open_prs
    )?;
    if !summary.topics.is_empty() {
        writeln!(out, "  topics:       {}", summary.topics.join(", "))?;
    }
    writeln!(
        out,
        "  created:      {}",
        summary.created_at.format("%Y-%m-%d")
    )?;
    writeln!(
        out,
        "  last updated: {} ({})",
        summary.last_updated.format("%Y-%m-%d"),
        format_relative_time(summary.last_updated)
    )?;
    for line in &summary.recent_commits {
        writeln!(out, "  commit:       {line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionOutcome;

    fn rendered(outcome: &ActionOutcome) -> String {
        let mut buf = Vec::new();
        render_outcome(outcome, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn failure_renders_single_error_line() {
        let out = rendered(&ActionOutcome::failure("PR #3 is already merged"));
        assert_eq!(out, "error: PR #3 is already merged\n");
    }

    #[test]
    fn issue_list_renders_compact_lines() {
        let outcome = ActionOutcome::success_with_data(
            "Found 1 open issues",
            serde_json::json!([
                {"number": 5, "title": "Fix crash", "creator": "alice",
                 "created_at": "2026-08-01T12:00:00Z"}
            ]),
        );
        let out = rendered(&outcome);
        assert!(out.starts_with("Found 1 open issues\n"));
        assert!(out.contains("#5: Fix crash by alice"));
    }

    #[test]
    fn branch_list_renders_bare_names() {
        let outcome = ActionOutcome::success_with_data(
            "Found 2 branches",
            serde_json::json!(["main", "dev"]),
        );
        let out = rendered(&outcome);
        assert_eq!(out, "Found 2 branches\nmain\ndev\n");
    }

    #[test]
    fn commit_list_renders_sha_pipe_format() {
        let outcome = ActionOutcome::success_with_data(
            "Last 1 commits",
            serde_json::json!([
                {"sha": "abc1234def", "author": "bob", "message": "initial import",
                 "date": "2026-08-01T12:00:00Z"}
            ]),
        );
        let out = rendered(&outcome);
        assert!(out.contains("abc1234 | bob | 2026-08-01 12:00 | initial import"));
    }
}
