use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    config::Config,
    parser::{Interpreter, fill_defaults},
    types::{ActionBatch, Intent, Interpretation, Repo, StructuredCommand},
};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Remote parsing strategy backed by an OpenRouter-hosted chat model.
///
/// The model is shown the same intent/parameter taxonomy the local rule table
/// implements and asked to reply with a single JSON object (one command) or a
/// JSON array (a batch). Every failure mode here, HTTP errors included, is
/// folded into `Interpretation::Unrecognized`; nothing propagates to the
/// caller.
pub struct RemoteInterpreter {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl RemoteInterpreter {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .openrouter_api_key
            .clone()
            .context("OPENROUTER_API_KEY is required for remote command interpretation")?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            model: config.model.clone(),
        })
    }

    async fn complete(&self, input: &str, repo: &Repo) -> Result<String> {
        chat_completion(
            &self.http,
            &self.api_key,
            &self.model,
            &system_prompt(repo),
            input,
        )
        .await
    }
}

/// One round trip to the OpenRouter chat endpoint: system + user message in,
/// the first choice's content out.
pub(crate) async fn chat_completion(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    system: &str,
    user: &str,
) -> Result<String> {
    let payload = serde_json::json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user },
        ],
    });

    let response = http
        .post(OPENROUTER_URL)
        .bearer_auth(api_key)
        .json(&payload)
        .send()
        .await
        .context("request to OpenRouter failed")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("LLM request failed with {status}: {body}");
    }

    let chat: ChatResponse = response
        .json()
        .await
        .context("OpenRouter response was not valid JSON")?;
    let choice = chat
        .choices
        .into_iter()
        .next()
        .context("OpenRouter response contained no choices")?;
    Ok(choice.message.content)
}

#[async_trait]
impl Interpreter for RemoteInterpreter {
    async fn interpret(&self, input: &str, repo: &Repo) -> Interpretation {
        let input = input.trim();

        let content = match self.complete(input, repo).await {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "remote interpretation failed");
                return Interpretation::Unrecognized {
                    input: input.to_string(),
                };
            }
        };

        parse_model_output(&content, input)
    }
}

fn system_prompt(repo: &Repo) -> String {
    format!(
        "You are a GitHub assistant for the repository '{repo}'. Interpret the \
         user's natural language request and respond with JSON only: either a \
         single object {{\"intent\": ..., \"params\": {{...}}}} or an array of \
         such objects for multi-step requests. Valid intents and their \
         parameters are:\n\
         - create_pr: head, base, title (optional), body (optional)\n\
         - merge_pr: pr_number, message (optional)\n\
         - comment_pr: pr_number, comment\n\
         - create_issue: title (optional), body (optional)\n\
         - comment_issue: issue_number, comment\n\
         - list_items: item_type (issues|pull requests|branches|commits), state (optional, open|closed|all)\n\
         - view_file: file_path, branch (optional)\n\
         - view_commit: commit_sha\n\
         - list_issue_comments: issue_number\n\
         - repo_summary: no parameters\n\
         All parameter values must be strings. Do not add explanations."
    )
}

/// Parses the model's reply into a command or batch. Anything that is not
/// well-formed JSON matching the taxonomy degrades to `Unrecognized` echoing
/// the raw user input.
fn parse_model_output(content: &str, input: &str) -> Interpretation {
    let unrecognized = || Interpretation::Unrecognized {
        input: input.to_string(),
    };

    let Ok(value) = serde_json::from_str::<Value>(strip_code_fences(content)) else {
        tracing::warn!("model reply was not valid JSON");
        return unrecognized();
    };

    match value {
        Value::Object(_) => match command_from_value(&value) {
            Some(cmd) => Interpretation::Command(cmd),
            None => unrecognized(),
        },
        Value::Array(items) => {
            let commands: Vec<StructuredCommand> = items
                .iter()
                .map(|item| {
                    // A malformed batch element still occupies its slot; the
                    // dispatcher reports it without disturbing its neighbours.
                    command_from_value(item).unwrap_or_else(|| {
                        StructuredCommand::new(Intent::Unknown("<missing>".to_string()))
                    })
                })
                .collect();
            if commands.is_empty() {
                unrecognized()
            } else {
                Interpretation::Batch(ActionBatch(commands))
            }
        }
        _ => unrecognized(),
    }
}

/// Builds a StructuredCommand from one JSON object. Returns None when the
/// object carries no intent tag at all. Accepts the legacy "action" key as a
/// fallback spelling of "intent".
fn command_from_value(value: &Value) -> Option<StructuredCommand> {
    let object = value.as_object()?;
    let tag = object
        .get("intent")
        .or_else(|| object.get("action"))?
        .as_str()?;

    let mut command = StructuredCommand::new(Intent::parse(tag));

    if let Some(params) = object.get("params").and_then(Value::as_object) {
        for (key, param) in params {
            if let Some(text) = scalar_to_string(param) {
                command.params.insert(key.clone(), text);
            }
        }
    }
    // Some models inline parameters next to the intent tag instead of
    // nesting them under "params".
    for (key, param) in object {
        if key == "intent" || key == "action" || key == "params" {
            continue;
        }
        if let Some(text) = scalar_to_string(param) {
            command.params.entry(key.clone()).or_insert(text);
        }
    }

    let intent = command.intent.clone();
    fill_defaults(&intent, &mut command.params, Utc::now().date_naive());
    Some(command)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Strips a surrounding markdown code fence, which chat models add even when
/// told not to.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_object_becomes_command() {
        let reply = r#"{"intent": "merge_pr", "params": {"pr_number": "12"}}"#;
        match parse_model_output(reply, "merge pr 12") {
            Interpretation::Command(cmd) => {
                assert_eq!(cmd.intent, Intent::MergePr);
                assert_eq!(cmd.param("pr_number"), Some("12"));
                // Defaults are filled for remote output too.
                assert_eq!(cmd.param("message"), Some("Merged via MCP"));
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn array_becomes_batch() {
        let reply = r#"[
            {"intent": "list_items", "params": {"item_type": "issues"}},
            {"intent": "repo_summary"}
        ]"#;
        match parse_model_output(reply, "issues then summary") {
            Interpretation::Batch(batch) => assert_eq!(batch.len(), 2),
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[test]
    fn object_without_intent_is_unrecognized() {
        let reply = r#"{"params": {"pr_number": "12"}}"#;
        match parse_model_output(reply, "merge pr 12") {
            Interpretation::Unrecognized { input } => assert_eq!(input, "merge pr 12"),
            other => panic!("expected Unrecognized, got {other:?}"),
        }
    }

    #[test]
    fn non_json_reply_is_unrecognized() {
        match parse_model_output("I merged it for you!", "merge pr 12") {
            Interpretation::Unrecognized { input } => assert_eq!(input, "merge pr 12"),
            other => panic!("expected Unrecognized, got {other:?}"),
        }
    }

    #[test]
    fn code_fences_are_stripped() {
        let reply = "```json\n{\"intent\": \"repo_summary\"}\n```";
        match parse_model_output(reply, "summary") {
            Interpretation::Command(cmd) => assert_eq!(cmd.intent, Intent::RepoSummary),
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn legacy_action_key_is_accepted() {
        let reply = r#"{"action": "create_pr", "base": "main", "head": "dev"}"#;
        match parse_model_output(reply, "pr dev to main") {
            Interpretation::Command(cmd) => {
                assert_eq!(cmd.intent, Intent::CreatePr);
                assert_eq!(cmd.param("head"), Some("dev"));
                assert_eq!(cmd.param("title"), Some("PR from dev to main"));
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn numeric_params_are_coerced_to_strings() {
        let reply = r#"{"intent": "comment_issue", "params": {"issue_number": 5, "comment": "hi"}}"#;
        match parse_model_output(reply, "comment") {
            Interpretation::Command(cmd) => assert_eq!(cmd.param("issue_number"), Some("5")),
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn unknown_intent_survives_to_dispatch() {
        let reply = r#"{"intent": "fork_repo"}"#;
        match parse_model_output(reply, "fork it") {
            Interpretation::Command(cmd) => {
                assert_eq!(cmd.intent, Intent::Unknown("fork_repo".to_string()));
            }
            other => panic!("expected command, got {other:?}"),
        }
    }
}
