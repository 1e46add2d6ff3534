use std::process::Command;

use anyhow::{Context, Result};

pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat-v3-0324:free";

/// Process-wide configuration, read once at startup and passed by reference
/// into everything that needs it. A missing GitHub credential is the only
/// fatal error in the program and it fires here, before any command runs.
#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: String,
    pub openrouter_api_key: Option<String>,
    pub model: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_token =
            resolve_github_token().context("Failed to obtain GitHub authentication token")?;

        let openrouter_api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let model =
            std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self {
            github_token,
            openrouter_api_key,
            model,
        })
    }
}

fn resolve_github_token() -> Result<String> {
    // Environment variables win; the gh CLI is a fallback so a machine set up
    // with `gh auth login` works without exporting anything.
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            return Ok(token);
        }
    }

    let output = Command::new("gh").args(["auth", "token"]).output()?;
    if !output.status.success() {
        anyhow::bail!(
            "gh CLI could not provide a token; run 'gh auth login' or set GITHUB_TOKEN"
        );
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("gh CLI returned an empty token");
    }

    Ok(token)
}
