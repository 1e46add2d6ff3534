//! Repochat: natural-language front end for GitHub repository operations.
//!
//! Free-text commands are interpreted into a structured intent + parameters
//! payload, either by a local first-match-wins rule table or by a hosted
//! language model, then dispatched against the GitHub API with per-action
//! error containment. Also exports a model-context document (`mcp.json`)
//! summarising a repository, and answers free-text questions over an
//! exported document.

pub mod agent;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod export;
pub mod github;
pub mod llm;
pub mod parser;
pub mod types;

pub use agent::ContextAgent;
pub use config::Config;
pub use dispatch::Dispatcher;
pub use export::{ModelContextDocument, generate_context, write_context};
pub use github::{GitHubHost, RepoHost};
pub use llm::RemoteInterpreter;
pub use parser::{Interpreter, PatternInterpreter};
pub use types::{
    ActionBatch, ActionOutcome, CommentSummary, CommitDetail, CommitSummary, Contributor, Intent,
    Interpretation, IssueState, IssueSummary, PullSummary, Repo, RepoError, RepoSummary,
    StructuredCommand, TreeItem,
};
