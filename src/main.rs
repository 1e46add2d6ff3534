use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use repochat::{
    Config, ContextAgent, Dispatcher, GitHubHost, Interpretation, Interpreter, PatternInterpreter,
    Repo, RemoteInterpreter, RepoHost, display, export,
};

#[derive(Parser, Debug)]
#[command(name = "repochat")]
#[command(
    about = "Talk to your GitHub repositories in plain English - list, inspect and act on issues, PRs, commits and files"
)]
#[command(version)]
struct Cli {
    /// GitHub repository, 'owner/repo' or a github.com URL
    #[arg(short = 'r', long = "repo", value_name = "OWNER/REPO")]
    repo: Option<String>,

    /// The natural-language command to run
    #[arg(value_name = "COMMAND", trailing_var_arg = true)]
    command: Vec<String>,

    /// Use the hosted model instead of the local strategy (for COMMAND and --ask)
    #[arg(long)]
    remote: bool,

    /// Answer a question about the repository from an exported context file
    #[arg(long, value_name = "QUESTION", help_heading = "Direct operations")]
    ask: Option<String>,

    /// Context file read by --ask
    #[arg(long = "context-file", value_name = "FILE", default_value = "mcp.json")]
    context_file: PathBuf,

    /// List repositories for the authenticated user
    #[arg(long = "list-repos", help_heading = "Direct operations")]
    list_repos: bool,

    /// Write the model-context file for the repository
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "mcp.json",
        help_heading = "Direct operations"
    )]
    export: Option<PathBuf>,

    /// Print the repository file tree
    #[arg(long, help_heading = "Direct operations")]
    tree: bool,

    /// Branch for --tree
    #[arg(long, default_value = "main", value_name = "NAME")]
    branch: String,

    /// Print the repository license
    #[arg(long, help_heading = "Direct operations")]
    license: bool,

    /// Update the repository description
    #[arg(long = "set-description", value_name = "TEXT", help_heading = "Direct operations")]
    set_description: Option<String>,

    /// Add repository topics (comma-separated)
    #[arg(
        long = "add-topics",
        value_name = "TOPIC",
        value_delimiter = ',',
        help_heading = "Direct operations"
    )]
    add_topics: Vec<String>,

    /// Print outcomes as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn validate(&self) -> Result<()> {
        let has_direct_op = self.list_repos
            || self.ask.is_some()
            || self.export.is_some()
            || self.tree
            || self.license
            || self.set_description.is_some()
            || !self.add_topics.is_empty();

        if !has_direct_op && self.command.is_empty() {
            anyhow::bail!(
                "Nothing to do: pass a natural-language command or one of the direct operations (see --help)"
            );
        }
        // --list-repos and --ask are repository-independent: the former asks
        // about the user, the latter reads only the context file.
        if !self.list_repos && self.ask.is_none() && self.repo.is_none() {
            anyhow::bail!(
                "Repository (--repo) is required for everything except --list-repos and --ask"
            );
        }
        Ok(())
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Runs the direct (non-natural-language) operations requested by flags.
async fn run_direct_ops(cli: &Cli, host: &GitHubHost, repo: Option<&Repo>) -> Result<()> {
    if cli.list_repos {
        for name in host.list_user_repos().await? {
            println!("{name}");
        }
    }

    let Some(repo) = repo else {
        return Ok(());
    };

    if let Some(description) = &cli.set_description {
        println!("{}", host.update_description(repo, description).await?);
    }

    if !cli.add_topics.is_empty() {
        let topics = host.add_repo_topics(repo, &cli.add_topics).await?;
        println!("Topics of {repo}: {}", topics.join(", "));
    }

    if cli.license {
        println!("{}", host.repo_license(repo).await?);
    }

    if cli.tree {
        for item in host.file_tree(repo, &cli.branch).await? {
            println!("{} {}", if item.kind == "dir" { "d" } else { "-" }, item.path);
        }
    }

    if let Some(path) = &cli.export {
        let document = export::generate_context(host, repo)
            .await
            .with_context(|| format!("Failed to generate model context for {repo}"))?;
        export::write_context(path, &document)?;
        println!("Model context written to {}", path.display());
    }

    Ok(())
}

async fn run_command(
    cli: &Cli,
    config: &Config,
    host: GitHubHost,
    repo: &Repo,
    input: &str,
) -> Result<bool> {
    let interpreter: Box<dyn Interpreter + Send + Sync> = if cli.remote {
        Box::new(RemoteInterpreter::new(config)?)
    } else {
        Box::new(PatternInterpreter::new())
    };

    let dispatcher = Dispatcher::new(host);
    let mut stdout = std::io::stdout();

    let all_ok = match interpreter.interpret(input, repo).await {
        Interpretation::Unrecognized { input } => {
            eprintln!("Could not interpret command: '{input}'");
            false
        }
        Interpretation::Command(cmd) => {
            let outcome = dispatcher.execute(repo, &cmd).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                display::render_outcome(&outcome, &mut stdout)?;
            }
            !outcome.is_failure()
        }
        Interpretation::Batch(batch) => {
            let outcomes = dispatcher.run_batch(repo, &batch).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcomes)?);
            } else {
                display::render_outcomes(&outcomes, &mut stdout)?;
            }
            outcomes.iter().all(|o| !o.is_failure())
        }
    };

    Ok(all_ok)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    cli.validate()?;

    // The only fault allowed to kill the process: missing credentials,
    // before any command runs.
    let config = Config::from_env()?;
    let host = GitHubHost::new(&config)?;

    if let Some(question) = &cli.ask {
        let agent = ContextAgent::load(&cli.context_file)?;
        let answer = if cli.remote {
            agent.ask_model(&config, question).await?
        } else {
            agent.answer(question)
        };
        println!("{answer}");
    }

    let repo = cli
        .repo
        .as_deref()
        .map(|r| {
            Repo::parse(r).map_err(|e| anyhow::anyhow!("Invalid repository '{r}': {e}"))
        })
        .transpose()?;

    run_direct_ops(&cli, &host, repo.as_ref()).await?;

    if cli.command.is_empty() {
        return Ok(());
    }

    let repo = repo.context("Repository (--repo) is required to run a command")?;
    let input = cli.command.join(" ");
    let ok = run_command(&cli, &config, host, &repo, &input).await?;

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
