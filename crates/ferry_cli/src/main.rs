//! Ferry CLI - command-line interface for the import pipeline.

mod commands;
mod config;
mod progress;
mod shutdown;

use clap::{Parser, Subcommand};
use console::Term;
use ferry::Platform;
use tracing_subscriber::EnvFilter;

use crate::commands::OutputFormat;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(version)]
#[command(about = "Import workspaces from Slack, Linear and Todoist")]
#[command(
    long_about = "Ferry imports channels, teams and projects together with their messages, \
issues, tasks and comments from external platforms. Runs are idempotent: importing \
the same workspace twice creates nothing new."
)]
#[command(after_long_help = r#"EXAMPLES
    Check that a token works:
        $ ferry validate slack

    Import two Slack channels including threads:
        $ ferry run slack --filter general --filter eng --threads

    Import a Linear team with comments, as JSON:
        $ ferry run linear --filter ENG --comments --output json

    Generate shell completions:
        $ ferry completions bash > ~/.local/share/bash-completion/completions/ferry

CONFIGURATION
    Ferry reads configuration from:
      1. ~/.config/ferry/config.toml (or $XDG_CONFIG_HOME/ferry/config.toml)
      2. ./ferry.toml
      3. Environment variables (FERRY_* prefix, e.g., FERRY_SLACK_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    FERRY_SLACK_TOKEN       Slack bot or user token
    FERRY_LINEAR_TOKEN      Linear personal API key or OAuth token
    FERRY_TODOIST_TOKEN     Todoist API token
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a connection and show workspace information
    Validate {
        /// Platform to connect to (slack, linear, todoist)
        platform: Platform,

        /// API token (default from config or environment)
        #[arg(short, long)]
        token: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Run an import
    Run {
        /// Platform to import from (slack, linear, todoist)
        platform: Platform,

        /// API token (default from config or environment)
        #[arg(short, long)]
        token: Option<String>,

        #[command(flatten)]
        import_opts: ImportOptions,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Options controlling what an import run fetches.
#[derive(Debug, Clone, clap::Args)]
struct ImportOptions {
    /// Only import these containers (id or name, repeatable)
    #[arg(short, long = "filter")]
    filters: Vec<String>,

    /// Only import items created on or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    from: Option<String>,

    /// Only import items created on or before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    to: Option<String>,

    /// Expand chat threads
    #[arg(long)]
    threads: bool,

    /// Expand issue and task comments
    #[arg(long)]
    comments: bool,

    /// Include completed issues and tasks
    #[arg(long)]
    completed: bool,

    /// Include archived containers and items
    #[arg(long)]
    archived: bool,

    /// Record attachment references
    #[arg(long)]
    files: bool,

    /// Containers imported concurrently (default from config or 3)
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Items stored between progress updates (default from config or 20)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Abort the run after this many seconds
    #[arg(long)]
    max_run_secs: Option<u64>,

    /// External team/workspace id recorded on the connection
    #[arg(long)]
    team_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    shutdown::setup_shutdown_handler();

    // Structured logging only when not attached to a terminal
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("ferry=info,ferry_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = config::Config::load();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            platform,
            token,
            output,
        } => {
            commands::validate::handle_validate(platform, token, output, &config).await?;
        }
        Commands::Run {
            platform,
            token,
            import_opts,
            output,
        } => {
            commands::run::handle_run(platform, token, import_opts, output, &config).await?;
        }
        Commands::Completions { shell } => {
            commands::meta::handle_completions(shell)?;
        }
    }

    Ok(())
}
