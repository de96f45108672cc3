use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commit_preview::logging::{self, LogConfig, LogFormat};

mod cmd;

#[derive(Parser)]
#[command(name = "commit-preview")]
#[command(version, about = "Build and serve live previews of repository commits")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format: pretty, json
    #[arg(long, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Directory containing preview.toml (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the preview HTTP server
    Serve {
        /// Port to serve on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Directory holding per-preview workspaces
        #[arg(long)]
        workspace_root: Option<PathBuf>,

        /// Disable permissive CORS
        #[arg(long)]
        no_cors: bool,
    },
    /// Detect the project type of a checked-out tree and show its recipe
    Detect {
        /// Directory to inspect
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Print the preview identifier for a repository commit
    Id {
        owner: String,
        repo: String,
        commit: String,
    },
    /// Remove the container of a preview (no-op if it is not running)
    Stop {
        id: String,

        /// Also remove the preview's image
        #[arg(long)]
        purge: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = logging::init(&LogConfig {
        format: cli.log_format,
        log_dir: cli.log_dir.clone(),
        verbose: cli.verbose,
    })?;

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Serve {
            port,
            host,
            workspace_root,
            no_cors,
        } => {
            cmd::cmd_serve(
                &project_dir,
                cmd::ServeArgs {
                    port: *port,
                    host: host.clone(),
                    workspace_root: workspace_root.clone(),
                    cors: !*no_cors,
                },
            )
            .await?;
        }
        Commands::Detect { dir } => cmd::cmd_detect(&project_dir, dir)?,
        Commands::Id {
            owner,
            repo,
            commit,
        } => cmd::cmd_id(owner, repo, commit)?,
        Commands::Stop { id, purge } => cmd::cmd_stop(&project_dir, id, *purge).await?,
    }

    Ok(())
}
