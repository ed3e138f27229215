use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::context::AppContext;

#[derive(Parser)]
#[command(name = "foundry")]
#[command(about = "Foundry CLI - drive AI-assisted document generation for manufacturing sessions", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Connection flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config file (default: ~/.config/foundry/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, e.g. https://host/api
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Bearer token
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the wizard for a session, submit the batch and follow it
    Run(commands::run::RunArgs),
    /// Rejoin sessions one after another and follow their running batches
    Watch {
        #[arg(required = true)]
        sessions: Vec<String>,
    },
    /// Ask the backend to cancel a running batch
    Cancel {
        session: String,
        /// Keep polling until the backend reports the batch cancelled
        #[arg(long)]
        wait: bool,
    },
    /// Restart a cancelled or failed batch
    Retry {
        session: String,
        /// Return right after the retry was accepted
        #[arg(long)]
        no_follow: bool,
    },
    /// Talk to the session's assistant
    Chat {
        #[command(subcommand)]
        action: commands::chat::ChatAction,
    },
    /// Read or add artifact comments
    Comment {
        #[command(subcommand)]
        action: commands::comment::CommentAction,
    },
    /// Show, edit or generate a session's lifecycle
    Lifecycle {
        #[command(subcommand)]
        action: commands::lifecycle::LifecycleAction,
    },
    /// Replace an artifact with a new file, keeping its comments
    ReplaceBlob {
        session: String,
        blob_id: String,
        file: PathBuf,
    },
    /// Flag single-source and pricing risks in a bill of materials
    InspectBom(commands::inspect_bom::InspectBomArgs),
    /// Overview of all sessions across projects
    Dashboard {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List the deliverable catalog
    Deliverables,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let global = &cli.global;
    match cli.command {
        Commands::Deliverables => commands::deliverables::list(),
        Commands::InspectBom(args) => {
            // Local files need no backend
            let ctx = match args.blob {
                Some(_) => Some(AppContext::load(global).await?),
                None => None,
            };
            commands::inspect_bom::inspect(ctx.as_ref(), args).await?
        }
        Commands::Run(args) => commands::run::run(&AppContext::load(global).await?, args).await?,
        Commands::Watch { sessions } => {
            commands::session::watch(&AppContext::load(global).await?, &sessions).await?
        }
        Commands::Cancel { session, wait } => {
            commands::session::cancel(&AppContext::load(global).await?, &session, wait).await?
        }
        Commands::Retry { session, no_follow } => {
            commands::session::retry(&AppContext::load(global).await?, &session, !no_follow).await?
        }
        Commands::Chat { action } => {
            commands::chat::execute(&AppContext::load(global).await?, action).await?
        }
        Commands::Comment { action } => {
            commands::comment::execute(&AppContext::load(global).await?, action).await?
        }
        Commands::Lifecycle { action } => {
            commands::lifecycle::execute(&AppContext::load(global).await?, action).await?
        }
        Commands::ReplaceBlob {
            session,
            blob_id,
            file,
        } => {
            let ctx = AppContext::load(global).await?;
            commands::replace_blob::replace(&ctx, &session, &blob_id, &file).await?
        }
        Commands::Dashboard { json } => {
            commands::dashboard::show(&AppContext::load(global).await?, json).await?
        }
    }

    Ok(())
}
