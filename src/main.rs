//! `rag-chat` entry point.
//!
//! Parses arguments, opens the local database and settings, then dispatches
//! to the chat REPL or one of the document/status/settings commands.

use clap::{Parser, Subcommand};
use rag_chat_lib::commands::{self, AppContext};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rag-chat", version, about = "Chat with your documents over a RAG service")]
struct Cli {
    /// Base URL of the backend, overrides the stored `server_url` setting
    #[arg(long, global = true, env = "RAG_CHAT_SERVER")]
    server: Option<String>,

    /// Where the local database lives
    #[arg(long, global = true, env = "RAG_CHAT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat session
    Chat {
        /// Keep the conversation in memory only
        #[arg(long)]
        ephemeral: bool,
    },
    /// Manage indexed documents
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },
    /// Show backend status
    Status {
        /// Keep polling until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Inspect or change client settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum DocsAction {
    List,
    /// Upload one or more files
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Delete a document from the index and the server's data directory
    Delete {
        filename: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Ask the server to re-ingest its data directory
    Reload,
}

#[derive(Subcommand)]
enum SettingsAction {
    List,
    Set { key: String, value: String },
    /// Revert a key to its default
    Unset { key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "rag_chat_lib=warn",
        1 => "rag_chat_lib=info",
        _ => "rag_chat_lib=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("no data directory on this platform, pass --data-dir"))?
            .join("rag-chat"),
    };
    let ctx = AppContext::open(&data_dir, cli.server.as_deref())?;

    match cli.command {
        Commands::Chat { ephemeral } => commands::chat::run_chat(&ctx, ephemeral).await?,
        Commands::Docs { action } => match action {
            DocsAction::List => commands::documents::list_documents(&ctx).await?,
            DocsAction::Upload { paths } => {
                commands::documents::upload_documents(&ctx, paths).await?
            }
            DocsAction::Delete { filename, yes } => {
                commands::documents::delete_document(&ctx, &filename, yes).await?
            }
            DocsAction::Reload => commands::documents::reload_documents(&ctx).await?,
        },
        Commands::Status { watch } => commands::status::show_status(&ctx, watch).await?,
        Commands::Settings { action } => match action {
            SettingsAction::List => commands::settings::list_settings(&ctx)?,
            SettingsAction::Set { key, value } => {
                commands::settings::update_setting(&ctx, &key, &value)?
            }
            SettingsAction::Unset { key } => commands::settings::reset_setting(&ctx, &key)?,
        },
    }

    Ok(())
}
