//! Terminal host: command handlers behind the `rag-chat` binary.

pub mod chat;
pub mod documents;
pub mod settings;
pub mod status;

use crate::db::Database;
use crate::remote::HttpRemote;
use crate::settings::ClientSettings;
use anyhow::Context;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, Lines};

/// Shared handles every command works with.
pub struct AppContext {
    pub db: Arc<Database>,
    pub settings: ClientSettings,
    pub remote: Arc<HttpRemote>,
}

impl AppContext {
    pub fn open(data_dir: &Path, server_override: Option<&str>) -> anyhow::Result<Self> {
        let db = Database::new(data_dir)
            .with_context(|| format!("failed to open database in {}", data_dir.display()))?;
        let mut settings = ClientSettings::load(&db).context("failed to load settings")?;
        if let Some(url) = server_override {
            settings = settings.with_server_url(url)?;
        }
        let remote = HttpRemote::new(settings.remote_config())?;
        Ok(Self {
            db: Arc::new(db),
            settings,
            remote: Arc::new(remote),
        })
    }
}

/// Ask a yes/no question on stdout and read the answer from `lines`.
pub async fn confirm<R>(lines: &mut Lines<R>, prompt: &str) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
