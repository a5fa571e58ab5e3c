//! Chat client cli definition and entrypoint.
use anyhow::{Context, Result};
use clap::Parser;
use mbtichat_core::config::get_config;
use mbtichat_core::persona::Persona;

use crate::log::setup_logging;
use crate::prefs::PrefsStore;
use crate::relay::HttpRelay;
use crate::repl;
use crate::session::ChatSession;

/// Mbtichat - chat with an MBTI persona over a relay endpoint.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Relay endpoint to connect to, e.g. http://127.0.0.1:8042.
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Persona tag to start with, e.g. INTJ.
    #[arg(short, long)]
    persona: Option<Persona>,

    /// Show verbose logs.
    #[arg(short, long)]
    verbose: bool,
}

/// Runs the main CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        setup_logging().context("Failed to set up logging")?;
    }

    // Load configuration
    let config = get_config(None).context("Failed to load configuration")?;

    let endpoint = cli.endpoint.unwrap_or(config.client.endpoint);
    let persona = cli.persona.unwrap_or(config.chat.persona);

    let prefs = PrefsStore::open_default().context("Failed to open preference store")?;
    let session = ChatSession::new(HttpRelay::new(&endpoint), persona);

    repl::run(session, prefs).await
}
