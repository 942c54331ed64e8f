//! todaytasks-login - store an issue tracker session
//!
//! Prompts for the `Cookie:` header of a logged-in browser session and saves
//! it where the issue fetcher of `todaytasks` reads it.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use todaytasks_core::{issues, Config, Translator};

#[derive(Parser)]
#[command(name = "todaytasks-login")]
#[command(about = "Store an issue tracker session for todaytasks")]
#[command(version)]
struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/todaytasks/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Translation table to use, overriding `language`
    #[arg(long)]
    lang: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    if let Some(lang) = cli.lang {
        config.language = lang;
    }

    let _log_guard =
        todaytasks_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let translator = Translator::load(&config.language)
        .with_context(|| format!("failed to load translations for '{}'", config.language))?;

    let session_file = config.jira.session_file();
    issues::login_interactive(
        &session_file,
        &translator,
        &mut io::stdin().lock(),
        &mut io::stdout(),
    )
    .context("failed to store tracker session")?;

    tracing::info!(path = %session_file.display(), "Tracker session stored");
    Ok(())
}
