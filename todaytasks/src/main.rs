//! todaytasks - terminal tracker for the ticket you are working on
//!
//! Terminal UI over the work store, with background synchronizers for the
//! issue tracker, pull requests and meeting reminders.

mod app;
mod process_lock;
mod ui;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use todaytasks_core::desktop::{Desktop, SystemDesktop};
use todaytasks_core::issues::{self, IssueCache};
use todaytasks_core::{store, workers, AppContext, Config, NoticeSource, Translator, WorkStore};

use crate::app::App;

#[derive(Parser)]
#[command(name = "todaytasks")]
#[command(about = "Track the current ticket, its subtasks and today's meetings")]
#[command(version)]
struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/todaytasks/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Work store file, overriding `storage.data_file`
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Translation table to use, overriding `language`
    #[arg(long)]
    lang: Option<String>,

    /// Print the numbered ticket list and exit
    #[arg(long)]
    list: bool,

    /// Do not start the issue tracker and code review workers
    #[arg(long)]
    no_sync: bool,
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
    if let Some(path) = cli.data_file {
        config.storage.data_file = Some(path);
    }
    config.validate().context("invalid configuration")?;

    // Initialize logging (to file, not stdout since we have a TUI)
    let _log_guard =
        todaytasks_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let translator = Translator::load(&config.language)
        .with_context(|| format!("failed to load translations for '{}'", config.language))?;

    let data_file = config.storage.data_file();
    tracing::info!(path = %data_file.display(), "Loading work store");
    let loaded = store::load(&data_file);

    if cli.list {
        print_ticket_list(&loaded.store, &translator);
        return Ok(());
    }

    tracing::info!("todaytasks starting up");
    let _lock = process_lock::acquire(&data_file).context("failed to acquire process lock")?;

    let issues = IssueCache::load(&config.storage.issue_cache_file());
    let (ctx, issue_queue) = AppContext::new(config, translator, data_file, loaded.store, issues);
    if let Some(problem) = loaded.problem {
        let text = ctx.translator.t("storage_load_failed", &[("e", &problem)]);
        ctx.notices.raise(NoticeSource::Storage, text);
    }
    let ctx = Arc::new(ctx);

    let desktop: Arc<dyn Desktop> = Arc::new(SystemDesktop::new(&ctx.config.notifications));
    let handles = if cli.no_sync {
        drop(issue_queue);
        tracing::info!("Background sync disabled");
        workers::spawn_event_notifier(&ctx, desktop).into_iter().collect()
    } else {
        workers::spawn_all(&ctx, issue_queue, desktop)
    };
    tracing::info!(count = handles.len(), "Workers running");

    let mut app = App::new(Arc::clone(&ctx));

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    // Run the main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    // Workers notice within one wait step; an in-flight request is abandoned.
    ctx.stop();
    tracing::info!("todaytasks shutting down");

    result
}

fn print_ticket_list(work: &WorkStore, tr: &Translator) {
    let tickets = work.displayable_tickets();
    if tickets.is_empty() {
        println!("{}", tr.t("list_empty", &[]));
        return;
    }
    let paused = tr.t("ui_paused_marker", &[]);
    for (i, ticket) in tickets.iter().enumerate() {
        if work.is_paused(ticket) {
            println!("{}. {} ({})", i + 1, ticket, paused);
        } else {
            println!("{}. {}", i + 1, ticket);
        }
    }
}

/// Run the main application loop.
fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }

        if app.login_requested {
            app.login_requested = false;
            run_login(terminal, app)?;
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Leave the alternate screen, read a tracker session from the terminal,
/// then restore the UI.
fn run_login(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    let ctx = Arc::clone(&app.ctx);
    let session_file = ctx.config.jira.session_file();
    let result = issues::login_interactive(
        &session_file,
        &ctx.translator,
        &mut io::stdin().lock(),
        &mut io::stdout(),
    );
    match result {
        Ok(()) => {
            ctx.notices.resolve(NoticeSource::Tracker);
            let queued = ctx.refetch_all_issues();
            tracing::info!(queued, "Tracker session stored, refetching issues");
            app.notice = None;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Tracker login failed");
            app.notice = Some(ctx.translator.t("login_failed", &[("e", &e)]));
        }
    }

    enable_raw_mode().context("failed to enable raw mode")?;
    execute!(terminal.backend_mut(), EnterAlternateScreen)
        .context("failed to enter alternate screen")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok(())
}
