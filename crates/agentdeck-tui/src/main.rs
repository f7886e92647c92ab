use std::path::PathBuf;
use std::sync::Arc;

use agentdeck_core::api::{BackendApi, HttpBackend};
use agentdeck_core::config::Config;
use agentdeck_core::prefs::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod app;
mod commands;
mod handler;
mod markdown;
mod theme;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

const DEFAULT_LOG_FILTER: &str = "agentdeck=info,agentdeck_core=info";

#[derive(Parser)]
#[command(name = "agentdeck")]
#[command(version, about = "Chat with and control an AI-agent backend from the terminal")]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "AGENTDECK_BACKEND_URL", global = true)]
    backend_url: Option<String>,

    /// Seconds between backend status checks
    #[arg(long, env = "AGENTDECK_POLL_INTERVAL", global = true)]
    poll_interval: Option<u64>,

    /// Config file (defaults to the user config directory)
    #[arg(long, env = "AGENTDECK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Only treat fenced text as code
    #[arg(long, global = true)]
    no_implicit_code: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive terminal UI (default)
    Tui,
    /// Print whether the backend is running
    Status,
    /// List the models the backend offers
    Models,
    /// Start the backend
    Start,
    /// Restart the backend
    Restart {
        /// Confirm the restart
        #[arg(long)]
        yes: bool,
    },
    /// Send one message and print the reply
    Send {
        /// Message text
        text: String,
        /// Image to attach (repeatable, at most 4)
        #[arg(long = "image", value_name = "PATH")]
        images: Vec<PathBuf>,
        /// Print the reply as HTML instead of plain text
        #[arg(long)]
        html: bool,
    },
    /// Clear the backend's conversation
    Clear,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::load().context("Failed to load config")?,
        };

        if let Some(url) = &self.backend_url {
            config.backend_url = url.clone();
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
        if self.no_implicit_code {
            config.implicit_code_blocks = false;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    match cli.command.unwrap_or(Command::Tui) {
        Command::Tui => {
            let _guard = init_file_logging()?;
            run_tui(config).await
        }
        Command::Status => commands::status(&one_shot(&config)?).await,
        Command::Models => commands::models(&one_shot(&config)?).await,
        Command::Start => commands::start(&one_shot(&config)?).await,
        Command::Restart { yes } => commands::restart(&one_shot(&config)?, yes).await,
        Command::Send { text, images, html } => {
            commands::send(&one_shot(&config)?, &config, &text, &images, html).await
        }
        Command::Clear => commands::clear(&one_shot(&config)?).await,
    }
}

/// One-shot commands log to stderr and talk to the backend directly
fn one_shot(config: &Config) -> Result<HttpBackend> {
    init_stderr_logging();
    backend(config)
}

fn backend(config: &Config) -> Result<HttpBackend> {
    HttpBackend::new(&config.backend_url, config.request_timeout())
        .context("Failed to build HTTP client")
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// The TUI owns the terminal, so logs go to a file in the data directory
fn init_file_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = dirs::data_dir()
        .or_else(dirs::home_dir)
        .context("Could not determine data directory")?
        .join("agentdeck");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::never(&log_dir, "agentdeck.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();
}

fn open_preferences() -> Box<dyn PreferenceStore> {
    match FilePreferenceStore::open_default() {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::warn!("Preferences will not persist: {e}");
            Box::new(MemoryPreferenceStore::new())
        }
    }
}

async fn run_tui(config: Config) -> Result<()> {
    tracing::info!(backend = %config.backend_url, "Starting agentdeck");

    let api: Arc<dyn BackendApi> = Arc::new(backend(&config)?);
    let mut events = EventHandler::new(config.poll_interval());
    let mut app = App::new(&config, api, open_preferences(), events.sender());
    app.initialize();

    if config.event_channel {
        events.forward_channel(config.event_channel_url());
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run_loop(&mut terminal, &mut app, &mut events).await;
    tui::restore()?;

    tracing::info!("agentdeck exiting");
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}
