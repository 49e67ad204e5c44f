//! LLM Council terminal client
//!
//! Logs go to a file as JSON so they never mix with the terminal UI.

use council_client::api::HttpBackend;
use council_client::config::ClientConfig;
use council_client::runtime::{ConversationController, Workspace};
use council_client::tui;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const UI_EVENT_CAPACITY: usize = 256;

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::from_env();

    if let Some(parent) = config.log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "council_client=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();

    tracing::info!(api_url = %config.api_url, "Starting council client");

    let backend = Arc::new(HttpBackend::new(&config)?);
    let (events, _) = broadcast::channel(UI_EVENT_CAPACITY);
    let controller = ConversationController::new(Workspace::shared(), backend, events);

    // The sidebar shows the failure; the client stays usable offline
    if let Err(e) = controller.list().refresh().await {
        tracing::warn!(error = %e, "Initial conversation listing failed");
    }

    let mut terminal = setup_terminal()?;
    let result = tui::run(&mut terminal, &controller).await;
    restore_terminal(&mut terminal)?;

    controller.shutdown().await;
    tracing::info!("Council client stopped");

    result?;
    Ok(())
}
