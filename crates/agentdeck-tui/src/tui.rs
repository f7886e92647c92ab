use std::io::{self, Stderr};
use std::time::Duration;

use agentdeck_core::api::{ChannelEvent, EventChannel, ModelList};
use agentdeck_core::state::ChatMessage;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

/// Everything the event loop reacts to: terminal input, timers, pushed
/// backend events and the results of requests running on spawned tasks.
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
    /// Scheduled backend status check is due
    Poll,
    Channel(ChannelEvent),
    ChatDone(agentdeck_core::Result<Option<ChatMessage>>),
    HistoryLoaded(agentdeck_core::Result<Vec<ChatMessage>>),
    ModelsLoaded {
        result: agentdeck_core::Result<ModelList>,
        open_picker: bool,
    },
    SwitchDone {
        model: String,
        result: agentdeck_core::Result<()>,
    },
    ClearDone(agentdeck_core::Result<()>),
    CancelDone(agentdeck_core::Result<String>),
    StartDone(agentdeck_core::Result<()>),
    RestartDone(agentdeck_core::Result<()>),
    /// Only the result tagged with the latest generation is applied
    StatusChecked {
        result: agentdeck_core::Result<bool>,
        generation: u64,
        scheduled: bool,
    },
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventHandler {
    pub fn new(poll_interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        // Spawn event reader task
        let tx_events = tx.clone();
        tokio::spawn(async move {
            let mut reader = event::EventStream::new();
            while let Some(evt) = reader.next().await {
                let app_event = match evt {
                    // Only handle key press events, not release
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        Some(AppEvent::Key(key))
                    }
                    Ok(Event::Mouse(mouse)) => Some(AppEvent::Mouse(mouse)),
                    Ok(Event::Resize(w, h)) => Some(AppEvent::Resize(w, h)),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::warn!("Terminal event error: {e}");
                        None
                    }
                };

                if let Some(event) = app_event {
                    if tx_events.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        // Spawn tick timer for animations (300ms interval)
        let tx_tick = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(300));
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        // Backend status timer; the first tick fires immediately
        let tx_poll = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx_poll.send(AppEvent::Poll).is_err() {
                    break;
                }
            }
        });

        Self { rx, tx }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    /// Connect to the backend's event channel and forward what it pushes
    pub fn forward_channel(&self, url: String) {
        let (channel_tx, mut channel_rx) = mpsc::unbounded_channel();
        EventChannel::new(url).spawn(channel_tx);

        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(event) = channel_rx.recv().await {
                if tx.send(AppEvent::Channel(event)).is_err() {
                    break;
                }
            }
        });
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen)?;

    // Enable mouse capture
    execute!(io::stderr(), crossterm::event::EnableMouseCapture)?;

    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend)?;

    Ok(terminal)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), crossterm::event::DisableMouseCapture)?;
    execute!(io::stderr(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Install panic hook to restore terminal on panic
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}
