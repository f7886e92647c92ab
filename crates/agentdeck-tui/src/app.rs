use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use agentdeck_core::api::{BackendApi, ChannelEvent, ModelList};
use agentdeck_core::attachments::ImageAttachment;
use agentdeck_core::config::Config;
use agentdeck_core::controller::{
    ChatSession, LifecycleController, LifecyclePhase, ModelSelector, StatusLog, StatusPoller,
    START_RECHECK_DELAY,
};
use agentdeck_core::formatter::FormatOptions;
use agentdeck_core::prefs::{self, PreferenceStore};
use agentdeck_core::state::{BackendState, ChatMessage};
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;

use crate::theme::Theme;
use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Commands typed into the input box instead of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand<'a> {
    Image(&'a str),
    Unstage(usize),
    Invalid(&'static str),
    Message(&'a str),
}

impl<'a> InputCommand<'a> {
    pub fn parse(input: &'a str) -> Self {
        let trimmed = input.trim();
        if let Some(rest) = trimmed.strip_prefix("/image") {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                let path = rest.trim();
                return if path.is_empty() {
                    InputCommand::Invalid("Usage: /image PATH")
                } else {
                    InputCommand::Image(path)
                };
            }
        }
        if let Some(rest) = trimmed.strip_prefix("/unstage") {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return match rest.trim().parse::<usize>() {
                    Ok(n) if n > 0 => InputCommand::Unstage(n),
                    _ => InputCommand::Invalid("Usage: /unstage N (1-based)"),
                };
            }
        }
        InputCommand::Message(input)
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub theme: Theme,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Controllers
    pub chat: ChatSession,
    pub lifecycle: LifecycleController,
    pub poller: StatusPoller,
    pub models: ModelSelector,
    pub backend_state: BackendState,
    pub log: StatusLog,
    pub format_options: FormatOptions,

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub follow_tail: bool,
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Model picker state
    pub show_model_picker: bool,
    pub model_picker_state: ListState,

    pub channel_connected: bool,
    pub poll_in_flight: bool,
    pub models_loading: bool,
    status_generation: u64,

    api: Arc<dyn BackendApi>,
    prefs: Box<dyn PreferenceStore>,
    tx: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        config: &Config,
        api: Arc<dyn BackendApi>,
        prefs: Box<dyn PreferenceStore>,
        tx: UnboundedSender<AppEvent>,
    ) -> Self {
        let theme = Theme::from_pref(prefs.get(prefs::THEME).as_deref());
        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            theme,
            input: String::new(),
            cursor: 0,
            chat: ChatSession::new(),
            lifecycle: LifecycleController::new(),
            poller: StatusPoller::new(config.poll_interval()),
            models: ModelSelector::new(),
            backend_state: BackendState::Unknown,
            log: StatusLog::new(),
            format_options: config.format_options(),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_tail: true,
            animation_frame: 0,
            show_model_picker: false,
            model_picker_state: ListState::default(),
            channel_connected: false,
            poll_in_flight: false,
            models_loading: false,
            status_generation: 0,
            api,
            prefs,
            tx,
        }
    }

    /// Load what the backend already has: earlier conversation and models
    pub fn initialize(&mut self) {
        let api = Arc::clone(&self.api);
        self.spawn_request(async move { AppEvent::HistoryLoaded(api.chat_history().await) });
        self.load_models(false);
    }

    /// Run a backend request off the event loop and post its result back
    fn spawn_request<F>(&self, request: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(request.await);
        });
    }

    pub fn is_loading(&self) -> bool {
        self.lifecycle.is_busy()
    }

    pub fn is_waiting_for_reply(&self) -> bool {
        !self.chat.input_enabled()
    }

    pub fn confirming_restart(&self) -> bool {
        self.lifecycle.phase() == LifecyclePhase::ConfirmingRestart
    }

    // Input submission

    pub fn submit_input(&mut self) {
        let input = std::mem::take(&mut self.input);
        self.cursor = 0;

        match InputCommand::parse(&input) {
            InputCommand::Image(path) => self.stage_image(Path::new(path)),
            InputCommand::Unstage(n) => match self.chat.unstage(n - 1) {
                Some(image) => self.log.info(format!("Removed {}", image.describe())),
                None => self.log.error(format!("No staged image #{n}")),
            },
            InputCommand::Invalid(usage) => self.log.error(usage),
            InputCommand::Message(text) => {
                let backend = self.backend_state;
                let request = match self.chat.begin_submit(text, backend, &mut self.log) {
                    Ok(request) => request,
                    Err(_) => {
                        // Keep what the user typed when nothing was sent.
                        self.input = input.clone();
                        self.cursor = self.input.chars().count();
                        return;
                    }
                };
                self.follow_tail = true;

                let api = Arc::clone(&self.api);
                self.spawn_request(async move { AppEvent::ChatDone(api.chat(&request).await) });
            }
        }
    }

    fn stage_image(&mut self, path: &Path) {
        match ImageAttachment::from_path(path) {
            Ok(image) => {
                let _ = self.chat.stage_image(image, &mut self.log);
            }
            Err(e) => self.log.error(e.to_string()),
        }
    }

    pub fn on_chat_done(&mut self, result: agentdeck_core::Result<Option<ChatMessage>>) {
        self.chat.complete_submit(result, &mut self.log);
        self.follow_tail = true;
    }

    pub fn on_history_loaded(&mut self, result: agentdeck_core::Result<Vec<ChatMessage>>) {
        self.chat.finish_restore(result, &mut self.log);
        self.follow_tail = true;
    }

    pub fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                self.channel_connected = true;
                self.log.info("Event channel connected");
            }
            ChannelEvent::Disconnected(reason) => {
                if self.channel_connected {
                    self.log.error(format!("Event channel lost: {reason}"));
                }
                self.channel_connected = false;
            }
            ChannelEvent::Message { role, message } => {
                if self.chat.receive_async(role, message) {
                    self.follow_tail = true;
                }
            }
        }
    }

    // Backend lifecycle

    pub fn start_backend(&mut self) {
        if !self.lifecycle.begin_start(&mut self.log) {
            return;
        }
        let api = Arc::clone(&self.api);
        self.spawn_request(async move { AppEvent::StartDone(api.start_backend().await) });
    }

    pub fn on_start_done(&mut self, result: agentdeck_core::Result<()>) {
        if self.lifecycle.finish_start(result, &mut self.log) {
            self.check_status(false, Duration::ZERO);
        }
    }

    pub fn request_restart(&mut self) {
        self.lifecycle.request_restart(&mut self.log);
    }

    pub fn answer_restart(&mut self, confirmed: bool) {
        if !self.lifecycle.answer_restart(confirmed, &mut self.log) {
            return;
        }
        let api = Arc::clone(&self.api);
        self.spawn_request(async move { AppEvent::RestartDone(api.restart_backend().await) });
    }

    pub fn on_restart_done(&mut self, result: agentdeck_core::Result<()>) {
        self.lifecycle
            .finish_restart(result, &mut self.backend_state, &mut self.log);
    }

    // Status polling

    pub fn on_poll_tick(&mut self) {
        if self.poll_in_flight {
            return;
        }
        if !self.poller.should_poll(self.is_loading()) {
            tracing::debug!("Skipping status poll while loading");
            return;
        }
        self.check_status(true, Duration::ZERO);
    }

    /// Ask for the backend status after `delay`. Starting a check makes any
    /// earlier one outdated.
    fn check_status(&mut self, scheduled: bool, delay: Duration) {
        self.status_generation += 1;
        self.poll_in_flight = true;
        let generation = self.status_generation;
        let api = Arc::clone(&self.api);
        self.spawn_request(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            AppEvent::StatusChecked {
                result: api.backend_status().await,
                generation,
                scheduled,
            }
        });
    }

    pub fn on_status_checked(
        &mut self,
        result: agentdeck_core::Result<bool>,
        generation: u64,
        scheduled: bool,
    ) {
        if generation != self.status_generation {
            tracing::debug!(generation, "Dropping outdated status check");
            return;
        }
        self.poll_in_flight = false;
        // A scheduled check that raced a start or restart says nothing new.
        if scheduled && self.is_loading() {
            return;
        }
        StatusPoller::apply(result, &mut self.backend_state, &mut self.log);
        self.lifecycle.observe(self.backend_state, &mut self.log);
        if self.lifecycle.awaiting_start() {
            self.check_status(false, START_RECHECK_DELAY);
        }
    }

    // Chat housekeeping

    pub fn clear_chat(&mut self) {
        let api = Arc::clone(&self.api);
        self.spawn_request(async move { AppEvent::ClearDone(api.clear().await) });
    }

    pub fn on_clear_done(&mut self, result: agentdeck_core::Result<()>) {
        if self.chat.finish_clear(result, &mut self.log) {
            self.chat_scroll = 0;
            self.follow_tail = true;
        }
    }

    pub fn cancel_task(&mut self) {
        self.log.info("Cancelling task...");
        let api = Arc::clone(&self.api);
        self.spawn_request(async move { AppEvent::CancelDone(api.cancel().await) });
    }

    pub fn on_cancel_done(&mut self, result: agentdeck_core::Result<String>) {
        self.chat.finish_cancel(result, &mut self.log);
        self.follow_tail = true;
    }

    // Model picker methods

    fn load_models(&mut self, open_picker: bool) {
        if self.models_loading {
            return;
        }
        self.models_loading = true;
        let api = Arc::clone(&self.api);
        self.spawn_request(async move {
            AppEvent::ModelsLoaded {
                result: api.models().await,
                open_picker,
            }
        });
    }

    pub fn on_models_loaded(
        &mut self,
        result: agentdeck_core::Result<ModelList>,
        open_picker: bool,
    ) {
        self.models_loading = false;
        if !self.models.finish_load(result, &mut self.log) {
            return;
        }
        if let Some(saved) = self.models.saved_choice(&*self.prefs) {
            self.switch_model(saved);
        }
        if open_picker {
            self.show_picker();
        }
    }

    pub fn open_model_picker(&mut self) {
        if self.models.models().is_empty() {
            self.log.info("Loading models...");
            self.load_models(true);
            return;
        }
        self.show_picker();
    }

    fn show_picker(&mut self) {
        if self.models.models().is_empty() {
            self.log.error("No models available");
            return;
        }
        let current = self
            .models
            .selected()
            .and_then(|s| self.models.models().iter().position(|m| m == s))
            .unwrap_or(0);
        self.model_picker_state.select(Some(current));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.models.models().len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        self.show_model_picker = false;
        let Some(model) = self
            .model_picker_state
            .selected()
            .and_then(|i| self.models.models().get(i).cloned())
        else {
            return;
        };
        if self.models.selected() == Some(model.as_str()) {
            return;
        }
        self.switch_model(model);
    }

    /// The choice is kept and saved before the backend answers
    fn switch_model(&mut self, model: String) {
        self.models.select(&model, self.prefs.as_mut());
        let api = Arc::clone(&self.api);
        self.spawn_request(async move {
            let result = api.switch_model(&model).await;
            AppEvent::SwitchDone { model, result }
        });
    }

    pub fn on_switch_done(&mut self, model: &str, result: agentdeck_core::Result<()>) {
        self.models.finish_switch(model, result, &mut self.log);
    }

    // Theme

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        if let Err(e) = self
            .prefs
            .set(prefs::THEME, self.theme.as_str(), prefs::default_ttl())
        {
            self.log.error(format!("Could not save theme: {e}"));
        }
    }

    // Chat scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    /// The view clamps the offset and resumes following at the bottom
    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_tail = true;
    }

    pub fn page(&self) -> u16 {
        self.chat_height.saturating_sub(2).max(1)
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_waiting_for_reply() || self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}
