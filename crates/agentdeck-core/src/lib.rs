pub mod api;
pub mod attachments;
pub mod config;
pub mod controller;
pub mod error;
pub mod formatter;
pub mod prefs;
pub mod render;
pub mod state;

// Re-export main types for convenience
pub use api::{BackendApi, ChannelEvent, ChatRequest, EventChannel, HttpBackend, ModelList};
pub use attachments::{AttachmentError, AttachmentStaging, ImageAttachment, MAX_IMAGES};
pub use config::Config;
pub use controller::{
    ChatSession, LifecycleController, LifecyclePhase, ModelSelector, StatusLog, StatusPoller,
};
pub use error::{Error, Result};
pub use formatter::{format, FormatOptions, Inline, ListKind, Segment};
pub use prefs::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use render::{render_message, HtmlRenderer, PlainTextRenderer, SegmentRenderer};
pub use state::{BackendState, ChatMessage, ChatRole};
