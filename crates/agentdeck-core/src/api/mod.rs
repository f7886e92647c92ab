//! Client side of the agent backend's HTTP and WebSocket surface.

pub mod events;
pub mod http;

pub use events::{ChannelEvent, EventChannel};
pub use http::HttpBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::attachments::ImageAttachment;
use crate::error::Result;
use crate::state::{ChatMessage, ChatRole};

/// Everything the controllers need from the backend
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn backend_status(&self) -> Result<bool>;

    async fn models(&self) -> Result<ModelList>;

    async fn switch_model(&self, model: &str) -> Result<()>;

    /// `None` when the backend only acknowledged and will push the reply
    async fn chat(&self, request: &ChatRequest) -> Result<Option<ChatMessage>>;

    async fn clear(&self) -> Result<()>;

    async fn start_backend(&self) -> Result<()>;

    async fn restart_backend(&self) -> Result<()>;

    /// Returns the backend's human-readable answer
    async fn cancel(&self) -> Result<String>;

    async fn chat_history(&self) -> Result<Vec<ChatMessage>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub content: String,
    pub images_urls: Vec<String>,
    pub timestamp: String,
}

impl ChatRequest {
    pub fn from_message(message: &ChatMessage) -> Self {
        Self {
            content: message.content.clone(),
            images_urls: message.attachments.iter().map(|a| a.data_uri()).collect(),
            timestamp: message.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelList {
    pub models: Vec<String>,
    pub default_model: Option<String>,
}

/// A message as the backend serializes it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub images_urls: Option<Vec<String>>,
}

impl WireMessage {
    pub fn role(&self) -> ChatRole {
        self.role
            .as_deref()
            .map(ChatRole::from_wire)
            .unwrap_or(ChatRole::Assistant)
    }

    /// Convert to a chat message, dropping images that aren't valid data URIs
    pub fn into_chat_message(self, role: ChatRole) -> ChatMessage {
        let attachments: Vec<ImageAttachment> = self
            .images_urls
            .unwrap_or_default()
            .iter()
            .filter_map(|uri| match ImageAttachment::from_data_uri(uri) {
                Ok(image) => Some(image),
                Err(e) => {
                    tracing::debug!("Dropping image from backend message: {e}");
                    None
                }
            })
            .collect();
        let content = self.content.unwrap_or_default();
        match role {
            ChatRole::User => ChatMessage::user(content, attachments),
            ChatRole::Assistant => ChatMessage::assistant(content).with_attachments(attachments),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    pub is_running: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelsResponse {
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuccessResponse {
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ReplyPayload {
    Text(String),
    Message(WireMessage),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub response: Option<ReplyPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CancelResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryEntry {
    pub role: String,
    #[serde(default)]
    pub message: WireMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl ChatResponse {
    pub(crate) fn into_reply(self) -> Option<ChatMessage> {
        let message = match self.response? {
            ReplyPayload::Text(text) => ChatMessage::assistant(text),
            ReplyPayload::Message(wire) => wire.into_chat_message(ChatRole::Assistant),
        };
        (!message.is_blank()).then_some(message)
    }
}
