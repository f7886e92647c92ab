//! UI-agnostic application state types
//!
//! This module contains data structures that are shared between the TUI and the
//! one-shot CLI commands and don't depend on any specific UI framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attachments::ImageAttachment;

/// A chat message in the agent conversation
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub attachments: Vec<ImageAttachment>,
    pub timestamp: DateTime<Utc>,
    /// Synthesized locally to report a failed request
    pub error: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, attachments: Vec<ImageAttachment>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            attachments,
            timestamp: Utc::now(),
            error: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
            error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            error: true,
            ..Self::assistant(content)
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<ImageAttachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Nothing to show: blank text and no images
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty() && self.attachments.is_empty()
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    /// Anything that isn't the user is rendered as the agent speaking
    pub fn from_wire(role: &str) -> Self {
        if role.eq_ignore_ascii_case("user") {
            ChatRole::User
        } else {
            ChatRole::Assistant
        }
    }
}

/// What the UI currently believes about the backend process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendState {
    #[default]
    Unknown,
    Running,
    Stopped,
}

impl BackendState {
    pub fn from_running(is_running: bool) -> Self {
        if is_running {
            BackendState::Running
        } else {
            BackendState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        *self == BackendState::Running
    }

    pub fn label(&self) -> &'static str {
        match self {
            BackendState::Unknown => "unknown",
            BackendState::Running => "running",
            BackendState::Stopped => "stopped",
        }
    }
}
