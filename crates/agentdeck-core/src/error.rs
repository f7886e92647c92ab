//! Error types for agentdeck core

use thiserror::Error;

use crate::attachments::AttachmentError;

/// Main error type for backend and storage operations
#[derive(Debug, Error)]
pub enum Error {
    /// Request could not be sent or the response could not be read
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Backend answered with a non-success HTTP status
    #[error("Backend returned {status} for {operation}")]
    Status {
        operation: &'static str,
        status: reqwest::StatusCode,
    },

    /// Backend answered `success: false`
    #[error("Backend rejected {0}")]
    Rejected(&'static str),

    /// Event channel failure
    #[error("Event channel error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Event channel closed by server")]
    ChannelClosed,

    #[error("Attachment error: {0}")]
    Attachment(#[from] AttachmentError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Transport-level failures, as opposed to the backend saying no
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Network(_) | Error::WebSocket(_) | Error::ChannelClosed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
