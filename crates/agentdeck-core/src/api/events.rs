//! Persistent WebSocket connection on which the backend pushes chat events.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::WireMessage;
use crate::error::{Error, Result};
use crate::state::{ChatMessage, ChatRole};

/// Maximum reconnect delay.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);
/// Base reconnect delay.
const BASE_RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Connected,
    Message { role: ChatRole, message: ChatMessage },
    Disconnected(String),
}

pub struct EventChannel {
    url: String,
}

impl EventChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Run the connection loop in the background, reconnecting with backoff.
    /// The task ends once `tx` has no receiver.
    pub fn spawn(self, tx: mpsc::UnboundedSender<ChannelEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                match self.connect_once(&tx, &mut attempt).await {
                    Ok(()) => break,
                    Err(e) => {
                        tracing::warn!("Event channel failed (attempt {attempt}): {e}");
                        if tx.send(ChannelEvent::Disconnected(e.to_string())).is_err() {
                            break;
                        }
                        attempt = attempt.saturating_add(1);
                        let delay = BASE_RECONNECT_DELAY
                            .saturating_mul(2u32.saturating_pow(attempt.min(5)))
                            .min(MAX_RECONNECT_DELAY);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        })
    }

    /// `Ok` means the receiver went away and the loop should stop
    async fn connect_once(
        &self,
        tx: &mpsc::UnboundedSender<ChannelEvent>,
        attempt: &mut u32,
    ) -> Result<()> {
        let (mut ws_stream, _) = connect_async(self.url.as_str()).await?;
        tracing::info!(url = %self.url, "Event channel connected");
        *attempt = 0;
        if tx.send(ChannelEvent::Connected).is_err() {
            return Ok(());
        }

        loop {
            match ws_stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = parse_event(&text) {
                        if tx.send(event).is_err() {
                            return Ok(());
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(Error::ChannelClosed);
                }
                Some(Err(e)) => return Err(e.into()),
                // Binary, Ping/Pong frames handled by tungstenite.
                _ => {}
            }
        }
    }
}

/// Parse one pushed frame; unparseable frames are dropped
pub fn parse_event(text: &str) -> Option<ChannelEvent> {
    match serde_json::from_str::<WireMessage>(text) {
        Ok(wire) => {
            let role = wire.role();
            Some(ChannelEvent::Message {
                role,
                message: wire.into_chat_message(role),
            })
        }
        Err(e) => {
            tracing::debug!("Ignoring unparseable backend event: {e}");
            None
        }
    }
}
