//! Non-interactive subcommands: one request, printed result.

use std::path::PathBuf;

use agentdeck_core::api::{BackendApi, HttpBackend};
use agentdeck_core::attachments::ImageAttachment;
use agentdeck_core::config::Config;
use agentdeck_core::controller::{ChatSession, StatusLog, StatusPoller, SubmitRejection};
use agentdeck_core::render::{render_message, HtmlRenderer, PlainTextRenderer};
use agentdeck_core::state::{BackendState, ChatMessage};
use anyhow::{bail, Context, Result};

pub async fn status(api: &HttpBackend) -> Result<()> {
    let running = api
        .backend_status()
        .await
        .with_context(|| format!("Could not reach backend at {}", api.base_url()))?;
    println!("backend: {}", BackendState::from_running(running).label());
    Ok(())
}

pub async fn models(api: &HttpBackend) -> Result<()> {
    let list = api.models().await.context("Could not list models")?;
    if list.models.is_empty() {
        println!("No models configured on the backend");
        return Ok(());
    }
    for model in &list.models {
        let marker = if list.default_model.as_deref() == Some(model.as_str()) { "*" } else { " " };
        println!("{marker} {model}");
    }
    Ok(())
}

pub async fn start(api: &HttpBackend) -> Result<()> {
    api.start_backend().await.context("Failed to start backend")?;
    println!("Backend started");
    Ok(())
}

pub async fn restart(api: &HttpBackend, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("Restarting interrupts the running task; pass --yes to confirm");
    }
    api.restart_backend().await.context("Failed to restart backend")?;
    println!("Backend restarted");
    Ok(())
}

pub async fn clear(api: &HttpBackend) -> Result<()> {
    api.clear().await.context("Failed to clear chat")?;
    println!("Chat cleared");
    Ok(())
}

pub async fn send(
    api: &HttpBackend,
    config: &Config,
    text: &str,
    images: &[PathBuf],
    html: bool,
) -> Result<()> {
    let mut log = StatusLog::new();
    let mut state = BackendState::Unknown;
    StatusPoller::apply(api.backend_status().await, &mut state, &mut log);

    let mut chat = ChatSession::new();
    for path in images {
        let image = ImageAttachment::from_path(path)?;
        chat.stage_image(image, &mut log)?;
    }

    match chat.submit(api, text, state, &mut log).await {
        Ok(()) => {}
        Err(SubmitRejection::BackendNotRunning) => {
            bail!("Backend not started; run `agentdeck start` first")
        }
        Err(SubmitRejection::Empty) => bail!("Nothing to send"),
        Err(SubmitRejection::InputDisabled) => bail!("A message is already waiting for a reply"),
    }

    let replies: Vec<&ChatMessage> = chat.messages().iter().skip(1).collect();
    if replies.is_empty() {
        println!("Sent. The agent will answer on the event channel; open the TUI to follow along.");
        return Ok(());
    }

    let options = config.format_options();
    for reply in replies {
        if reply.error {
            bail!("{}", reply.content);
        }
        let rendered = if html {
            render_message(&mut HtmlRenderer, &reply.content, &options)
        } else {
            render_message(&mut PlainTextRenderer, &reply.content, &options)
        };
        if let Some(blocks) = rendered {
            println!("{}", blocks.join(if html { "\n" } else { "\n\n" }));
        }
    }
    Ok(())
}
