//! Scripted in-process backend for controller tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{BackendApi, ChatRequest, ModelList};
use crate::error::{Error, Result};
use crate::state::ChatMessage;

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub running: Mutex<bool>,
    pub models: Vec<String>,
    pub default_model: Option<String>,
    pub reply: Option<String>,
    pub history: Vec<ChatMessage>,
    /// Operations that answer with a transport failure
    pub failing: Vec<&'static str>,
    /// Operations that answer `success: false`
    pub rejecting: Vec<&'static str>,
    calls: Mutex<HashMap<&'static str, usize>>,
    pub requests: Mutex<Vec<ChatRequest>>,
    pub switched: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn running() -> Self {
        let backend = Self::default();
        *backend.running.lock().unwrap() = true;
        backend
    }

    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.push(operation);
        self
    }

    pub fn rejecting(mut self, operation: &'static str) -> Self {
        self.rejecting.push(operation);
        self
    }

    pub fn with_models(mut self, models: &[&str], default_model: Option<&str>) -> Self {
        self.models = models.iter().map(|m| m.to_string()).collect();
        self.default_model = default_model.map(str::to_string);
        self
    }

    pub fn with_reply(mut self, reply: &str) -> Self {
        self.reply = Some(reply.to_string());
        self
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().get(operation).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn record(&self, operation: &'static str) -> Result<()> {
        *self.calls.lock().unwrap().entry(operation).or_default() += 1;
        if self.failing.contains(&operation) {
            return Err(Error::ChannelClosed);
        }
        if self.rejecting.contains(&operation) {
            return Err(Error::Rejected(operation));
        }
        Ok(())
    }
}

#[async_trait]
impl BackendApi for FakeBackend {
    async fn backend_status(&self) -> Result<bool> {
        self.record("status")?;
        Ok(*self.running.lock().unwrap())
    }

    async fn models(&self) -> Result<ModelList> {
        self.record("models")?;
        Ok(ModelList {
            models: self.models.clone(),
            default_model: self.default_model.clone(),
        })
    }

    async fn switch_model(&self, model: &str) -> Result<()> {
        self.record("switch model")?;
        self.switched.lock().unwrap().push(model.to_string());
        Ok(())
    }

    async fn chat(&self, request: &ChatRequest) -> Result<Option<ChatMessage>> {
        self.record("chat")?;
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.reply.as_ref().map(ChatMessage::assistant))
    }

    async fn clear(&self) -> Result<()> {
        self.record("clear")
    }

    async fn start_backend(&self) -> Result<()> {
        self.record("start backend")?;
        *self.running.lock().unwrap() = true;
        Ok(())
    }

    async fn restart_backend(&self) -> Result<()> {
        self.record("restart backend")?;
        *self.running.lock().unwrap() = true;
        Ok(())
    }

    async fn cancel(&self) -> Result<String> {
        self.record("cancel")?;
        Ok("Task cancelled".to_string())
    }

    async fn chat_history(&self) -> Result<Vec<ChatMessage>> {
        self.record("chat history")?;
        Ok(self.history.clone())
    }
}
