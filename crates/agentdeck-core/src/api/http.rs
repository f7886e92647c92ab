use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{
    BackendApi, CancelResponse, ChatRequest, ChatResponse, HistoryResponse, ModelList,
    ModelsResponse, StatusResponse, SuccessResponse,
};
use crate::error::{Error, Result};
use crate::state::{ChatMessage, ChatRole};

#[derive(Serialize)]
struct SwitchModelRequest<'a> {
    model: &'a str,
}

/// HTTP client for the backend's REST endpoints
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        operation: &'static str,
    ) -> Result<T> {
        tracing::debug!(operation, path, "GET");
        let response = self.client.get(self.url(path)).send().await?;

        if !response.status().is_success() {
            return Err(Error::Status {
                operation,
                status: response.status(),
            });
        }

        Ok(response.json().await?)
    }

    async fn post_json<B, T>(
        &self,
        path: &str,
        body: Option<&B>,
        operation: &'static str,
    ) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        tracing::debug!(operation, path, "POST");
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(Error::Status {
                operation,
                status: response.status(),
            });
        }

        Ok(response.json().await?)
    }

    async fn post_action(&self, path: &str, operation: &'static str) -> Result<()> {
        let response: SuccessResponse = self.post_json::<(), _>(path, None, operation).await?;
        if response.success {
            Ok(())
        } else {
            Err(Error::Rejected(operation))
        }
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn backend_status(&self) -> Result<bool> {
        let response: StatusResponse = self.get_json("/backend_status", "status").await?;
        Ok(response.is_running)
    }

    async fn models(&self) -> Result<ModelList> {
        let response: ModelsResponse = self.get_json("/models/", "list models").await?;
        Ok(ModelList {
            models: response.models.unwrap_or_default(),
            default_model: response.default_model,
        })
    }

    async fn switch_model(&self, model: &str) -> Result<()> {
        let response: SuccessResponse = self
            .post_json("/switch_model/", Some(&SwitchModelRequest { model }), "switch model")
            .await?;
        if response.success {
            Ok(())
        } else {
            Err(Error::Rejected("switch model"))
        }
    }

    async fn chat(&self, request: &ChatRequest) -> Result<Option<ChatMessage>> {
        let response: ChatResponse = self.post_json("/chat/", Some(request), "chat").await?;
        Ok(response.into_reply())
    }

    async fn clear(&self) -> Result<()> {
        self.post_action("/clear/", "clear").await
    }

    async fn start_backend(&self) -> Result<()> {
        self.post_action("/start_backend/", "start backend").await
    }

    async fn restart_backend(&self) -> Result<()> {
        self.post_action("/restart_backend/", "restart backend").await
    }

    async fn cancel(&self) -> Result<String> {
        let response: CancelResponse = self.post_json::<(), _>("/cancel/", None, "cancel").await?;
        Ok(response.message)
    }

    async fn chat_history(&self) -> Result<Vec<ChatMessage>> {
        let response: HistoryResponse =
            self.get_json("/initial_chat_history", "chat history").await?;
        Ok(response
            .history
            .into_iter()
            .map(|entry| entry.message.into_chat_message(ChatRole::from_wire(&entry.role)))
            .filter(|message| !message.is_blank())
            .collect())
    }
}
