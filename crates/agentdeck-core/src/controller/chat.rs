//! Chat session: the message list, staged images and the submit cycle.

use crate::api::{BackendApi, ChatRequest};
use crate::attachments::{AttachmentError, AttachmentStaging, ImageAttachment};
use crate::error::Result;
use crate::state::{BackendState, ChatMessage, ChatRole};

use super::StatusLog;

/// Why a submit did not go out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    BackendNotRunning,
    /// A previous submit is still waiting for its reply
    InputDisabled,
    Empty,
}

#[derive(Debug)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    staging: AttachmentStaging,
    input_enabled: bool,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            staging: AttachmentStaging::new(),
            input_enabled: true,
        }
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn staged(&self) -> &[ImageAttachment] {
        self.staging.images()
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Stage an image for the next message. Over the limit the image is
    /// dropped and the rejection reported.
    pub fn stage_image(
        &mut self,
        image: ImageAttachment,
        log: &mut StatusLog,
    ) -> std::result::Result<(), AttachmentError> {
        let description = image.describe();
        match self.staging.add(image) {
            Ok(()) => {
                log.info(format!("Attached {description}"));
                Ok(())
            }
            Err(e) => {
                log.error(e.to_string());
                Err(e)
            }
        }
    }

    pub fn unstage(&mut self, index: usize) -> Option<ImageAttachment> {
        self.staging.remove(index)
    }

    /// Validate and record the user's message, disabling input until
    /// [`complete_submit`](Self::complete_submit) runs. The returned request
    /// is what the caller sends to `POST /chat/`.
    pub fn begin_submit(
        &mut self,
        text: &str,
        backend: BackendState,
        log: &mut StatusLog,
    ) -> std::result::Result<ChatRequest, SubmitRejection> {
        if !backend.is_running() {
            log.error("Backend not started. Please start the backend first.");
            return Err(SubmitRejection::BackendNotRunning);
        }
        if !self.input_enabled {
            return Err(SubmitRejection::InputDisabled);
        }
        let text = text.trim();
        if text.is_empty() && self.staging.is_empty() {
            return Err(SubmitRejection::Empty);
        }

        let message = ChatMessage::user(text, self.staging.take());
        let request = ChatRequest::from_message(&message);
        self.messages.push(message);
        self.input_enabled = false;
        tracing::debug!(images = request.images_urls.len(), "Submitting message");
        Ok(request)
    }

    /// Fold the `/chat/` outcome back in. Input is re-enabled whatever the
    /// result.
    pub fn complete_submit(&mut self, result: Result<Option<ChatMessage>>, log: &mut StatusLog) {
        match result {
            Ok(Some(reply)) => self.messages.push(reply),
            // Acknowledged; the answer arrives on the event channel.
            Ok(None) => {}
            Err(e) => {
                log.error(format!("Chat request failed: {e}"));
                self.messages.push(ChatMessage::error(format!("Error: {e}")));
            }
        }
        self.input_enabled = true;
    }

    pub async fn submit<B: BackendApi + ?Sized>(
        &mut self,
        api: &B,
        text: &str,
        backend: BackendState,
        log: &mut StatusLog,
    ) -> std::result::Result<(), SubmitRejection> {
        let request = self.begin_submit(text, backend, log)?;
        let result = api.chat(&request).await;
        self.complete_submit(result, log);
        Ok(())
    }

    /// Append a message the backend pushed on its own. Echoes of the user's
    /// messages and empty messages are dropped.
    pub fn receive_async(&mut self, role: ChatRole, message: ChatMessage) -> bool {
        if role == ChatRole::User || message.is_blank() {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Clear the conversation on the backend, then locally.
    pub async fn clear<B: BackendApi + ?Sized>(&mut self, api: &B, log: &mut StatusLog) -> bool {
        let result = api.clear().await;
        self.finish_clear(result, log)
    }

    /// Local half of [`clear`](Self::clear): messages go only once the
    /// backend has dropped them too.
    pub fn finish_clear(&mut self, result: Result<()>, log: &mut StatusLog) -> bool {
        match result {
            Ok(()) => {
                self.messages.clear();
                self.staging.clear();
                log.info("Chat cleared");
                true
            }
            Err(e) => {
                log.error(format!("Failed to clear chat: {e}"));
                false
            }
        }
    }

    /// Replace the local conversation with what the backend remembers.
    pub async fn restore_history<B: BackendApi + ?Sized>(&mut self, api: &B, log: &mut StatusLog) {
        let result = api.chat_history().await;
        self.finish_restore(result, log);
    }

    pub fn finish_restore(&mut self, result: Result<Vec<ChatMessage>>, log: &mut StatusLog) {
        match result {
            Ok(history) => {
                if !history.is_empty() {
                    log.info(format!("Restored {} messages", history.len()));
                }
                self.messages = history;
            }
            Err(e) => log.error(format!("Could not load chat history: {e}")),
        }
    }

    /// Ask the backend to abandon the task in progress.
    pub async fn cancel<B: BackendApi + ?Sized>(&mut self, api: &B, log: &mut StatusLog) {
        let result = api.cancel().await;
        self.finish_cancel(result, log);
    }

    /// The backend's answer to a cancel is shown as an agent message.
    pub fn finish_cancel(&mut self, result: Result<String>, log: &mut StatusLog) {
        match result {
            Ok(answer) => {
                log.info(answer.clone());
                if !answer.trim().is_empty() {
                    self.messages.push(ChatMessage::assistant(answer));
                }
            }
            Err(e) => log.error(format!("Cancel failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::MAX_IMAGES;
    use crate::controller::fake::FakeBackend;
    use crate::controller::StatusLevel;

    fn png() -> ImageAttachment {
        ImageAttachment::from_bytes(b"\x89PNG\r\n\x1a\n0000".to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_empty_submit_sends_nothing() {
        let api = FakeBackend::running();
        let mut chat = ChatSession::new();
        let mut log = StatusLog::new();

        let outcome = chat.submit(&api, "   \n", BackendState::Running, &mut log).await;

        assert_eq!(outcome, Err(SubmitRejection::Empty));
        assert!(chat.messages().is_empty());
        assert_eq!(api.total_calls(), 0);
        assert!(chat.input_enabled());
    }

    #[tokio::test]
    async fn test_submit_requires_running_backend() {
        let api = FakeBackend::running();
        let mut chat = ChatSession::new();
        let mut log = StatusLog::new();

        let outcome = chat.submit(&api, "hello", BackendState::Stopped, &mut log).await;

        assert_eq!(outcome, Err(SubmitRejection::BackendNotRunning));
        assert!(chat.messages().is_empty());
        assert_eq!(api.calls("chat"), 0);
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_appends_user_then_reply() {
        let api = FakeBackend::running().with_reply("hi there");
        let mut chat = ChatSession::new();
        let mut log = StatusLog::new();

        chat.submit(&api, " hello ", BackendState::Running, &mut log).await.unwrap();

        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].content, "hi there");
        assert!(chat.input_enabled());
    }

    #[tokio::test]
    async fn test_acknowledged_submit_waits_for_channel() {
        let api = FakeBackend::running();
        let mut chat = ChatSession::new();
        let mut log = StatusLog::new();

        chat.submit(&api, "hello", BackendState::Running, &mut log).await.unwrap();

        assert_eq!(chat.messages().len(), 1);
        assert!(chat.input_enabled());
    }

    #[tokio::test]
    async fn test_transport_failure_reenables_input_with_one_error() {
        let api = FakeBackend::running().failing("chat");
        let mut chat = ChatSession::new();
        let mut log = StatusLog::new();

        chat.submit(&api, "hello", BackendState::Running, &mut log).await.unwrap();

        assert!(chat.input_enabled());
        let errors: Vec<_> = chat.messages().iter().filter(|m| m.error).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].role, ChatRole::Assistant);
        assert_eq!(chat.messages().len(), 2);
    }

    #[test]
    fn test_second_submit_rejected_while_in_flight() {
        let mut chat = ChatSession::new();
        let mut log = StatusLog::new();

        assert!(chat.begin_submit("one", BackendState::Running, &mut log).is_ok());
        assert!(!chat.input_enabled());
        assert_eq!(
            chat.begin_submit("two", BackendState::Running, &mut log),
            Err(SubmitRejection::InputDisabled)
        );

        chat.complete_submit(Ok(None), &mut log);
        assert!(chat.input_enabled());
        assert_eq!(chat.messages().len(), 1);
    }

    #[test]
    fn test_fifth_image_rejected() {
        let mut chat = ChatSession::new();
        let mut log = StatusLog::new();
        for _ in 0..MAX_IMAGES {
            chat.stage_image(png(), &mut log).unwrap();
        }

        let result = chat.stage_image(png(), &mut log);

        assert_eq!(result, Err(AttachmentError::LimitReached));
        assert_eq!(chat.staged().len(), MAX_IMAGES);
        assert_eq!(log.latest().unwrap().level, StatusLevel::Error);
    }

    #[tokio::test]
    async fn test_images_only_submit_consumes_staging() {
        let api = FakeBackend::running();
        let mut chat = ChatSession::new();
        let mut log = StatusLog::new();
        chat.stage_image(png(), &mut log).unwrap();
        chat.stage_image(png(), &mut log).unwrap();

        chat.submit(&api, "", BackendState::Running, &mut log).await.unwrap();

        assert!(chat.staged().is_empty());
        let requests = api.requests.lock().unwrap();
        assert_eq!(requests[0].images_urls.len(), 2);
        assert_eq!(chat.messages()[0].attachments.len(), 2);
    }

    #[test]
    fn test_rejected_submit_keeps_staging() {
        let mut chat = ChatSession::new();
        let mut log = StatusLog::new();
        chat.stage_image(png(), &mut log).unwrap();

        let _ = chat.begin_submit("hi", BackendState::Unknown, &mut log);

        assert_eq!(chat.staged().len(), 1);
    }

    #[test]
    fn test_unstage_removes_one() {
        let mut chat = ChatSession::new();
        let mut log = StatusLog::new();
        chat.stage_image(png(), &mut log).unwrap();
        chat.stage_image(png(), &mut log).unwrap();

        assert!(chat.unstage(0).is_some());
        assert!(chat.unstage(5).is_none());
        assert_eq!(chat.staged().len(), 1);
    }

    #[test]
    fn test_receive_async_ignores_user_echo() {
        let mut chat = ChatSession::new();

        assert!(!chat.receive_async(ChatRole::User, ChatMessage::user("echo", Vec::new())));
        assert!(!chat.receive_async(ChatRole::Assistant, ChatMessage::assistant("  ")));
        assert!(chat.receive_async(ChatRole::Assistant, ChatMessage::assistant("Bash ❯ ls")));
        assert_eq!(chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_failure_keeps_messages() {
        let api = FakeBackend::running().rejecting("clear");
        let mut chat = ChatSession::new();
        let mut log = StatusLog::new();
        chat.receive_async(ChatRole::Assistant, ChatMessage::assistant("keep me"));

        assert!(!chat.clear(&api, &mut log).await);
        assert_eq!(chat.messages().len(), 1);

        let api = FakeBackend::running();
        assert!(chat.clear(&api, &mut log).await);
        assert!(chat.messages().is_empty());
    }

    #[tokio::test]
    async fn test_restore_history_and_cancel() {
        let mut api = FakeBackend::running();
        api.history = vec![
            ChatMessage::user("earlier", Vec::new()),
            ChatMessage::assistant("answer"),
        ];
        let mut chat = ChatSession::new();
        let mut log = StatusLog::new();

        chat.restore_history(&api, &mut log).await;
        assert_eq!(chat.messages().len(), 2);

        chat.cancel(&api, &mut log).await;
        assert_eq!(chat.messages().last().unwrap().content, "Task cancelled");
    }

    #[test]
    fn test_failed_cancel_adds_no_message() {
        let mut chat = ChatSession::new();
        let mut log = StatusLog::new();

        chat.finish_cancel(Err(crate::error::Error::ChannelClosed), &mut log);

        assert!(chat.messages().is_empty());
        assert_eq!(log.latest().unwrap().level, StatusLevel::Error);
    }
}
