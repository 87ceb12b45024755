use crate::chat_store::ChatStore;
use crate::error::SessionError;
use crate::io_struct::{ChatMessage, OutboundRequest, Role};
use futures_util::StreamExt;
use serde::Deserialize;
use uuid::Uuid;

const RELAY_ERROR_FALLBACK: &str = "Unexpected error. Please try again.";

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    error: Option<String>,
}

/// Submission controller: owns the conversation store and drives one
/// request through the relay at a time. The one-in-flight invariant lives
/// here, not in whatever UI embeds it.
pub struct ChatSession {
    store: ChatStore,
    client: reqwest::Client,
    endpoint: String,
    in_flight: bool,
}

impl ChatSession {
    pub fn new(relay_url: impl Into<String>) -> Self {
        let relay_url = relay_url.into();
        ChatSession {
            store: ChatStore::new(),
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/chat", relay_url.trim_end_matches('/')),
            in_flight: false,
        }
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ChatStore {
        &mut self.store
    }

    /// True while a submission is outstanding. A UI can poll this to disable
    /// its input control.
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    pub async fn submit(&mut self, prompt: &str) -> Result<(), SessionError> {
        self.submit_with(prompt, |_| {}).await
    }

    /// Submit a prompt and stream the reply into the transcript, invoking
    /// `on_delta` for each fragment as it arrives. An empty prompt is a
    /// no-op. On failure the assistant placeholder is annotated with the
    /// error instead of being removed.
    pub async fn submit_with<F>(&mut self, prompt: &str, on_delta: F) -> Result<(), SessionError>
    where
        F: FnMut(&str),
    {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Ok(());
        }
        self.try_begin()?;

        let mut outbound = self.store.history();
        outbound.push(ChatMessage::new(Role::User, prompt));
        self.store.push_user(prompt);
        let assistant_id = self.store.push_assistant();

        let result = self.stream_reply(assistant_id, outbound, on_delta).await;
        if let Err(err) = &result {
            self.store
                .replace_content(assistant_id, format!("⚠️ {}", err));
        }
        self.finish();
        result
    }

    fn try_begin(&mut self) -> Result<(), SessionError> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        self.in_flight = true;
        Ok(())
    }

    fn finish(&mut self) {
        self.in_flight = false;
    }

    async fn stream_reply<F>(
        &mut self,
        assistant_id: Uuid,
        messages: Vec<ChatMessage>,
        mut on_delta: F,
    ) -> Result<(), SessionError>
    where
        F: FnMut(&str),
    {
        let request = OutboundRequest {
            model: self.store.model(),
            messages,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let message = match resp.json::<RelayErrorBody>().await {
                Ok(RelayErrorBody { error: Some(error) }) if !error.is_empty() => error,
                _ => RELAY_ERROR_FALLBACK.to_string(),
            };
            return Err(SessionError::Relay(message));
        }

        let mut stream = resp.bytes_stream();
        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let text = String::from_utf8_lossy(&chunk);
            on_delta(&text);
            reply.push_str(&text);
            self.store.update(assistant_id, |_| reply.clone());
        }

        self.store
            .update(assistant_id, |content| content.trim_end().to_string());
        Ok(())
    }
}
