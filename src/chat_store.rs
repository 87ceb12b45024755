use crate::io_struct::{ChatMessage, ChatModel, Role};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A conversation entry. Assistant content is mutated in place while a reply
/// streams in; entries are never removed individually, only cleared wholesale.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory conversation transcript plus the selected model. Owned by a
/// single writer and handed to consumers explicitly; nothing is persisted.
#[derive(Debug, Clone)]
pub struct ChatStore {
    messages: Vec<StoredMessage>,
    model: ChatModel,
}

impl ChatStore {
    pub fn new() -> Self {
        ChatStore {
            messages: Vec::new(),
            model: ChatModel::default(),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> Uuid {
        self.push(Role::User, content.into())
    }

    /// Append an empty assistant placeholder to stream a reply into.
    pub fn push_assistant(&mut self) -> Uuid {
        self.push(Role::Assistant, String::new())
    }

    fn push(&mut self, role: Role, content: String) -> Uuid {
        let id = Uuid::new_v4();
        self.messages.push(StoredMessage {
            id,
            role,
            content,
            created_at: Utc::now(),
        });
        id
    }

    /// Transform a message's content in place. Returns false when the id is
    /// unknown.
    pub fn update<F>(&mut self, id: Uuid, f: F) -> bool
    where
        F: FnOnce(&str) -> String,
    {
        match self.messages.iter_mut().find(|message| message.id == id) {
            Some(message) => {
                message.content = f(&message.content);
                true
            }
            None => false,
        }
    }

    pub fn replace_content(&mut self, id: Uuid, content: impl Into<String>) -> bool {
        let content = content.into();
        self.update(id, |_| content)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn set_model(&mut self, model: ChatModel) {
        self.model = model;
    }

    pub fn model(&self) -> ChatModel {
        self.model
    }

    pub fn messages(&self) -> &[StoredMessage] {
        &self.messages
    }

    /// Role/content snapshot of the transcript (ids and timestamps dropped),
    /// oldest first — the shape sent to the relay endpoint.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|message| ChatMessage::new(message.role, message.content.clone()))
            .collect()
    }
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}
