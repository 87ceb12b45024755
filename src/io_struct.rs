use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed assistant persona, prepended to every upstream request. Never
/// supplied or overridable by the caller.
pub const SYSTEM_PROMPT: &str = "You are a versatile AI assistant that responds with clear, \
concise, and accurate answers. Always provide helpful context, cite assumptions, and format \
output for readability using markdown when appropriate.";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChatModel {
    #[default]
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl ChatModel {
    pub const ALL: [ChatModel; 3] = [ChatModel::Gpt4oMini, ChatModel::Gpt4o, ChatModel::Gpt35Turbo];

    pub fn parse(value: &str) -> Option<ChatModel> {
        match value {
            "gpt-4o-mini" => Some(ChatModel::Gpt4oMini),
            "gpt-4o" => Some(ChatModel::Gpt4o),
            "gpt-3.5-turbo" => Some(ChatModel::Gpt35Turbo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatModel::Gpt4oMini => "gpt-4o-mini",
            ChatModel::Gpt4o => "gpt-4o",
            ChatModel::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChatModel::Gpt4oMini => "GPT-4o Mini",
            ChatModel::Gpt4o => "GPT-4o",
            ChatModel::Gpt35Turbo => "GPT-3.5 Turbo",
        }
    }
}

/// Raw `POST /api/chat` payload. Entries are kept as loose JSON values so a
/// malformed entry can be dropped during sanitization instead of failing the
/// whole parse.
#[derive(Debug, Deserialize)]
pub struct ChatReqInput {
    pub model: Option<String>,
    pub messages: Option<Vec<Value>>,
}

impl ChatReqInput {
    /// Fail-fast validation: model allow-list, then non-empty history, then
    /// per-entry sanitization with the system instruction prepended.
    pub fn validate(self) -> Result<ValidatedChat, RelayError> {
        let model = self
            .model
            .as_deref()
            .and_then(ChatModel::parse)
            .ok_or(RelayError::UnsupportedModel)?;

        let raw = self.messages.unwrap_or_default();
        if raw.is_empty() {
            return Err(RelayError::EmptyHistory);
        }

        let mut messages = vec![ChatMessage::new(Role::System, SYSTEM_PROMPT)];
        messages.extend(raw.iter().filter_map(sanitize_entry));

        Ok(ValidatedChat { model, messages })
    }
}

/// Keep an entry only if its role is exactly "user" or "assistant" and its
/// content is a JSON string. Anything else (including "system") is dropped.
fn sanitize_entry(entry: &Value) -> Option<ChatMessage> {
    let role = match entry.get("role")?.as_str()? {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        _ => return None,
    };
    let content = entry.get("content")?.as_str()?;
    Some(ChatMessage::new(role, content))
}

/// A validated request: allow-listed model plus the sanitized history with
/// the system instruction in first position.
#[derive(Debug)]
pub struct ValidatedChat {
    pub model: ChatModel,
    pub messages: Vec<ChatMessage>,
}

/// What the client sends to the relay endpoint.
#[derive(Debug, Serialize)]
pub struct OutboundRequest {
    pub model: ChatModel,
    pub messages: Vec<ChatMessage>,
}

/// What the relay sends to the upstream completion API.
#[derive(Debug, Serialize)]
pub struct UpstreamChatRequest {
    pub model: ChatModel,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub temperature: f32,
}

impl From<ValidatedChat> for UpstreamChatRequest {
    fn from(req: ValidatedChat) -> Self {
        UpstreamChatRequest {
            model: req.model,
            messages: req.messages,
            stream: true,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Incremental parser for the upstream SSE stream. Bytes go in as they
/// arrive off the wire; completed text deltas come out in order. Frames may
/// be split at arbitrary byte boundaries, so input is buffered until a blank
/// line terminates a frame.
pub struct SseDeltaParser {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDeltaParser {
    pub fn new() -> Self {
        SseDeltaParser {
            buffer: Vec::new(),
            done: false,
        }
    }

    /// True once the `[DONE]` sentinel has been seen; later input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut deltas = Vec::new();
        if self.done {
            return deltas;
        }
        self.buffer.extend_from_slice(chunk);
        while let Some(frame) = self.next_frame() {
            if let Some(delta) = self.process_frame(&frame) {
                deltas.push(delta);
            }
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        deltas
    }

    fn next_frame(&mut self) -> Option<Vec<u8>> {
        let lf = find_subslice(&self.buffer, b"\n\n").map(|i| (i, 2));
        let crlf = find_subslice(&self.buffer, b"\r\n\r\n").map(|i| (i, 4));
        let (end, sep_len) = match (lf, crlf) {
            (Some(a), Some(b)) => {
                if a.0 <= b.0 {
                    a
                } else {
                    b
                }
            }
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => return None,
        };
        let frame = self.buffer[..end].to_vec();
        self.buffer.drain(..end + sep_len);
        Some(frame)
    }

    fn process_frame(&mut self, frame: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(frame);
        let mut data_lines: Vec<&str> = Vec::new();
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("data:") {
                data_lines.push(rest.trim_start());
            }
        }
        if data_lines.is_empty() {
            return None;
        }

        let payload = data_lines.join("\n");
        if payload == "[DONE]" {
            self.done = true;
            return None;
        }

        match serde_json::from_str::<ChatCompletionChunk>(&payload) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .filter(|content| !content.is_empty()),
            Err(err) => {
                log::warn!("Failed to parse streaming chunk: {}", err);
                None
            }
        }
    }
}

impl Default for SseDeltaParser {
    fn default() -> Self {
        Self::new()
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
