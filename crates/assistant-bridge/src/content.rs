/// Author of a thread message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message written by the caller.
    #[default]
    User,
    /// Message written by the assistant.
    Assistant,
}

/// Text body plus annotations as returned by the API.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextContent {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<serde_json::Value>,
}

impl TextContent {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            annotations: Vec::new(),
        }
    }
}

/// One content part of a stored message.
///
/// Only text is interpreted; image and file parts decode as `Other`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

/// A message stored on a thread (`thread.message` object).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Concatenates all text parts in order and ignores non-text parts.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.content {
            if let MessageContent::Text { text } = part {
                out.push_str(&text.value);
            }
        }
        out
    }

    /// Returns true when the message carries at least one text part.
    pub fn has_text(&self) -> bool {
        self.content
            .iter()
            .any(|part| matches!(part, MessageContent::Text { .. }))
    }
}

/// Request body for adding a message to a thread.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
}

impl NewMessage {
    /// A message from the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A message attributed to the assistant (for seeding a thread).
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Payload of a `thread.message.delta` event.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MessageDeltaEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    pub delta: MessageDelta,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub content: Vec<MessageDeltaContent>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MessageDeltaContent {
    pub index: u32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
}

impl MessageDeltaEvent {
    /// Builds a delta carrying a single text fragment.
    pub fn text(id: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "thread.message.delta".to_string(),
            delta: MessageDelta {
                content: vec![MessageDeltaContent {
                    index: 0,
                    kind: "text".to_string(),
                    text: Some(TextContent::new(fragment)),
                }],
            },
        }
    }

    /// Text fragments of this delta joined in index order.
    pub fn fragment(&self) -> String {
        let mut parts: Vec<&MessageDeltaContent> = self
            .delta
            .content
            .iter()
            .filter(|part| part.text.is_some())
            .collect();
        parts.sort_by_key(|part| part.index);
        parts
            .into_iter()
            .filter_map(|part| part.text.as_ref())
            .map(|text| text.value.as_str())
            .collect()
    }
}
