use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{Display, EnumString};

/// Conversational role in the provider's chat schema.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A system prompt segment.
///
/// Serializes to a bare text fragment carrying the ephemeral cache
/// annotation, for the request's `system` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemMessage {
    pub content: String,
}

impl SystemMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "type": "text",
            "text": self.content,
            "cache_control": { "type": "ephemeral" }
        })
    }
}

/// A user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub content: String,
}

impl UserMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "role": Role::User,
            "content": [{ "type": "text", "text": self.content }]
        })
    }
}

/// An assistant turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantMessage {
    pub content: String,
}

impl AssistantMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "role": Role::Assistant,
            "content": [{ "type": "text", "text": self.content }]
        })
    }
}

/// One entry of a conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    System(SystemMessage),
    User(UserMessage),
    Assistant(AssistantMessage),
}

impl Message {
    pub fn content(&self) -> &str {
        match self {
            Message::System(message) => &message.content,
            Message::User(message) => &message.content,
            Message::Assistant(message) => &message.content,
        }
    }

    /// Wire form inside the `messages` array.
    ///
    /// A system message placed here serializes as a user-role turn; only the
    /// dedicated system-prompt list reaches the request's `system` array.
    pub fn to_value(&self) -> Value {
        match self {
            Message::System(message) => UserMessage::new(&*message.content).to_value(),
            Message::User(message) => message.to_value(),
            Message::Assistant(message) => message.to_value(),
        }
    }
}

macro_rules! string_conversions {
    ($target:ident) => {
        impl From<&str> for $target {
            fn from(content: &str) -> Self {
                Self::new(content)
            }
        }

        impl From<String> for $target {
            fn from(content: String) -> Self {
                Self::new(content)
            }
        }
    };
}

string_conversions!(SystemMessage);
string_conversions!(UserMessage);
string_conversions!(AssistantMessage);

impl From<SystemMessage> for Message {
    fn from(message: SystemMessage) -> Self {
        Message::System(message)
    }
}

impl From<UserMessage> for Message {
    fn from(message: UserMessage) -> Self {
        Message::User(message)
    }
}

impl From<AssistantMessage> for Message {
    fn from(message: AssistantMessage) -> Self {
        Message::Assistant(message)
    }
}

impl From<&str> for Message {
    fn from(content: &str) -> Self {
        Message::User(UserMessage::new(content))
    }
}

impl From<String> for Message {
    fn from(content: String) -> Self {
        Message::User(UserMessage::new(content))
    }
}
