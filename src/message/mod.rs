pub mod message;

pub use message::{AssistantMessage, Message, Role, SystemMessage, UserMessage};
