//! Common imports for working with the Bedrock runtime.
//!
//! ```rust,no_run
//! use bedrock_ox::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Bedrock::new("your-api-key");
//! let response = client
//!     .text()
//!     .with_system_prompt("You are a helpful assistant.")
//!     .with_prompt("Hello!")
//!     .as_text()
//!     .await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub use crate::{
    Bedrock, BedrockRequestError, TextRequest, TextResponse,
    gateway::{BedrockGateway, TextStreamEvent},
    message::{AssistantMessage, Message, Role, SystemMessage, UserMessage},
    meta::Meta,
    usage::Usage,
};
