//! Message types for requests.

use crate::Role;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A single text message in a request.
///
/// # Examples
///
/// ```
/// use scriptorium_core::{Message, Role};
///
/// let message = Message::user("Write chapter one.");
/// assert_eq!(*message.role(), Role::User);
/// assert_eq!(message.content(), "Write chapter one.");
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct Message {
    /// The role of the message sender
    role: Role,
    /// The message text
    content: String,
}

impl Message {
    /// Create a message with an explicit role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system (role instruction) message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user (prompt) message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a builder for a message.
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }
}
