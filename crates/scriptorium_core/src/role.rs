//! Role types for conversation participants.

use serde::{Deserialize, Serialize};

/// Who a message is attributed to.
///
/// # Examples
///
/// ```
/// use scriptorium_core::Role;
///
/// assert_ne!(Role::System, Role::User);
/// assert_eq!(format!("{}", Role::System), "System");
/// assert_eq!(Role::Assistant.as_wire(), "assistant");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub enum Role {
    /// Role instructions that frame every request
    System,
    /// The prompt itself
    User,
    /// Prior model output fed back as context
    Assistant,
}

impl Role {
    /// Lower-case role name used by chat-style wire formats.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}
