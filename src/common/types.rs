use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::timestamp::ClientTimestamp;
use crate::storage::models::PersistedMessage;

/// Domain model đại diện một tin nhắn chat phía client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: String,
    pub content: String,
    pub timestamp: ClientTimestamp,
}

impl From<&PersistedMessage> for ChatMessage {
    fn from(message: &PersistedMessage) -> Self {
        Self {
            id: message.id.to_string(),
            role: message.role.clone(),
            content: message.content.clone(),
            timestamp: ClientTimestamp::parse(&message.timestamp),
        }
    }
}

/// Roles the chat store accepts on write. Reads pass roles through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
