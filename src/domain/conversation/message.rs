//! History entries: the append-only audit trail of a chat.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

/// Who produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The customer on the chat channel.
    Customer,
    /// Automatic replies from the funnel, FAQ or AI.
    Bot,
    /// A human operator writing through the dashboard.
    Admin,
    /// Notes the engine leaves for operators (never sent).
    System,
}

impl Role {
    /// Role name used when the history is handed to the reply generator.
    pub fn as_prompt_role(&self) -> &'static str {
        match self {
            Role::Customer => "user",
            Role::Bot | Role::Admin => "assistant",
            Role::System => "system",
        }
    }
}

/// One immutable line of chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: Timestamp,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl HistoryEntry {
    pub fn new(role: Role, content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn is_customer(&self) -> bool {
        self.role == Role::Customer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_map_onto_prompt_roles() {
        assert_eq!(Role::Customer.as_prompt_role(), "user");
        assert_eq!(Role::Admin.as_prompt_role(), "assistant");
        assert_eq!(Role::System.as_prompt_role(), "system");
    }

    #[test]
    fn attachments_are_omitted_when_empty() {
        let entry = HistoryEntry::new(Role::Bot, "hola", Timestamp::now());
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("attachments").is_none());
        assert_eq!(json["role"], "bot");
    }
}
