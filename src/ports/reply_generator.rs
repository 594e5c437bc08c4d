//! Reply generator port - the AI collaborator that drafts free-text replies.
//!
//! The engine treats every implementation as unreliable: calls are wrapped in
//! a timeout and any failure falls back to the human-handoff message.
//!
//! # Example
//!
//! ```ignore
//! let request = ReplyRequest::new(chat_id, "Respondé como asesora de ventas")
//!     .with_history(state.recent_history(15));
//! let text = generator.generate_reply(request).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::conversation::HistoryEntry;
use crate::domain::foundation::{ChatId, DomainError, ErrorCode};

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Produces the bot's next message for the chat.
    async fn generate_reply(&self, request: ReplyRequest) -> Result<String, ReplyError>;

    /// Provider name for logs.
    fn name(&self) -> &'static str;
}

/// Role of a prompt message, as chat-completion APIs name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&HistoryEntry> for PromptMessage {
    fn from(entry: &HistoryEntry) -> Self {
        let role = match entry.role.as_prompt_role() {
            "user" => PromptRole::User,
            "system" => PromptRole::System,
            _ => PromptRole::Assistant,
        };
        Self::new(role, entry.content.clone())
    }
}

/// Chat context plus what the bot should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRequest {
    pub chat_id: ChatId,
    pub history: Vec<PromptMessage>,
    pub instruction: String,
}

impl ReplyRequest {
    pub fn new(chat_id: ChatId, instruction: impl Into<String>) -> Self {
        Self {
            chat_id,
            history: Vec::new(),
            instruction: instruction.into(),
        }
    }

    pub fn with_history(mut self, history: &[HistoryEntry]) -> Self {
        self.history = history.iter().map(PromptMessage::from).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("provider returned an empty reply")]
    EmptyReply,

    #[error("reply generation timed out after {0}s")]
    Timeout(u64),

    #[error("reply generation is disabled")]
    Disabled,
}

impl ReplyError {
    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReplyError::RateLimited { .. }
                | ReplyError::Unavailable(_)
                | ReplyError::Network(_)
                | ReplyError::Timeout(_)
        )
    }
}

impl From<ReplyError> for DomainError {
    fn from(err: ReplyError) -> Self {
        DomainError::new(ErrorCode::AIProviderError, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::Role;
    use crate::domain::foundation::Timestamp;

    #[test]
    fn reply_generator_is_object_safe() {
        fn _accepts_dyn(_gen: &dyn ReplyGenerator) {}
    }

    #[test]
    fn history_maps_roles() {
        let history = vec![
            HistoryEntry::new(Role::Customer, "hola", Timestamp::now()),
            HistoryEntry::new(Role::Admin, "¡hola! soy Ana", Timestamp::now()),
        ];
        let request = ReplyRequest::new(ChatId::new("c").unwrap(), "seguí").with_history(&history);
        assert_eq!(request.history[0].role, PromptRole::User);
        assert_eq!(request.history[1].role, PromptRole::Assistant);
    }

    #[test]
    fn timeouts_and_outages_are_retryable() {
        assert!(ReplyError::Timeout(8).is_retryable());
        assert!(ReplyError::Network("reset".into()).is_retryable());
        assert!(!ReplyError::AuthenticationFailed.is_retryable());
        assert!(!ReplyError::Disabled.is_retryable());
    }
}
