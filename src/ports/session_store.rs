//! Session persistence ports.
//!
//! `SessionStore` is what the engine talks to. `SessionArchive` is the
//! durable backend a write-behind store flushes into.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::conversation::ConversationState;
use crate::domain::foundation::{ChatId, DomainError, ErrorCode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionStoreError {
    #[error("session {0} not found")]
    NotFound(ChatId),

    /// The written copy was read at `expected`, but the store holds `actual`.
    #[error(
        "session {chat_id} changed concurrently (expected revision {expected}, found {actual})"
    )]
    Conflict {
        chat_id: ChatId,
        expected: u64,
        actual: u64,
    },

    #[error("session storage I/O failed: {0}")]
    Io(String),

    #[error("session document is invalid: {0}")]
    Serialization(String),
}

impl From<SessionStoreError> for DomainError {
    fn from(err: SessionStoreError) -> Self {
        let code = match &err {
            SessionStoreError::NotFound(_) => ErrorCode::SessionNotFound,
            SessionStoreError::Conflict { .. } => ErrorCode::ConcurrencyConflict,
            SessionStoreError::Io(_) | SessionStoreError::Serialization(_) => {
                ErrorCode::PersistenceError
            }
        };
        DomainError::new(code, err.to_string())
    }
}

/// Per-chat session storage.
///
/// Implementations must ensure:
/// - Read-your-writes: a `get` after a successful `put` sees the new state
/// - Compare-and-set: `put` succeeds only when `state.revision()` equals the
///   stored revision (0 when nothing is stored)
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, chat_id: &ChatId) -> Result<Option<ConversationState>, SessionStoreError>;

    /// Stores `state` and returns its new revision.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the stored revision moved since `state` was read
    async fn put(&self, state: &ConversationState) -> Result<u64, SessionStoreError>;

    /// Deletes the chat's session. Returns whether one existed.
    async fn reset(&self, chat_id: &ChatId) -> Result<bool, SessionStoreError>;

    /// Every stored session, most recently active first.
    async fn list(&self) -> Result<Vec<ConversationState>, SessionStoreError>;
}

/// Durable whole-document session storage.
#[async_trait]
pub trait SessionArchive: Send + Sync {
    async fn load_all(&self) -> Result<Vec<ConversationState>, SessionStoreError>;

    /// Atomically replaces the chat's stored document.
    async fn write(&self, state: &ConversationState) -> Result<(), SessionStoreError>;

    async fn remove(&self, chat_id: &ChatId) -> Result<(), SessionStoreError>;
}
