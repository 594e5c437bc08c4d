//! Message transport port - sending to a chat on the messaging channel.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{ChatId, DomainError, ErrorCode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("gateway rejected the message with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),
}

impl From<TransportError> for DomainError {
    fn from(err: TransportError) -> Self {
        DomainError::new(ErrorCode::TransportError, err.to_string())
    }
}

/// Outbound side of the chat channel. Pairing and reconnects are the
/// transport's own business.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<(), TransportError>;

    /// Sends a stored media item (`media_ref` names it) with an optional caption.
    async fn send_media(
        &self,
        chat_id: &ChatId,
        media_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_is_object_safe() {
        fn _accepts_dyn(_t: &dyn MessageTransport) {}
    }
}
