//! Transport that only logs. Used when no gateway is configured.

use async_trait::async_trait;

use crate::domain::foundation::ChatId;
use crate::ports::{MessageTransport, TransportError};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTransport;

#[async_trait]
impl MessageTransport for LoggingTransport {
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<(), TransportError> {
        tracing::info!(chat_id = %chat_id, text, "outbound text (no gateway configured)");
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: &ChatId,
        media_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        tracing::info!(
            chat_id = %chat_id,
            media_ref,
            caption = caption.unwrap_or_default(),
            "outbound media (no gateway configured)"
        );
        Ok(())
    }
}
