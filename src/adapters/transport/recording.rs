//! Transport double that records everything sent.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::domain::foundation::ChatId;
use crate::ports::{MessageTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Text {
        chat_id: ChatId,
        text: String,
    },
    Media {
        chat_id: ChatId,
        media_ref: String,
        caption: Option<String>,
    },
}

impl SentMessage {
    pub fn chat_id(&self) -> &ChatId {
        match self {
            SentMessage::Text { chat_id, .. } | SentMessage::Media { chat_id, .. } => chat_id,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            SentMessage::Text { text, .. } => Some(text),
            SentMessage::Media { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every send fails and nothing is recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn sent_guard(&self) -> MutexGuard<'_, Vec<SentMessage>> {
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent_guard().clone()
    }

    /// Texts sent to `chat_id`, in order.
    pub fn texts_to(&self, chat_id: &ChatId) -> Vec<String> {
        self.sent_guard()
            .iter()
            .filter(|m| m.chat_id() == chat_id)
            .filter_map(|m| m.text().map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.sent_guard().clear();
    }

    fn record(&self, message: SentMessage) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("gateway offline".to_string()));
        }
        self.sent_guard().push(message);
        Ok(())
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<(), TransportError> {
        self.record(SentMessage::Text {
            chat_id: chat_id.clone(),
            text: text.to_string(),
        })
    }

    async fn send_media(
        &self,
        chat_id: &ChatId,
        media_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        self.record(SentMessage::Media {
            chat_id: chat_id.clone(),
            media_ref: media_ref.to_string(),
            caption: caption.map(str::to_string),
        })
    }
}
