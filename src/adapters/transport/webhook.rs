//! Outbound messages as JSON POSTs to a chat gateway.
//!
//! Body shape:
//!
//! ```json
//! { "chat_id": "549...@c.us", "kind": "text", "text": "Hola" }
//! { "chat_id": "549...@c.us", "kind": "media", "media_ref": "capsulas.jpg", "caption": null }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::time::Duration;

use crate::domain::foundation::ChatId;
use crate::ports::{MessageTransport, TransportError};

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum OutboundBody<'a> {
    Text {
        chat_id: &'a str,
        text: &'a str,
    },
    Media {
        chat_id: &'a str,
        media_ref: &'a str,
        caption: Option<&'a str>,
    },
}

pub struct WebhookTransport {
    client: Client,
    send_url: String,
    token: Option<Secret<String>>,
}

impl WebhookTransport {
    pub fn new(
        send_url: impl Into<String>,
        token: Option<Secret<String>>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Unavailable(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            send_url: send_url.into(),
            token,
        })
    }

    async fn post(&self, body: &OutboundBody<'_>) -> Result<(), TransportError> {
        let mut request = self.client.post(&self.send_url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            return Err(TransportError::Unavailable(format!("{}: {}", status, message)));
        }
        Err(TransportError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl MessageTransport for WebhookTransport {
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<(), TransportError> {
        self.post(&OutboundBody::Text {
            chat_id: chat_id.as_str(),
            text,
        })
        .await
    }

    async fn send_media(
        &self,
        chat_id: &ChatId,
        media_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        self.post(&OutboundBody::Media {
            chat_id: chat_id.as_str(),
            media_ref,
            caption,
        })
        .await
    }
}
