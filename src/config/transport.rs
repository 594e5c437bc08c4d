//! Chat gateway configuration

use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Gateway endpoint for outbound messages; unset logs them instead
    pub send_url: Option<String>,

    /// Bearer token for the gateway
    pub send_token: Option<Secret<String>>,

    /// Key for the `X-Signature` HMAC on inbound webhooks; unset skips the check
    pub inbound_secret: Option<Secret<String>>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = &self.send_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ValidationError::InvalidUrl {
                    field: "transport.send_url",
                    value: url.clone(),
                });
            }
        }
        if self.timeout_secs == 0 || self.timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout("transport.timeout_secs"));
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            send_url: None,
            send_token: None,
            inbound_secret: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}
