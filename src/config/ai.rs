//! Reply generator configuration

use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// AI collaborator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub provider: AiProvider,

    /// OpenAI API key
    pub api_key: Option<Secret<String>>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Persona prompt sent ahead of the chat history
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Upper bound for one reply, retries included
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_retries")]
    pub max_retries: u32,

    /// History entries sent with each request
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

/// AI provider type
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    OpenAI,
    /// Every off-script message goes straight to the handoff fallback
    #[default]
    Disabled,
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.provider == AiProvider::OpenAI && self.api_key.is_none() {
            return Err(ValidationError::MissingRequired("ai.api_key"));
        }
        if self.timeout_secs == 0 || self.timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout("ai.timeout_secs"));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ValidationError::InvalidUrl {
                field: "ai.base_url",
                value: self.base_url.clone(),
            });
        }
        if self.max_history == 0 || self.max_history > 100 {
            return Err(ValidationError::OutOfRange {
                field: "ai.max_history",
                min: 1,
                max: 100,
            });
        }
        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::default(),
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            system_prompt: default_system_prompt(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            max_history: default_max_history(),
        }
    }
}

fn default_model() -> String {
    crate::adapters::ai::DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    crate::adapters::ai::DEFAULT_BASE_URL.to_string()
}

fn default_system_prompt() -> String {
    "Sos Marta, asesora de ventas de Herbalis. Hablás en español rioplatense, con voseo y \
     calidez. El guion automático maneja la venta; vos solo respondés lo que el guion no \
     cubre, en una o dos oraciones, y volvés a la pregunta del paso actual. No inventes \
     datos, precios ni plazos que no te hayan dado."
        .to_string()
}

fn default_timeout() -> u64 {
    8
}

fn default_retries() -> u32 {
    1
}

fn default_max_history() -> usize {
    15
}
