//! Dialogue engine configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::dialogue::DEFAULT_HUMAN_KEYWORDS;

/// What happens to a message the script cannot place.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OffScriptPolicy {
    /// Ask the reply generator, falling back to the handoff message.
    #[default]
    AiReply,
    /// Raise an alert and send the handoff message right away.
    Escalate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub off_script_policy: OffScriptPolicy,

    /// Sent whenever a person is about to take over
    #[serde(default = "default_handoff_message")]
    pub handoff_message: String,

    /// Comma-separated words that mean "let me talk to a person"
    pub human_keywords: Option<String>,

    /// Instruction given to the reply generator for off-script messages
    #[serde(default = "default_off_script_instruction")]
    pub off_script_instruction: String,

    /// A chat worker with no queued events exits after this many seconds
    #[serde(default = "default_worker_idle")]
    pub worker_idle_secs: u64,
}

impl EngineConfig {
    /// Configured keywords, or the built-in list when none are set.
    pub fn human_keywords_list(&self) -> Vec<String> {
        let configured: Vec<String> = self
            .human_keywords
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if configured.is_empty() {
            DEFAULT_HUMAN_KEYWORDS.iter().map(|s| s.to_string()).collect()
        } else {
            configured
        }
    }

    pub fn worker_idle(&self) -> Duration {
        Duration::from_secs(self.worker_idle_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.handoff_message.trim().is_empty() {
            return Err(ValidationError::MissingRequired("engine.handoff_message"));
        }
        if self.worker_idle_secs == 0 {
            return Err(ValidationError::InvalidTimeout("engine.worker_idle_secs"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            off_script_policy: OffScriptPolicy::default(),
            handoff_message: default_handoff_message(),
            human_keywords: None,
            off_script_instruction: default_off_script_instruction(),
            worker_idle_secs: default_worker_idle(),
        }
    }
}

fn default_handoff_message() -> String {
    "Dame un momento que te comunico con una asesora 🙌".to_string()
}

fn default_off_script_instruction() -> String {
    "Respondé como asesora de ventas, breve y cordial, y retomá la conversación donde quedó."
        .to_string()
}

fn default_worker_idle() -> u64 {
    300
}
