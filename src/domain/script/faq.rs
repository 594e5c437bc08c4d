//! FAQ entries and first-match lookup.

use serde::{Deserialize, Serialize};

use super::StepKey;
use crate::domain::foundation::text;

/// A keyword-triggered canned answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub keywords: Vec<String>,
    pub response: String,

    /// Moves the session to this step after answering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_step: Option<StepKey>,
}

impl FaqEntry {
    pub fn new(keywords: &[&str], response: impl Into<String>) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            response: response.into(),
            trigger_step: None,
        }
    }

    pub fn with_trigger(mut self, step: StepKey) -> Self {
        self.trigger_step = Some(step);
        self
    }
}

/// Index of the first entry with a keyword contained in the text.
pub fn first_match(entries: &[FaqEntry], normalized_text: &str) -> Option<usize> {
    entries
        .iter()
        .position(|entry| text::contains_any(normalized_text, &entry.keywords))
}
