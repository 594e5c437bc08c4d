//! Flow steps: the nodes of a script's funnel graph.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ScriptConfigError;
use crate::domain::foundation::text;

/// Sentinel naming the terminal state of the funnel.
pub const COMPLETED: &str = "completed";

// ════════════════════════════════════════════════════════════════════════════
// Step identity
// ════════════════════════════════════════════════════════════════════════════

/// Key of a step inside one script version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StepKey(String);

impl StepKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, ScriptConfigError> {
        let raw = raw.into();
        let invalid = |reason: &str| ScriptConfigError::InvalidStepKey {
            key: raw.clone(),
            reason: reason.to_string(),
        };
        if raw.is_empty() {
            return Err(invalid("empty"));
        }
        if raw == COMPLETED {
            return Err(invalid("'completed' is reserved for the terminal state"));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("only letters, digits, '_' and '-' are allowed"));
        }
        Ok(Self(raw))
    }

    /// Wraps a key known to be well formed (built-in scripts and defaults).
    pub(crate) fn from_trusted(raw: &str) -> Self {
        debug_assert!(Self::new(raw).is_ok(), "malformed built-in step key {raw}");
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StepKey {
    type Err = ScriptConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for StepKey {
    type Error = ScriptConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StepKey> for String {
    fn from(key: StepKey) -> Self {
        key.0
    }
}

/// A position in the funnel: a named step or the terminal `completed` state.
///
/// Used both for a session's current position and for transition targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StepRef {
    Step(StepKey),
    Completed,
}

impl StepRef {
    pub fn step(key: StepKey) -> Self {
        StepRef::Step(key)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StepRef::Completed)
    }

    pub fn as_step(&self) -> Option<&StepKey> {
        match self {
            StepRef::Step(key) => Some(key),
            StepRef::Completed => None,
        }
    }
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepRef::Step(key) => write!(f, "{}", key),
            StepRef::Completed => f.write_str(COMPLETED),
        }
    }
}

impl FromStr for StepRef {
    type Err = ScriptConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == COMPLETED {
            Ok(StepRef::Completed)
        } else {
            Ok(StepRef::Step(StepKey::new(s)?))
        }
    }
}

impl TryFrom<String> for StepRef {
    type Error = ScriptConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StepRef> for String {
    fn from(step: StepRef) -> Self {
        step.to_string()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Phases
// ════════════════════════════════════════════════════════════════════════════

/// Funnel stage of a step, carrying what its completion condition needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Phase {
    /// Any inbound message completes the step.
    Greeting,

    /// A number or a goal word ("kilos", "panza", ...) completes the step.
    WaitingWeight {
        #[serde(default = "default_goal_words")]
        goal_words: Vec<String>,
    },

    /// Never completes on its own; only branch keywords route onward.
    WaitingChoice,

    /// An affirmative word without any doubt marker completes the step.
    WaitingConfirmation {
        #[serde(default = "default_affirmatives")]
        affirmatives: Vec<String>,
        #[serde(default = "default_doubts")]
        doubts: Vec<String>,
    },

    /// Naming one plan of the selected product completes the step.
    WaitingPlanChoice,

    /// Text that looks like a postal address completes the step.
    WaitingData {
        #[serde(default = "default_min_address_len")]
        min_address_len: usize,
    },

    /// All required words present completes the step.
    WaitingAcceptance {
        #[serde(default = "default_acceptance_words")]
        required: Vec<String>,
        #[serde(default = "default_acceptance_reminder")]
        reminder: String,
    },

    /// Only an operator can move the session on; customers get a holding reply.
    WaitingAdminApproval {
        #[serde(default = "default_holding_message")]
        holding_message: String,
    },
}

impl Phase {
    /// Stable snake_case name, as shown on the dashboard.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Greeting => "greeting",
            Phase::WaitingWeight { .. } => "waiting_weight",
            Phase::WaitingChoice => "waiting_choice",
            Phase::WaitingConfirmation { .. } => "waiting_confirmation",
            Phase::WaitingPlanChoice => "waiting_plan_choice",
            Phase::WaitingData { .. } => "waiting_data",
            Phase::WaitingAcceptance { .. } => "waiting_acceptance",
            Phase::WaitingAdminApproval { .. } => "waiting_admin_approval",
        }
    }

    /// Reply sent when nothing else matched but the step has a canned answer
    /// for a stalled customer.
    pub fn holding_reply(&self, normalized_text: &str) -> Option<&str> {
        match self {
            Phase::WaitingAdminApproval { holding_message } => Some(holding_message),
            Phase::WaitingAcceptance { reminder, .. } => {
                let nudges = default_acceptance_nudges();
                text::contains_any(normalized_text, &nudges).then_some(reminder.as_str())
            }
            _ => None,
        }
    }

    pub fn weight() -> Self {
        Phase::WaitingWeight {
            goal_words: default_goal_words(),
        }
    }

    pub fn confirmation() -> Self {
        Phase::WaitingConfirmation {
            affirmatives: default_affirmatives(),
            doubts: default_doubts(),
        }
    }

    pub fn data() -> Self {
        Phase::WaitingData {
            min_address_len: default_min_address_len(),
        }
    }

    pub fn acceptance() -> Self {
        Phase::WaitingAcceptance {
            required: default_acceptance_words(),
            reminder: default_acceptance_reminder(),
        }
    }

    pub fn admin_approval() -> Self {
        Phase::WaitingAdminApproval {
            holding_message: default_holding_message(),
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

fn default_goal_words() -> Vec<String> {
    words(&["kilo", "kg", "mucho", "panza", "bajar", "no se", "poco", "talle"])
}

fn default_affirmatives() -> Vec<String> {
    words(&[
        "si", "sii", "sisi", "dale", "ok", "oka", "bueno", "listo", "claro", "perfecto", "precio",
        "por favor", "de acuerdo", "me interesa",
    ])
}

fn default_doubts() -> Vec<String> {
    words(&["?", "pero", "duda", "pregunta", "no se"])
}

fn default_min_address_len() -> usize {
    20
}

fn default_acceptance_words() -> Vec<String> {
    words(&["lei", "acepto", "condiciones"])
}

fn default_acceptance_nudges() -> Vec<String> {
    words(&["ok", "listo", "sisi", "dale", "acepto"])
}

fn default_acceptance_reminder() -> String {
    "Por favor, para confirmar necesito que escribas textual: \
     \"LEÍ Y ACEPTO LAS CONDICIONES DE ENVÍO\""
        .to_string()
}

fn default_holding_message() -> String {
    "Estamos revisando tu pedido, te confirmo en breve 😊".to_string()
}

// ════════════════════════════════════════════════════════════════════════════
// FlowStep
// ════════════════════════════════════════════════════════════════════════════

/// One node of the funnel graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStep {
    pub phase: Phase,

    #[serde(rename = "response")]
    pub response_template: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<StepRef>,

    /// Further reachable steps, routed by their own `match_keywords`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<StepKey>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,

    /// Entering this step selects the product into the order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,

    /// Sent once when the customer goes quiet on this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
}

impl FlowStep {
    pub fn new(phase: Phase, response_template: impl Into<String>) -> Self {
        Self {
            phase,
            response_template: response_template.into(),
            next: None,
            branches: Vec::new(),
            match_keywords: Vec::new(),
            image_ref: None,
            product: None,
            follow_up: None,
        }
    }

    pub fn with_next(mut self, next: StepRef) -> Self {
        self.next = Some(next);
        self
    }

    pub fn with_branch(mut self, key: StepKey) -> Self {
        self.branches.push(key);
        self
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.match_keywords = words(keywords);
        self
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn with_follow_up(mut self, text: impl Into<String>) -> Self {
        self.follow_up = Some(text.into());
        self
    }

    /// Transition targets reachable from this step: `next` first, then branches.
    pub fn reachable(&self) -> Vec<StepRef> {
        self.next
            .iter()
            .cloned()
            .chain(self.branches.iter().cloned().map(StepRef::Step))
            .collect()
    }
}
