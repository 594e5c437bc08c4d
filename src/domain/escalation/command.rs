//! Operator commands typed on the dashboard.

use std::str::FromStr;

use crate::domain::conversation::OrderData;
use crate::domain::foundation::{text, ValidationError};

/// Longest free-text instruction accepted from an operator.
pub const MAX_INSTRUCTION_LEN: usize = 2000;

/// A parsed operator command for one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// `confirmar`: accept the pending order.
    Confirm,
    /// `descartar`: drop the alert without acting.
    Discard,
    /// `chat`: dashboard navigation only.
    Navigate,
    /// `tomar` / `me encargo` / `intervenir`: operator takes over the chat.
    Takeover,
    /// Anything else: an instruction for the reply generator.
    Instruct(String),
}

impl AdminCommand {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("command"));
        }
        let len = trimmed.chars().count();
        if len > MAX_INSTRUCTION_LEN {
            return Err(ValidationError::too_long("command", MAX_INSTRUCTION_LEN, len));
        }

        let command = match text::normalize(trimmed).as_str() {
            "confirmar" => AdminCommand::Confirm,
            "descartar" => AdminCommand::Discard,
            "chat" => AdminCommand::Navigate,
            "tomar" | "me encargo" | "intervenir" => AdminCommand::Takeover,
            _ => AdminCommand::Instruct(trimmed.to_string()),
        };
        Ok(command)
    }

    /// Whether applying the command closes the chat's open alert.
    pub fn resolves_alert(&self) -> bool {
        !matches!(self, AdminCommand::Navigate)
    }

    /// Label stored as the alert's resolution.
    pub fn label(&self) -> &'static str {
        match self {
            AdminCommand::Confirm => "confirmar",
            AdminCommand::Discard => "descartar",
            AdminCommand::Navigate => "chat",
            AdminCommand::Takeover => "tomar",
            AdminCommand::Instruct(_) => "instruccion",
        }
    }
}

impl FromStr for AdminCommand {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Message sent to the customer when an operator confirms the order.
pub fn confirmation_message(order: Option<&OrderData>) -> String {
    match order {
        Some(order) => format!(
            "✅ ¡Tu pedido está confirmado!\n{}\nTe avisamos cuando salga el envío 📦",
            order.summary()
        ),
        None => "✅ ¡Tu pedido está confirmado! Te avisamos cuando salga el envío 📦".to_string(),
    }
}
