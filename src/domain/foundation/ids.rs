//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Identifier of one chat conversation as the transport names it
/// (e.g. `5491122334455@c.us`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChatId(String);

impl ChatId {
    pub const MAX_LEN: usize = 128;

    /// Validates and wraps a raw chat identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("chat_id"));
        }
        if trimmed.chars().count() > Self::MAX_LEN {
            return Err(ValidationError::too_long(
                "chat_id",
                Self::MAX_LEN,
                trimmed.chars().count(),
            ));
        }
        if let Some(bad) = trimmed.chars().find(|c| !Self::is_allowed(*c)) {
            return Err(ValidationError::invalid_format(
                "chat_id",
                format!("character {:?} is not allowed", bad),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    fn is_allowed(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '-' | '_' | '+' | ':')
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChatId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ChatId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChatId> for String {
    fn from(id: ChatId) -> Self {
        id.0
    }
}

/// Unique identifier for an escalation alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(Uuid);

impl AlertId {
    /// Creates a new random AlertId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AlertId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for an entry in the order ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_id_accepts_transport_identifiers() {
        let id = ChatId::new("5491122334455@c.us").unwrap();
        assert_eq!(id.as_str(), "5491122334455@c.us");
    }

    #[test]
    fn chat_id_trims_surrounding_whitespace() {
        let id = ChatId::new("  123@c.us ").unwrap();
        assert_eq!(id.to_string(), "123@c.us");
    }

    #[test]
    fn chat_id_rejects_empty() {
        assert!(matches!(
            ChatId::new("   "),
            Err(ValidationError::EmptyField { .. })
        ));
    }

    #[test]
    fn chat_id_rejects_path_separators() {
        assert!(matches!(
            ChatId::new("../etc/passwd"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn chat_id_rejects_overlong_values() {
        let raw = "1".repeat(ChatId::MAX_LEN + 1);
        assert!(matches!(ChatId::new(raw), Err(ValidationError::TooLong { .. })));
    }

    #[test]
    fn chat_id_deserialization_validates() {
        let ok: Result<ChatId, _> = serde_json::from_str(r#""42@c.us""#);
        assert!(ok.is_ok());
        let bad: Result<ChatId, _> = serde_json::from_str(r#""a b""#);
        assert!(bad.is_err());
    }

    #[test]
    fn alert_id_round_trips_through_string() {
        let id = AlertId::new();
        let parsed: AlertId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn order_id_rejects_non_uuid_text() {
        assert!("pedido-1".parse::<OrderId>().is_err());
        let id = OrderId::new();
        assert_eq!(id.to_string().parse::<OrderId>().unwrap(), id);
    }
}
