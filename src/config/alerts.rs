//! Alert forwarding configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::foundation::ChatId;

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Comma-separated chat ids that receive alert notifications
    pub alert_numbers: Option<String>,

    /// Single admin number from older deployments; merged into `alert_numbers`
    pub alert_number: Option<String>,

    /// A refreshed alert is re-forwarded only after this many seconds
    #[serde(default = "default_dedup_window")]
    pub dedup_window_secs: u64,

    /// Resolved alerts kept for the dashboard
    #[serde(default = "default_max_resolved")]
    pub max_resolved: usize,
}

impl AlertsConfig {
    /// Merged, deduplicated admin chat ids in configuration order.
    pub fn admin_numbers(&self) -> Result<Vec<ChatId>, ValidationError> {
        let mut numbers: Vec<ChatId> = Vec::new();
        let listed = self.alert_numbers.as_deref().unwrap_or_default().split(',');
        let legacy = self.alert_number.as_deref().into_iter();
        for raw in listed.chain(legacy) {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let id = ChatId::new(raw)
                .map_err(|_| ValidationError::InvalidAdminNumber(raw.to_string()))?;
            if !numbers.contains(&id) {
                numbers.push(id);
            }
        }
        Ok(numbers)
    }

    pub fn dedup_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.dedup_window_secs).unwrap_or(i64::MAX))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.admin_numbers()?;
        if self.max_resolved == 0 || self.max_resolved > 10_000 {
            return Err(ValidationError::OutOfRange {
                field: "alerts.max_resolved",
                min: 1,
                max: 10_000,
            });
        }
        if self.dedup_window_secs > 86_400 {
            return Err(ValidationError::OutOfRange {
                field: "alerts.dedup_window_secs",
                min: 0,
                max: 86_400,
            });
        }
        Ok(())
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            alert_numbers: None,
            alert_number: None,
            dedup_window_secs: default_dedup_window(),
            max_resolved: default_max_resolved(),
        }
    }
}

fn default_dedup_window() -> u64 {
    300
}

fn default_max_resolved() -> usize {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_number_is_merged_and_deduplicated() {
        let config = AlertsConfig {
            alert_numbers: Some("5491100000001, 5491100000002".to_string()),
            alert_number: Some("5491100000001".to_string()),
            ..Default::default()
        };
        let numbers: Vec<String> = config
            .admin_numbers()
            .unwrap()
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(numbers, vec!["5491100000001", "5491100000002"]);
    }

    #[test]
    fn legacy_number_alone_is_used() {
        let config = AlertsConfig {
            alert_number: Some("5491100000009".to_string()),
            ..Default::default()
        };
        assert_eq!(config.admin_numbers().unwrap().len(), 1);
    }

    #[test]
    fn malformed_number_fails_validation() {
        let config = AlertsConfig {
            alert_numbers: Some("54 911 bad".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidAdminNumber(_))
        ));
    }

    #[test]
    fn defaults() {
        let config = AlertsConfig::default();
        assert_eq!(config.max_resolved, 50);
        assert_eq!(config.dedup_window(), chrono::Duration::seconds(300));
        assert!(config.admin_numbers().unwrap().is_empty());
    }
}
