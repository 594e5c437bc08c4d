//! Scheduled housekeeping configuration

use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::dialogue::{BusinessHours, UpkeepPolicy, DEFAULT_CART_MESSAGE};

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Set to false to run without scheduled housekeeping
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between sweeps over all sessions
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Pending orders are confirmed automatically after this long
    #[serde(default = "default_auto_approve")]
    pub auto_approve_minutes: u64,

    /// Minutes on one step before operators are told; 0 disables
    #[serde(default)]
    pub stale_minutes: u64,

    #[serde(default = "default_follow_up")]
    pub follow_up_hours: u64,

    /// Silence past which the cart reminder is no longer sent
    #[serde(default = "default_cart_window")]
    pub cart_window_hours: u64,

    pub cart_message: Option<String>,

    /// Unfinished sessions silent this long are deleted
    #[serde(default = "default_retention")]
    pub retention_days: u64,

    /// Follow-ups go out between these local hours; equal values allow any hour
    #[serde(default = "default_open_hour")]
    pub business_open_hour: u32,

    #[serde(default = "default_close_hour")]
    pub business_close_hour: u32,

    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retention(&self) -> ChronoDuration {
        ChronoDuration::days(self.retention_days as i64)
    }

    pub fn policy(&self) -> UpkeepPolicy {
        let business_hours = (self.business_open_hour != self.business_close_hour).then(|| {
            BusinessHours {
                open_hour: self.business_open_hour,
                close_hour: self.business_close_hour,
                utc_offset_hours: self.utc_offset_hours,
            }
        });
        UpkeepPolicy {
            auto_approve_after: ChronoDuration::minutes(self.auto_approve_minutes as i64),
            stale_after: (self.stale_minutes > 0)
                .then(|| ChronoDuration::minutes(self.stale_minutes as i64)),
            follow_up_after: ChronoDuration::hours(self.follow_up_hours as i64),
            cart_window: ChronoDuration::hours(self.cart_window_hours as i64),
            cart_message: self
                .cart_message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CART_MESSAGE.to_string()),
            retention: self.retention(),
            business_hours,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::InvalidTimeout("scheduler.interval_secs"));
        }
        if self.auto_approve_minutes == 0 {
            return Err(ValidationError::InvalidTimeout("scheduler.auto_approve_minutes"));
        }
        if self.follow_up_hours == 0 || self.cart_window_hours < self.follow_up_hours {
            return Err(ValidationError::InvalidTimeout("scheduler.cart_window_hours"));
        }
        if self.retention_days == 0 {
            return Err(ValidationError::InvalidTimeout("scheduler.retention_days"));
        }
        if self.business_open_hour > 24 || self.business_close_hour > 24 {
            return Err(ValidationError::OutOfRange {
                field: "scheduler.business_hours",
                min: 0,
                max: 24,
            });
        }
        if self.business_open_hour > self.business_close_hour {
            return Err(ValidationError::InvalidTimeout("scheduler.business_open_hour"));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(ValidationError::InvalidTimeout("scheduler.utc_offset_hours"));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            auto_approve_minutes: default_auto_approve(),
            stale_minutes: 0,
            follow_up_hours: default_follow_up(),
            cart_window_hours: default_cart_window(),
            cart_message: None,
            retention_days: default_retention(),
            business_open_hour: default_open_hour(),
            business_close_hour: default_close_hour(),
            utc_offset_hours: default_utc_offset(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    600
}

fn default_auto_approve() -> u64 {
    15
}

fn default_follow_up() -> u64 {
    24
}

fn default_cart_window() -> u64 {
    48
}

fn default_retention() -> u64 {
    30
}

fn default_open_hour() -> u32 {
    9
}

fn default_close_hour() -> u32 {
    21
}

fn default_utc_offset() -> i32 {
    -3
}
