//! Housekeeping that falls due on quiet sessions.
//!
//! [`due_upkeep`] is a pure decision over a session snapshot and a clock
//! reading; the scheduler asks it which task to queue, and the engine asks
//! again on the fresh state before acting.

use chrono::{Duration, Timelike};

use crate::domain::conversation::ConversationState;
use crate::domain::foundation::Timestamp;
use crate::domain::script::{FlowStep, Phase};

pub const DEFAULT_CART_MESSAGE: &str =
    "Hola, ¿te quedó alguna duda con los planes? Avisame que te guardo la promo con envío gratis.";

/// One housekeeping task for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upkeep {
    /// Confirm a pending order nobody reviewed in time.
    AutoApprove,
    /// Tell operators the customer is stuck on the current step.
    FlagStale,
    /// Nudge a quiet customer with this text.
    FollowUp(String),
    /// Drop an abandoned session.
    Expire,
}

impl Upkeep {
    pub fn label(&self) -> &'static str {
        match self {
            Upkeep::AutoApprove => "auto_approve",
            Upkeep::FlagStale => "flag_stale",
            Upkeep::FollowUp(_) => "follow_up",
            Upkeep::Expire => "expire",
        }
    }
}

/// Local hours during which customers may be messaged unprompted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub open_hour: u32,
    pub close_hour: u32,
    pub utc_offset_hours: i32,
}

impl BusinessHours {
    pub fn contains(&self, at: &Timestamp) -> bool {
        let local = at.as_datetime().naive_utc() + Duration::hours(self.utc_offset_hours.into());
        (self.open_hour..self.close_hour).contains(&local.hour())
    }
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open_hour: 9,
            close_hour: 21,
            utc_offset_hours: -3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpkeepPolicy {
    pub auto_approve_after: Duration,
    /// `None` disables stuck-step alerts.
    pub stale_after: Option<Duration>,
    pub follow_up_after: Duration,
    /// Past this much silence the cart reminder is no longer sent.
    pub cart_window: Duration,
    pub cart_message: String,
    pub retention: Duration,
    /// `None` allows follow-ups at any hour.
    pub business_hours: Option<BusinessHours>,
}

impl Default for UpkeepPolicy {
    fn default() -> Self {
        Self {
            auto_approve_after: Duration::minutes(15),
            stale_after: None,
            follow_up_after: Duration::hours(24),
            cart_window: Duration::hours(48),
            cart_message: DEFAULT_CART_MESSAGE.to_string(),
            retention: Duration::days(30),
            business_hours: Some(BusinessHours::default()),
        }
    }
}

/// The task due on `state` at `now`, if any.
///
/// `step` is the session's current step in its script version, when it
/// still resolves. Rules in priority order:
///
/// 1. a pending order past `auto_approve_after` is approved (unless paused)
/// 2. completed sessions are kept as they are
/// 3. sessions silent for `retention` expire
/// 4. paused chats, pending orders and open alerts wait for an operator
/// 5. a step held past `stale_after` is flagged once
/// 6. after `follow_up_after` of silence, one follow-up inside business hours
pub fn due_upkeep(
    state: &ConversationState,
    step: Option<&FlowStep>,
    policy: &UpkeepPolicy,
    now: &Timestamp,
) -> Option<Upkeep> {
    let pending = state.order().filter(|o| o.status.awaits_confirmation());
    if !state.is_paused() {
        let submitted = pending.and_then(|o| o.submitted_at);
        if submitted.is_some_and(|at| now.duration_since(&at) >= policy.auto_approve_after) {
            return Some(Upkeep::AutoApprove);
        }
    }
    if state.is_completed() {
        return None;
    }

    let idle = now.duration_since(state.last_activity_at());
    if idle >= policy.retention {
        return Some(Upkeep::Expire);
    }
    if state.is_paused() || pending.is_some() || state.pending_alert_id().is_some() {
        return None;
    }
    let step = step?;

    if let Some(limit) = policy.stale_after {
        let held = now.duration_since(state.step_entered_at());
        if !state.stale_flagged() && step.phase != Phase::Greeting && held >= limit {
            return Some(Upkeep::FlagStale);
        }
    }

    if state.follow_up_sent() || idle < policy.follow_up_after {
        return None;
    }
    if !policy.business_hours.map_or(true, |hours| hours.contains(now)) {
        return None;
    }
    step.follow_up
        .clone()
        .or_else(|| {
            let cart = state.order().is_some() && idle < policy.cart_window;
            cart.then(|| policy.cart_message.clone())
        })
        .map(Upkeep::FollowUp)
}
