//! Alerts: chats flagged for human attention.
//!
//! # Invariants
//!
//! - At most one open alert per chat; new triggers refresh it
//! - A resolved alert is never mutated again

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::domain::conversation::OrderData;
use crate::domain::foundation::{AlertId, ChatId, DomainError, ErrorCode, Timestamp};

/// Why a chat needs an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    /// Address captured; the order waits for an operator's confirmation.
    OrderConfirmation,
    /// Off-script message handed straight to an operator.
    Unclassified,
    /// The customer asked for a person.
    HumanRequested,
    /// The reply generator failed or timed out.
    AssistantUnavailable,
    /// The chat's script version could not be resolved.
    ScriptUnavailable,
    /// An outbound message could not be delivered.
    DeliveryFailed,
    /// The customer has not moved past a step for too long.
    StaleChat,
}

impl AlertReason {
    /// Short operator-facing label.
    pub fn description(&self) -> &'static str {
        match self {
            AlertReason::OrderConfirmation => "Pedido para confirmar",
            AlertReason::Unclassified => "Mensaje fuera de guion",
            AlertReason::HumanRequested => "El cliente pidió hablar con una persona",
            AlertReason::AssistantUnavailable => "La IA no respondió a tiempo",
            AlertReason::ScriptUnavailable => "No hay guion disponible",
            AlertReason::DeliveryFailed => "No se pudo enviar un mensaje",
            AlertReason::StaleChat => "Cliente estancado",
        }
    }

    /// Rank used when an open alert is refreshed; a lower rank never
    /// replaces a higher one.
    pub fn rank(&self) -> u8 {
        match self {
            AlertReason::OrderConfirmation => 2,
            AlertReason::HumanRequested => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    id: AlertId,
    chat_id: ChatId,
    reason: AlertReason,
    details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order: Option<OrderData>,
    status: AlertStatus,
    created_at: Timestamp,
    updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolved_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolution: Option<String>,
    /// Last time the alert was forwarded to the admin numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notified_at: Option<Timestamp>,
}

impl Alert {
    pub fn open(
        chat_id: ChatId,
        reason: AlertReason,
        details: impl Into<String>,
        order: Option<OrderData>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: AlertId::new(),
            chat_id,
            reason,
            details: details.into(),
            order,
            status: AlertStatus::Open,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            resolution: None,
            notified_at: None,
        }
    }

    pub fn id(&self) -> AlertId {
        self.id
    }

    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    pub fn reason(&self) -> AlertReason {
        self.reason
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn order(&self) -> Option<&OrderData> {
        self.order.as_ref()
    }

    pub fn status(&self) -> AlertStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == AlertStatus::Open
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    pub fn resolved_at(&self) -> Option<&Timestamp> {
        self.resolved_at.as_ref()
    }

    pub fn resolution(&self) -> Option<&str> {
        self.resolution.as_deref()
    }

    /// Updates an open alert. Reason and details change only when the new
    /// reason ranks at least as high as the current one.
    ///
    /// # Errors
    ///
    /// - `AlertNotFound` if the alert is already resolved
    pub fn refresh(
        &mut self,
        reason: AlertReason,
        details: impl Into<String>,
        order: Option<OrderData>,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        self.ensure_open()?;
        if reason.rank() >= self.reason.rank() {
            self.reason = reason;
            self.details = details.into();
        }
        if order.is_some() {
            self.order = order;
        }
        self.updated_at = now;
        Ok(())
    }

    /// # Errors
    ///
    /// - `AlertNotFound` if the alert is already resolved
    pub fn resolve(
        &mut self,
        resolution: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.status = AlertStatus::Resolved;
        self.resolution = Some(resolution.into());
        self.resolved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Whether the admin numbers should hear about this alert again.
    pub fn needs_forwarding(&self, window: Duration, now: &Timestamp) -> bool {
        match &self.notified_at {
            None => true,
            Some(at) => now.duration_since(at) >= window,
        }
    }

    pub fn mark_forwarded(&mut self, now: Timestamp) {
        self.notified_at = Some(now);
    }

    /// Text forwarded to the admin numbers.
    pub fn forward_text(&self) -> String {
        let mut text = format!(
            "⚠️ {}\nChat: {}\n{}",
            self.reason.description(),
            self.chat_id,
            self.details
        );
        if let Some(order) = &self.order {
            text.push_str(&format!("\nPedido: {}", order.summary()));
        }
        text
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DomainError::new(
                ErrorCode::AlertNotFound,
                format!("Alert {} is already resolved", self.id),
            ))
        }
    }
}

/// Result of raising an alert on a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaiseOutcome {
    Opened(Alert),
    Refreshed(Alert),
}

impl RaiseOutcome {
    pub fn alert(&self) -> &Alert {
        match self {
            RaiseOutcome::Opened(alert) | RaiseOutcome::Refreshed(alert) => alert,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, RaiseOutcome::Opened(_))
    }
}

/// Open alerts keyed by chat plus a bounded list of recently resolved ones.
#[derive(Debug, Clone)]
pub struct AlertBook {
    open: HashMap<ChatId, Alert>,
    resolved: VecDeque<Alert>,
    max_resolved: usize,
}

impl AlertBook {
    pub fn new(max_resolved: usize) -> Self {
        Self {
            open: HashMap::new(),
            resolved: VecDeque::new(),
            max_resolved,
        }
    }

    /// Opens an alert for the chat or refreshes the one already open.
    pub fn raise(
        &mut self,
        chat_id: &ChatId,
        reason: AlertReason,
        details: impl Into<String>,
        order: Option<OrderData>,
        now: Timestamp,
    ) -> RaiseOutcome {
        let details = details.into();
        if let Some(alert) = self.open.get_mut(chat_id) {
            // Entries in `open` are always open, so refresh cannot fail.
            if alert.refresh(reason, details.clone(), order.clone(), now).is_ok() {
                return RaiseOutcome::Refreshed(alert.clone());
            }
        }
        let alert = Alert::open(chat_id.clone(), reason, details, order, now);
        self.open.insert(chat_id.clone(), alert.clone());
        RaiseOutcome::Opened(alert)
    }

    /// Resolves the chat's open alert, if any.
    pub fn resolve(
        &mut self,
        chat_id: &ChatId,
        resolution: impl Into<String>,
        now: Timestamp,
    ) -> Option<Alert> {
        let mut alert = self.open.remove(chat_id)?;
        if alert.resolve(resolution, now).is_err() {
            return None;
        }
        self.resolved.push_front(alert.clone());
        self.resolved.truncate(self.max_resolved);
        Some(alert)
    }

    pub fn mark_forwarded(&mut self, chat_id: &ChatId, now: Timestamp) {
        if let Some(alert) = self.open.get_mut(chat_id) {
            alert.mark_forwarded(now);
        }
    }

    pub fn open_for(&self, chat_id: &ChatId) -> Option<&Alert> {
        self.open.get(chat_id)
    }

    /// Open alerts, oldest first.
    pub fn open_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.open.values().cloned().collect();
        alerts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        alerts
    }

    /// Resolved alerts, most recent first.
    pub fn resolved_alerts(&self) -> Vec<Alert> {
        self.resolved.iter().cloned().collect()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}
