//! Escalation manager: the alert book, admin-number forwarding and alert events.

use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::publish;
use crate::domain::conversation::OrderData;
use crate::domain::escalation::{Alert, AlertBook, AlertRaised, AlertReason, AlertResolved};
use crate::domain::foundation::{ChatId, DomainError, ErrorCode, EventId, Timestamp};
use crate::ports::{EventPublisher, MessageTransport};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscalationError {
    #[error("chat {0} has no open alert")]
    NoOpenAlert(ChatId),
}

impl From<EscalationError> for DomainError {
    fn from(err: EscalationError) -> Self {
        DomainError::new(ErrorCode::AlertNotFound, err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct EscalationSettings {
    /// Chats that receive a copy of every new alert.
    pub admin_numbers: Vec<ChatId>,
    /// A refreshed alert is forwarded again only after this long.
    pub dedup_window: chrono::Duration,
    pub max_resolved: usize,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            admin_numbers: Vec::new(),
            dedup_window: chrono::Duration::seconds(300),
            max_resolved: 50,
        }
    }
}

pub struct EscalationManager {
    book: Mutex<AlertBook>,
    transport: Arc<dyn MessageTransport>,
    publisher: Arc<dyn EventPublisher>,
    settings: EscalationSettings,
}

impl EscalationManager {
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        publisher: Arc<dyn EventPublisher>,
        settings: EscalationSettings,
    ) -> Self {
        Self {
            book: Mutex::new(AlertBook::new(settings.max_resolved)),
            transport,
            publisher,
            settings,
        }
    }

    fn book(&self) -> MutexGuard<'_, AlertBook> {
        self.book.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Opens an alert for the chat, or refreshes the open one.
    ///
    /// New alerts are forwarded to the admin numbers. A refresh is forwarded
    /// again only once the dedup window has passed since the last forward.
    /// Forwarding failures are logged and never fail the raise.
    pub async fn raise_alert(
        &self,
        chat_id: &ChatId,
        reason: AlertReason,
        details: impl Into<String>,
        order: Option<OrderData>,
    ) -> Alert {
        let now = Timestamp::now();
        let (outcome, forward) = {
            let mut book = self.book();
            let outcome = book.raise(chat_id, reason, details, order, now);
            let forward = outcome
                .alert()
                .needs_forwarding(self.settings.dedup_window, &now);
            if forward {
                book.mark_forwarded(chat_id, now);
            }
            (outcome, forward)
        };
        let alert = outcome.alert().clone();

        if outcome.is_new() {
            tracing::info!(
                chat_id = %chat_id,
                alert_id = %alert.id(),
                reason = ?reason,
                "alert raised"
            );
        } else {
            tracing::warn!(
                chat_id = %chat_id,
                alert_id = %alert.id(),
                reason = ?reason,
                "open alert refreshed"
            );
        }

        if forward {
            self.forward(&alert).await;
        }

        publish(
            self.publisher.as_ref(),
            &AlertRaised {
                event_id: EventId::new(),
                alert_id: alert.id(),
                chat_id: chat_id.clone(),
                reason: alert.reason(),
                details: alert.details().to_string(),
                order: alert.order().cloned(),
                refreshed: !outcome.is_new(),
                raised_at: now,
            },
        )
        .await;

        alert
    }

    /// Closes the chat's open alert with `resolution` as its label.
    ///
    /// # Errors
    ///
    /// - `NoOpenAlert` if nothing is open for the chat
    pub async fn resolve(
        &self,
        chat_id: &ChatId,
        resolution: &str,
    ) -> Result<Alert, EscalationError> {
        let now = Timestamp::now();
        let alert = self
            .book()
            .resolve(chat_id, resolution, now)
            .ok_or_else(|| EscalationError::NoOpenAlert(chat_id.clone()))?;

        tracing::info!(chat_id = %chat_id, alert_id = %alert.id(), resolution, "alert resolved");
        publish(
            self.publisher.as_ref(),
            &AlertResolved {
                event_id: EventId::new(),
                alert_id: alert.id(),
                chat_id: chat_id.clone(),
                resolution: resolution.to_string(),
                resolved_at: now,
            },
        )
        .await;
        Ok(alert)
    }

    pub fn open_for(&self, chat_id: &ChatId) -> Option<Alert> {
        self.book().open_for(chat_id).cloned()
    }

    /// Open alerts, oldest first.
    pub fn open_alerts(&self) -> Vec<Alert> {
        self.book().open_alerts()
    }

    /// Recently resolved alerts, newest first.
    pub fn resolved_alerts(&self) -> Vec<Alert> {
        self.book().resolved_alerts()
    }

    /// Whether `chat_id` is one of the configured admin numbers.
    pub fn is_admin(&self, chat_id: &ChatId) -> bool {
        self.settings.admin_numbers.contains(chat_id)
    }

    /// The open alert raised or refreshed most recently.
    pub fn latest_open(&self) -> Option<Alert> {
        self.book()
            .open_alerts()
            .into_iter()
            .max_by(|a, b| a.updated_at().cmp(b.updated_at()))
    }

    /// Sends a status line back to an admin number. Failures are logged.
    pub async fn notify_admin(&self, admin: &ChatId, text: &str) {
        if let Err(error) = self.transport.send_text(admin, text).await {
            tracing::warn!(admin = %admin, %error, "failed to notify admin");
        }
    }

    /// Sends `text` to every admin number. Failures are logged.
    pub async fn broadcast(&self, text: &str) {
        for admin in &self.settings.admin_numbers {
            self.notify_admin(admin, text).await;
        }
    }

    async fn forward(&self, alert: &Alert) {
        tracing::debug!(alert_id = %alert.id(), "forwarding alert");
        self.broadcast(&alert.forward_text()).await;
    }
}
