//! Per-chat conversation state.

use serde::{Deserialize, Serialize};

use super::message::{HistoryEntry, Role};
use super::order::{OrderData, OrderStatus, PostalCode};
use crate::domain::foundation::{AlertId, ChatId, Timestamp};
use crate::domain::script::{ScriptVersionName, StepKey, StepRef};

/// Durable record of one chat's funnel progress.
///
/// # Invariants
///
/// - `script_version` is fixed at construction
/// - `history` only grows, and its timestamps strictly increase
/// - `conversion_counted` flips to true at most once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    chat_id: ChatId,
    current_step: StepRef,
    script_version: ScriptVersionName,
    history: Vec<HistoryEntry>,
    #[serde(default)]
    is_paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order: Option<OrderData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending_alert_id: Option<AlertId>,
    #[serde(default)]
    conversion_counted: bool,
    /// Store revision this copy was read at; 0 when never stored.
    #[serde(default)]
    revision: u64,
    created_at: Timestamp,
    last_activity_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    step_entered_at: Option<Timestamp>,
    /// An idle follow-up went out since the customer last wrote.
    #[serde(default)]
    follow_up_sent: bool,
    /// The current step was already reported as stuck.
    #[serde(default)]
    stale_flagged: bool,
}

impl ConversationState {
    /// Starts a session on the script's entry step.
    pub fn new(chat_id: ChatId, script_version: ScriptVersionName, entry_step: StepKey) -> Self {
        let now = Timestamp::now();
        Self {
            chat_id,
            current_step: StepRef::Step(entry_step),
            script_version,
            history: Vec::new(),
            is_paused: false,
            order: None,
            pending_alert_id: None,
            conversion_counted: false,
            revision: 0,
            created_at: now,
            last_activity_at: now,
            step_entered_at: Some(now),
            follow_up_sent: false,
            stale_flagged: false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    pub fn current_step(&self) -> &StepRef {
        &self.current_step
    }

    pub fn script_version(&self) -> &ScriptVersionName {
        &self.script_version
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// The last `limit` history entries, oldest first.
    pub fn recent_history(&self, limit: usize) -> &[HistoryEntry] {
        let start = self.history.len().saturating_sub(limit);
        &self.history[start..]
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn order(&self) -> Option<&OrderData> {
        self.order.as_ref()
    }

    pub fn pending_alert_id(&self) -> Option<AlertId> {
        self.pending_alert_id
    }

    pub fn conversion_counted(&self) -> bool {
        self.conversion_counted
    }

    pub fn is_completed(&self) -> bool {
        self.current_step.is_completed()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn last_activity_at(&self) -> &Timestamp {
        &self.last_activity_at
    }

    /// When the current step was entered; sessions stored before this was
    /// tracked fall back to their creation time.
    pub fn step_entered_at(&self) -> &Timestamp {
        self.step_entered_at.as_ref().unwrap_or(&self.created_at)
    }

    pub fn follow_up_sent(&self) -> bool {
        self.follow_up_sent
    }

    pub fn stale_flagged(&self) -> bool {
        self.stale_flagged
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends a new history entry stamped strictly after the previous one.
    pub fn append(
        &mut self,
        role: Role,
        content: impl Into<String>,
        attachments: Vec<String>,
    ) -> &HistoryEntry {
        let timestamp = Timestamp::now_after(self.history.last().map(|e| &e.timestamp));
        self.push_entry(HistoryEntry::new(role, content, timestamp).with_attachments(attachments))
    }

    /// Appends an existing entry, restamping it if it would break ordering.
    pub fn push_entry(&mut self, mut entry: HistoryEntry) -> &HistoryEntry {
        if let Some(last) = self.history.last() {
            if !entry.timestamp.is_after(&last.timestamp) {
                entry.timestamp = Timestamp::now_after(Some(&last.timestamp));
            }
        }
        self.last_activity_at = entry.timestamp;
        if entry.is_customer() {
            self.follow_up_sent = false;
        }
        self.history.push(entry);
        &self.history[self.history.len() - 1]
    }

    pub fn move_to(&mut self, step: StepRef) {
        if self.current_step != step {
            self.step_entered_at = Some(Timestamp::now());
            self.stale_flagged = false;
        }
        self.current_step = step;
    }

    /// Returns whether the flag changed.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        let changed = self.is_paused != paused;
        self.is_paused = paused;
        changed
    }

    /// Starts a draft order for `product`, keeping nothing from an earlier one
    /// unless it was for the same product.
    pub fn select_product(&mut self, product: &str) {
        let current = self.order.as_ref().and_then(|o| o.product.as_deref());
        if current != Some(product) {
            self.order = Some(OrderData::for_product(product));
        }
    }

    pub fn select_plan(&mut self, plan: impl Into<String>, price: Option<String>) {
        let order = self.order.get_or_insert_with(OrderData::default);
        order.plan = Some(plan.into());
        order.price = price;
    }

    pub fn capture_address(&mut self, address: impl Into<String>, postal_code: Option<PostalCode>) {
        let order = self.order.get_or_insert_with(OrderData::default);
        order.address = Some(address.into());
        order.postal_code = postal_code;
    }

    /// Returns false when there is no order to update.
    pub fn set_order_status(&mut self, status: OrderStatus) -> bool {
        match &mut self.order {
            Some(order) => {
                if status == OrderStatus::Pending && order.status != OrderStatus::Pending {
                    order.submitted_at = Some(Timestamp::now());
                }
                order.status = status;
                true
            }
            None => false,
        }
    }

    pub fn mark_follow_up_sent(&mut self) {
        self.follow_up_sent = true;
    }

    pub fn flag_stale(&mut self) {
        self.stale_flagged = true;
    }

    pub fn link_alert(&mut self, alert_id: Option<AlertId>) {
        self.pending_alert_id = alert_id;
    }

    /// Marks the session converted. Returns true only the first time.
    pub fn mark_converted(&mut self) -> bool {
        if self.conversion_counted {
            return false;
        }
        self.conversion_counted = true;
        true
    }

    pub(crate) fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn state() -> ConversationState {
        ConversationState::new(
            ChatId::new("5491100000000@c.us").unwrap(),
            ScriptVersionName::new("v1").unwrap(),
            StepKey::new("greeting").unwrap(),
        )
    }

    #[test]
    fn new_session_starts_on_entry_step() {
        let s = state();
        assert_eq!(s.current_step().to_string(), "greeting");
        assert!(s.history().is_empty());
        assert_eq!(s.revision(), 0);
        assert!(!s.is_paused());
    }

    #[test]
    fn mark_converted_only_once() {
        let mut s = state();
        assert!(s.mark_converted());
        assert!(!s.mark_converted());
        assert!(s.conversion_counted());
    }

    #[test]
    fn set_paused_reports_changes() {
        let mut s = state();
        assert!(s.set_paused(true));
        assert!(!s.set_paused(true));
        assert!(s.set_paused(false));
    }

    #[test]
    fn selecting_a_different_product_restarts_the_order() {
        let mut s = state();
        s.select_product("Cápsulas");
        s.select_plan("60", Some("46.900".into()));
        s.select_product("Cápsulas");
        assert_eq!(s.order().unwrap().plan.as_deref(), Some("60"));

        s.select_product("Semillas");
        assert_eq!(s.order().unwrap().plan, None);
        assert_eq!(s.order().unwrap().status, OrderStatus::Draft);
    }

    #[test]
    fn set_order_status_needs_an_order() {
        let mut s = state();
        assert!(!s.set_order_status(OrderStatus::Confirmed));
        s.select_product("Gotas");
        assert!(s.set_order_status(OrderStatus::Confirmed));
    }

    #[test]
    fn entering_a_new_step_clears_the_stale_flag() {
        let mut s = state();
        let entered = *s.step_entered_at();
        s.flag_stale();
        s.move_to(StepRef::Completed);
        assert!(!s.stale_flagged());
        assert!(!s.step_entered_at().is_before(&entered));
    }

    #[test]
    fn customer_message_rearms_the_follow_up() {
        let mut s = state();
        s.mark_follow_up_sent();
        s.append(Role::Bot, "seguimos?", vec![]);
        assert!(s.follow_up_sent());
        s.append(Role::Customer, "si", vec![]);
        assert!(!s.follow_up_sent());
    }

    #[test]
    fn pending_order_records_when_it_was_submitted() {
        let mut s = state();
        s.select_product("Gotas");
        assert!(s.order().unwrap().submitted_at.is_none());
        s.set_order_status(OrderStatus::Pending);
        let submitted = s.order().unwrap().submitted_at;
        assert!(submitted.is_some());
        s.set_order_status(OrderStatus::Pending);
        assert_eq!(s.order().unwrap().submitted_at, submitted);
    }

    #[test]
    fn push_entry_restamps_out_of_order_entries() {
        let mut s = state();
        let first = s.append(Role::Customer, "hola", vec![]).timestamp;
        let stale = HistoryEntry::new(Role::Bot, "viejo", first.plus_millis(-5_000));
        let pushed = s.push_entry(stale).timestamp;
        assert!(pushed.is_after(&first));
    }

    #[test]
    fn recent_history_keeps_the_tail() {
        let mut s = state();
        for i in 0..5 {
            s.append(Role::Customer, format!("m{}", i), vec![]);
        }
        let tail: Vec<_> = s.recent_history(2).iter().map(|e| e.content.as_str()).collect();
        assert_eq!(tail, vec!["m3", "m4"]);
        assert_eq!(s.recent_history(50).len(), 5);
    }

    proptest! {
        #[test]
        fn history_is_append_only(messages in prop::collection::vec("[a-z ]{1,12}", 1..20)) {
            let mut s = state();
            let mut snapshot: Vec<HistoryEntry> = Vec::new();
            for (i, m) in messages.iter().enumerate() {
                let role = if i % 2 == 0 { Role::Customer } else { Role::Bot };
                s.append(role, m.clone(), vec![]);
                prop_assert_eq!(s.history().len(), snapshot.len() + 1);
                prop_assert_eq!(&s.history()[..snapshot.len()], &snapshot[..]);
                snapshot = s.history().to_vec();
            }
            for pair in s.history().windows(2) {
                prop_assert!(pair[1].timestamp.is_after(&pair[0].timestamp));
            }
        }
    }
}
