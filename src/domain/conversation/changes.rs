//! Recorded session mutations, replayable onto a fresher copy.
//!
//! A turn mutates its working copy through a [`SessionTransaction`], which
//! keeps the list of changes it applied. When the store reports that the copy
//! went stale, the same changes are replayed onto the stored state instead of
//! redoing the turn (the customer already got the reply).

use super::message::HistoryEntry;
use super::order::{OrderStatus, PostalCode};
use super::state::ConversationState;
use crate::domain::foundation::AlertId;
use crate::domain::script::StepRef;

/// One mutation of a [`ConversationState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    Appended(HistoryEntry),
    MovedTo(StepRef),
    Paused(bool),
    ProductSelected(String),
    PlanSelected {
        plan: String,
        price: Option<String>,
    },
    AddressCaptured {
        address: String,
        postal_code: Option<PostalCode>,
    },
    OrderStatusSet(OrderStatus),
    AlertLinked(Option<AlertId>),
    Converted,
    FollowUpSent,
    StaleFlagged,
}

impl SessionChange {
    fn apply_to(&self, state: &mut ConversationState) {
        match self {
            SessionChange::Appended(entry) => {
                state.push_entry(entry.clone());
            }
            SessionChange::MovedTo(step) => state.move_to(step.clone()),
            SessionChange::Paused(paused) => {
                state.set_paused(*paused);
            }
            SessionChange::ProductSelected(product) => state.select_product(product),
            SessionChange::PlanSelected { plan, price } => {
                state.select_plan(plan.clone(), price.clone())
            }
            SessionChange::AddressCaptured {
                address,
                postal_code,
            } => state.capture_address(address.clone(), postal_code.clone()),
            SessionChange::OrderStatusSet(status) => {
                state.set_order_status(*status);
            }
            SessionChange::AlertLinked(alert) => state.link_alert(*alert),
            SessionChange::Converted => {
                state.mark_converted();
            }
            SessionChange::FollowUpSent => state.mark_follow_up_sent(),
            SessionChange::StaleFlagged => state.flag_stale(),
        }
    }
}

/// A working copy plus the change log that produced it.
#[derive(Debug, Clone)]
pub struct SessionTransaction {
    state: ConversationState,
    changes: Vec<SessionChange>,
}

impl SessionTransaction {
    pub fn begin(state: ConversationState) -> Self {
        Self {
            state,
            changes: Vec::new(),
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn changes(&self) -> &[SessionChange] {
        &self.changes
    }

    pub fn is_dirty(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn apply(&mut self, change: SessionChange) {
        change.apply_to(&mut self.state);
        self.changes.push(change);
    }

    /// Appends an entry and records it with the timestamp it was given.
    pub fn append(&mut self, entry: HistoryEntry) {
        let stamped = self.state.push_entry(entry).clone();
        self.changes.push(SessionChange::Appended(stamped));
    }

    /// Marks the session converted. Returns true only when this call did it.
    pub fn convert(&mut self) -> bool {
        if self.state.conversion_counted() {
            return false;
        }
        self.apply(SessionChange::Converted);
        true
    }

    /// Replays the recorded changes onto `fresh`, keeping the log.
    ///
    /// Returns whether a conversion recorded here still counts, i.e. `fresh`
    /// was not already converted.
    pub fn rebase(&mut self, fresh: ConversationState) -> bool {
        let converts = !fresh.conversion_counted()
            && self.changes.contains(&SessionChange::Converted);
        let mut state = fresh;
        for change in &self.changes {
            change.apply_to(&mut state);
        }
        self.state = state;
        converts
    }

    pub(crate) fn set_revision(&mut self, revision: u64) {
        self.state.set_revision(revision);
    }
}
