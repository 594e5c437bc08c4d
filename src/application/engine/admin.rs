//! Operator actions: admin commands, pause, reset, the order ledger and
//! script/price edits.

use std::sync::Arc;

use super::{DialogueEngine, EngineError, Turn, TurnOutcome};
use crate::application::{publish, GenerationToken};
use crate::domain::conversation::{
    FulfillmentStatus, OrderConfirmed, OrderRecord, OrderStatus, OrderUpdate, PauseToggled, Role,
    SessionChange, SessionReset,
};
use crate::domain::escalation::{confirmation_message, AdminCommand};
use crate::domain::foundation::{ChatId, EventId, OrderId, Timestamp};
use crate::domain::pricing::PriceCatalog;
use crate::domain::script::{
    AllocationMode, Phase, ScriptDocument, ScriptVersion, ScriptVersionName,
};
use crate::domain::variant::ScriptActivated;
use crate::ports::SessionStoreError;

impl DialogueEngine {
    /// Applies an operator command to a chat's session.
    ///
    /// # Errors
    ///
    /// - `Session(NotFound)` if the chat has no session
    pub async fn apply_admin_command(
        &self,
        chat_id: &ChatId,
        command: AdminCommand,
        token: &GenerationToken,
    ) -> Result<TurnOutcome, EngineError> {
        let state = self
            .deps
            .sessions
            .get(chat_id)
            .await?
            .ok_or_else(|| SessionStoreError::NotFound(chat_id.clone()))?;
        tracing::info!(chat_id = %chat_id, command = command.label(), "admin command");

        let mut turn = Turn::new(state);
        match &command {
            AdminCommand::Navigate => {}
            AdminCommand::Discard => {}
            AdminCommand::Confirm => {
                self.confirm_order(&mut turn, FulfillmentStatus::Pending).await
            }
            AdminCommand::Takeover => self.pause(&mut turn, true),
            AdminCommand::Instruct(instruction) => {
                let result = self.generate(turn.tx.state(), instruction).await;
                if !token.is_current() {
                    return Ok(TurnOutcome::discarded());
                }
                match result {
                    Ok(reply) => turn.say(Role::Bot, reply, None),
                    Err(error) => {
                        tracing::warn!(
                            chat_id = %chat_id,
                            %error,
                            "reply generator failed, sending the instruction verbatim"
                        );
                        turn.say(Role::Admin, instruction.clone(), None);
                    }
                }
            }
        }

        if command.resolves_alert() {
            self.close_alert(&mut turn, command.label()).await;
        }
        self.finish(turn, token).await
    }

    /// Confirms the pending order; a chat waiting for approval moves on.
    ///
    /// The first confirmation of an order also enters it in the ledger with
    /// `fulfillment` as its starting status.
    pub(super) async fn confirm_order(&self, turn: &mut Turn, fulfillment: FulfillmentStatus) {
        let registry = self.deps.scripts.snapshot();
        let catalog = self.deps.prices.snapshot();

        let newly_confirmed = turn
            .tx
            .state()
            .order()
            .is_some_and(|order| order.status != OrderStatus::Confirmed);
        if turn.tx.state().order().is_some() {
            turn.tx
                .apply(SessionChange::OrderStatusSet(OrderStatus::Confirmed));
        }

        let version = registry.version(turn.tx.state().script_version());
        let approval_next = version.as_ref().and_then(|version| {
            let key = turn.tx.state().current_step().as_step()?;
            let step = version.step(key)?;
            match step.phase {
                Phase::WaitingAdminApproval { .. } => step.next.clone(),
                _ => None,
            }
        });

        match (version, approval_next) {
            (Some(version), Some(next)) => self.advance_to(turn, &version, &catalog, next),
            _ => {
                let text = confirmation_message(turn.tx.state().order());
                turn.say(Role::Bot, text, None);
            }
        }

        if let Some(order) = turn.tx.state().order().cloned() {
            if newly_confirmed {
                turn.ledger = Some(OrderRecord::new(turn.chat_id(), order.clone(), fulfillment));
            }
            let event = OrderConfirmed {
                event_id: EventId::new(),
                chat_id: turn.chat_id(),
                order,
                confirmed_at: Timestamp::now(),
            };
            turn.record(&event);
        }
    }

    fn pause(&self, turn: &mut Turn, paused: bool) {
        if turn.tx.state().is_paused() == paused {
            return;
        }
        turn.tx.apply(SessionChange::Paused(paused));
        tracing::info!(chat_id = %turn.chat_id(), paused, "pause toggled");
        let event = PauseToggled {
            event_id: EventId::new(),
            chat_id: turn.chat_id(),
            paused,
            toggled_at: Timestamp::now(),
        };
        turn.record(&event);
    }

    /// Turns the bot off or on for a chat. Alerts are left alone.
    ///
    /// Returns whether the flag changed.
    pub async fn set_paused(&self, chat_id: &ChatId, paused: bool) -> Result<bool, EngineError> {
        let state = self
            .deps
            .sessions
            .get(chat_id)
            .await?
            .ok_or_else(|| SessionStoreError::NotFound(chat_id.clone()))?;
        let mut turn = Turn::new(state);
        self.pause(&mut turn, paused);
        let changed = turn.tx.is_dirty();
        self.finish(turn, &GenerationToken::detached()).await?;
        Ok(changed)
    }

    /// Deletes the chat's session and closes its alert.
    ///
    /// The chat keeps its script version; its next message starts a new
    /// session on the entry step. Returns whether a session existed.
    pub async fn reset(&self, chat_id: &ChatId, generation: u64) -> Result<bool, EngineError> {
        let existed = self.deps.sessions.reset(chat_id).await?;
        if self.deps.escalation.resolve(chat_id, "reset").await.is_err() {
            tracing::debug!(chat_id = %chat_id, "no open alert to resolve on reset");
        }
        self.deps.allocator.restart(chat_id)?;
        tracing::info!(chat_id = %chat_id, generation, existed, "session reset");
        publish(
            self.deps.publisher.as_ref(),
            &SessionReset {
                event_id: EventId::new(),
                chat_id: chat_id.clone(),
                generation,
                reset_at: Timestamp::now(),
            },
        )
        .await;
        Ok(existed)
    }

    /// Confirmed orders, oldest first.
    pub async fn list_orders(&self) -> Result<Vec<OrderRecord>, EngineError> {
        Ok(self.deps.orders.list().await?)
    }

    /// Moves a ledger entry to `status`, replacing its tracking code when one
    /// is given.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound` if no entry has `id`
    pub async fn update_order(
        &self,
        id: &OrderId,
        status: FulfillmentStatus,
        tracking: Option<String>,
    ) -> Result<OrderRecord, EngineError> {
        let update = OrderUpdate {
            status,
            tracking,
            at: Timestamp::now(),
        };
        let record = self
            .deps
            .orders
            .update(id, &update)
            .await?
            .ok_or(EngineError::OrderNotFound(*id))?;
        tracing::info!(order_id = %id, status = status.label(), "order status updated");
        Ok(record)
    }

    /// Adds or replaces a script version after strict validation.
    pub async fn author_script(
        &self,
        name: ScriptVersionName,
        document: ScriptDocument,
    ) -> Result<Arc<ScriptVersion>, EngineError> {
        Ok(self.deps.scripts.author(name, document).await?)
    }

    /// Switches the allocation mode for new sessions.
    pub async fn set_allocation_mode(&self, mode: AllocationMode) -> Result<(), EngineError> {
        self.deps.scripts.set_mode(mode.clone()).await?;
        publish(self.deps.publisher.as_ref(), &ScriptActivated::new(mode)).await;
        Ok(())
    }

    pub async fn update_prices(&self, catalog: PriceCatalog) -> Result<(), EngineError> {
        Ok(self.deps.prices.update(catalog).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{chat, Harness};
    use super::*;
    use crate::adapters::ai::MockReplyGenerator;
    use crate::domain::escalation::AlertReason;
    use crate::domain::script::{FlowStep, StepKey, StepRef};
    use crate::ports::ReplyError;
    use std::collections::BTreeMap;

    async fn with_open_order(h: &Harness) {
        for text in ["hola", "si", "60", "capsulas", "dale", "60", "si"] {
            h.inbound("c1", text).await;
        }
        let outcome = h.inbound("c1", "Juan Perez, Av. Siempreviva 742, 1414 CABA").await;
        assert_eq!(outcome.step, Some("legal_acceptance".parse().unwrap()));
    }

    #[tokio::test]
    async fn confirm_accepts_order_and_resolves_alert() {
        let h = Harness::new().await;
        with_open_order(&h).await;
        let alert = h.engine.escalation().open_for(&chat("c1")).unwrap();
        assert_eq!(alert.reason(), AlertReason::OrderConfirmation);

        let outcome = h.admin("c1", "confirmar").await;

        let state = h.state("c1").await;
        assert_eq!(state.order().unwrap().status, OrderStatus::Confirmed);
        assert!(!state.is_paused());
        assert!(state.pending_alert_id().is_none());
        assert!(h.engine.escalation().open_for(&chat("c1")).is_none());
        assert!(outcome.texts()[0].contains("confirmado"));
        assert!(h.bus.has_event("conversation.order_confirmed.v1"));
    }

    #[tokio::test]
    async fn confirmed_order_enters_the_ledger_once() {
        let h = Harness::new().await;
        with_open_order(&h).await;
        h.admin("c1", "confirmar").await;
        h.admin("c1", "confirmar").await;

        let orders = h.engine.list_orders().await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].chat_id(), &chat("c1"));
        assert_eq!(orders[0].status(), FulfillmentStatus::Pending);
        assert_eq!(orders[0].order().plan.as_deref(), Some("60"));

        let shipped = h
            .engine
            .update_order(&orders[0].id(), FulfillmentStatus::Shipped, Some("CA1".into()))
            .await
            .unwrap();
        assert_eq!(shipped.tracking(), Some("CA1"));
        let missing = h
            .engine
            .update_order(&OrderId::new(), FulfillmentStatus::Shipped, None)
            .await;
        assert!(matches!(missing, Err(EngineError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn discard_resolves_without_touching_the_order() {
        let h = Harness::new().await;
        with_open_order(&h).await;
        let outcome = h.admin("c1", "descartar").await;

        assert!(outcome.outbound.is_empty());
        assert!(h.engine.escalation().open_for(&chat("c1")).is_none());
        assert_eq!(h.state("c1").await.order().unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn navigate_changes_nothing() {
        let h = Harness::new().await;
        with_open_order(&h).await;
        let before = h.state("c1").await;
        let outcome = h.admin("c1", "chat").await;

        assert!(!outcome.state_changed);
        assert!(h.engine.escalation().open_for(&chat("c1")).is_some());
        assert_eq!(h.state("c1").await.history().len(), before.history().len());
    }

    #[tokio::test]
    async fn takeover_pauses_and_resolves() {
        let h = Harness::new().await;
        h.inbound("c1", "hola").await;
        h.inbound("c1", "quiero hablar con un humano").await;

        h.admin("c1", "me encargo").await;
        assert!(h.state("c1").await.is_paused());
        assert!(h.engine.escalation().open_for(&chat("c1")).is_none());
        assert!(h.bus.has_event("conversation.pause_toggled.v1"));
    }

    #[tokio::test]
    async fn instruction_goes_through_the_generator() {
        let generator = MockReplyGenerator::new().with_response("¡Te regalo el envío! 🎁");
        let h = Harness::with_generator(generator.clone()).await;
        h.inbound("c1", "hola").await;
        let outcome = h.admin("c1", "Ofrecele envío gratis").await;

        assert_eq!(outcome.texts(), vec!["¡Te regalo el envío! 🎁"]);
        assert_eq!(generator.last_call().unwrap().instruction, "Ofrecele envío gratis");
    }

    #[tokio::test]
    async fn instruction_is_sent_verbatim_when_generator_fails() {
        let generator = MockReplyGenerator::new().with_error(ReplyError::Disabled);
        let h = Harness::with_generator(generator).await;
        h.inbound("c1", "hola").await;
        let outcome = h.admin("c1", "Hola, soy Ana del equipo").await;

        assert_eq!(outcome.outbound[0].role, Role::Admin);
        assert_eq!(outcome.texts(), vec!["Hola, soy Ana del equipo"]);
    }

    #[tokio::test]
    async fn confirm_at_admin_approval_advances() {
        let h = Harness::new().await;
        let mut flow = BTreeMap::new();
        let key = |s: &str| StepKey::new(s).unwrap();
        flow.insert(
            key("greeting"),
            FlowStep::new(Phase::Greeting, "hola").with_next(StepRef::Step(key("review"))),
        );
        flow.insert(
            key("review"),
            FlowStep::new(Phase::admin_approval(), "Revisamos tu pedido")
                .with_next(StepRef::Step(key("shipped"))),
        );
        flow.insert(
            key("shipped"),
            FlowStep::new(Phase::WaitingChoice, "¡Sale hoy!"),
        );
        let name = ScriptVersionName::new("v2").unwrap();
        h.engine
            .author_script(name.clone(), ScriptDocument::new(key("greeting"), flow))
            .await
            .unwrap();
        h.engine
            .set_allocation_mode(AllocationMode::Active(name))
            .await
            .unwrap();

        h.inbound("c9", "hola").await;
        let held = h.inbound("c9", "ya pagué").await;
        assert_eq!(held.step, Some("review".parse().unwrap()));
        let hold = h.inbound("c9", "¿y?").await;
        assert_eq!(hold.step, Some("review".parse().unwrap()));

        let outcome = h.admin("c9", "confirmar").await;
        assert_eq!(outcome.step, Some("shipped".parse().unwrap()));
        assert_eq!(outcome.texts(), vec!["¡Sale hoy!"]);
        assert!(h.bus.has_event("variant.script_activated.v1"));
    }

    #[tokio::test]
    async fn pause_is_idempotent_and_independent_of_alerts() {
        let h = Harness::new().await;
        h.inbound("c1", "hola").await;
        assert!(h.engine.set_paused(&chat("c1"), true).await.unwrap());
        assert!(!h.engine.set_paused(&chat("c1"), true).await.unwrap());
        assert!(h.engine.escalation().open_for(&chat("c1")).is_none());
        assert!(h.engine.set_paused(&chat("c1"), false).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_chat_is_not_found() {
        let h = Harness::new().await;
        let result = h.engine.set_paused(&chat("ghost"), true).await;
        assert!(matches!(
            result,
            Err(EngineError::Session(SessionStoreError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn reset_clears_session_and_alert() {
        let h = Harness::new().await;
        h.inbound("c1", "hola").await;
        h.inbound("c1", "quiero hablar con un humano").await;

        assert!(h.engine.reset(&chat("c1"), 1).await.unwrap());
        assert!(h.engine.sessions().get(&chat("c1")).await.unwrap().is_none());
        assert!(h.engine.escalation().open_for(&chat("c1")).is_none());

        let outcome = h.inbound("c1", "hola de nuevo").await;
        assert_eq!(outcome.step, Some("greeting".parse().unwrap()));
        assert_eq!(h.state("c1").await.history().len(), 2);
        let v1 = ScriptVersionName::new("v1").unwrap();
        let stats = h.engine.allocator().stats(&v1).await.unwrap();
        assert_eq!(stats.started, 2);
    }
}
