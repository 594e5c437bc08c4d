//! Inbound customer messages.

use std::sync::Arc;

use super::{DialogueEngine, EngineError, Turn, TurnOutcome};
use crate::application::GenerationToken;
use crate::config::OffScriptPolicy;
use crate::domain::conversation::{
    ConversationState, HistoryEntry, MessageReceived, OrderStatus, Role, SessionChange,
};
use crate::domain::dialogue::{classify, Capture, Decision, TurnInput};
use crate::domain::escalation::AlertReason;
use crate::domain::foundation::{text, ChatId, EventId, Timestamp};
use crate::domain::pricing::PriceCatalog;
use crate::domain::script::{first_match, ScriptConfigError, ScriptRegistry, ScriptVersion, StepRef};

impl DialogueEngine {
    /// Handles one inbound message from a customer.
    ///
    /// The message always lands in history, whatever else happens. Paused
    /// chats get no reply. The first message of a chat starts a session on
    /// the script version the allocator picks.
    pub async fn handle_inbound(
        &self,
        chat_id: &ChatId,
        text: &str,
        attachments: Vec<String>,
        token: &GenerationToken,
    ) -> Result<TurnOutcome, EngineError> {
        let registry = self.deps.scripts.snapshot();
        let catalog = self.deps.prices.snapshot();

        let Some(state) = self.deps.sessions.get(chat_id).await? else {
            return self
                .start_session(chat_id, text, attachments, token, &registry, &catalog)
                .await;
        };

        let paused = state.is_paused();
        let mut turn = Turn::new(state);
        self.receive(&mut turn, text, attachments, paused);

        if paused {
            tracing::debug!(chat_id = %chat_id, "chat paused, message recorded without reply");
            return self.finish(turn, token).await;
        }

        let Some(version) = registry.version(turn.tx.state().script_version()) else {
            let issue = ScriptConfigError::VersionNotFound {
                version: turn.tx.state().script_version().to_string(),
            };
            tracing::error!(chat_id = %chat_id, error = %issue, "script config error");
            self.hand_off(&mut turn, AlertReason::ScriptUnavailable, issue.to_string())
                .await;
            return self.finish(turn, token).await;
        };

        self.run_script(&mut turn, &version, &catalog, text, token)
            .await;
        self.finish(turn, token).await
    }

    /// Appends the inbound message and queues its event.
    fn receive(&self, turn: &mut Turn, text: &str, attachments: Vec<String>, paused: bool) {
        let entry = HistoryEntry::new(Role::Customer, text, Timestamp::now())
            .with_attachments(attachments.clone());
        turn.tx.append(entry);
        let event = MessageReceived {
            event_id: EventId::new(),
            chat_id: turn.chat_id(),
            content: text.to_string(),
            attachments,
            while_paused: paused,
            received_at: Timestamp::now(),
        };
        turn.record(&event);
    }

    async fn start_session(
        &self,
        chat_id: &ChatId,
        text: &str,
        attachments: Vec<String>,
        token: &GenerationToken,
        registry: &ScriptRegistry,
        catalog: &PriceCatalog,
    ) -> Result<TurnOutcome, EngineError> {
        let assigned = self
            .deps
            .allocator
            .assign(chat_id, registry.mode(), &registry.names())
            .await?;
        let version = registry.version(&assigned.version).ok_or_else(|| {
            ScriptConfigError::VersionNotFound {
                version: assigned.version.to_string(),
            }
        })?;

        tracing::info!(chat_id = %chat_id, version = %version.name(), "session created");
        let state = ConversationState::new(
            chat_id.clone(),
            version.name().clone(),
            version.entry_step().clone(),
        );
        let mut turn = Turn::new(state);
        self.receive(&mut turn, text, attachments, false);

        let normalized = text::normalize(text);
        if let Some(keyword) = text::find_keyword(&normalized, &self.settings.human_keywords) {
            tracing::info!(chat_id = %chat_id, keyword, "customer asked for a person");
            self.hand_off(&mut turn, AlertReason::HumanRequested, text).await;
            return self.finish(turn, token).await;
        }

        let entry = version.entry_step().clone();
        self.enter_step(&mut turn, &version, catalog, &entry);
        if let Some(index) = first_match(version.faq(), &normalized) {
            tracing::debug!(chat_id = %chat_id, faq = index, "FAQ answered on first contact");
            let reply = self.renderer.render(&version.faq()[index].response, catalog);
            turn.say(Role::Bot, reply, None);
        }
        self.finish(turn, token).await
    }

    /// Classifies the message against the chat's script and acts on it.
    async fn run_script(
        &self,
        turn: &mut Turn,
        version: &Arc<ScriptVersion>,
        catalog: &PriceCatalog,
        text: &str,
        token: &GenerationToken,
    ) {
        let chat_id = turn.chat_id();
        let classification = classify(&TurnInput {
            state: turn.tx.state(),
            version,
            catalog,
            text,
            human_keywords: &self.settings.human_keywords,
        });
        for issue in &classification.issues {
            tracing::error!(
                chat_id = %chat_id,
                version = %version.name(),
                error = %issue,
                "script config error"
            );
        }

        match classification.decision {
            Decision::HumanRequested { keyword } => {
                tracing::info!(
                    chat_id = %chat_id,
                    keyword = %keyword,
                    "customer asked for a person"
                );
                self.hand_off(turn, AlertReason::HumanRequested, text).await;
            }
            Decision::Advance { to, capture, .. } => {
                let order_captured = self.apply_capture(turn, capture);
                self.advance_to(turn, version, catalog, to);
                if order_captured {
                    let details = turn
                        .tx
                        .state()
                        .order()
                        .map(|o| o.summary())
                        .unwrap_or_default();
                    self.escalate(turn, AlertReason::OrderConfirmation, details)
                        .await;
                }
            }
            Decision::Faq {
                index,
                trigger_step,
            } => {
                tracing::debug!(chat_id = %chat_id, faq = index, "FAQ answered");
                let reply = self.renderer.render_for_order(
                    &version.faq()[index].response,
                    catalog,
                    turn.tx.state().order(),
                );
                turn.say(Role::Bot, reply, None);
                if let Some(step) = trigger_step {
                    self.advance_to(turn, version, catalog, StepRef::Step(step));
                }
            }
            Decision::Hold { reply } => {
                turn.say(Role::Bot, reply, None);
            }
            Decision::OffScript => self.off_script(turn, text, token).await,
        }
    }

    /// Stores captured order data. Returns true when an address completed
    /// the order, which then waits for an operator.
    fn apply_capture(&self, turn: &mut Turn, capture: Option<Capture>) -> bool {
        match capture {
            Some(Capture::Plan { plan, price }) => {
                turn.tx.apply(SessionChange::PlanSelected { plan, price });
                false
            }
            Some(Capture::Address {
                address,
                postal_code,
            }) => {
                turn.tx.apply(SessionChange::AddressCaptured {
                    address,
                    postal_code,
                });
                turn.tx.apply(SessionChange::OrderStatusSet(OrderStatus::Pending));
                true
            }
            None => false,
        }
    }

    async fn off_script(&self, turn: &mut Turn, text: &str, token: &GenerationToken) {
        let chat_id = turn.chat_id();
        match self.settings.off_script_policy {
            OffScriptPolicy::Escalate => {
                tracing::info!(chat_id = %chat_id, "off-script message escalated");
                self.hand_off(turn, AlertReason::Unclassified, text).await;
            }
            OffScriptPolicy::AiReply => {
                let result = self
                    .generate(turn.tx.state(), &self.settings.off_script_instruction)
                    .await;
                if !token.is_current() {
                    // A reset overtook the call; `finish` drops the turn.
                    return;
                }
                match result {
                    Ok(reply) => turn.say(Role::Bot, reply, None),
                    Err(error) => {
                        tracing::warn!(
                            chat_id = %chat_id,
                            generator = self.deps.generator.name(),
                            %error,
                            "reply generator failed, handing off"
                        );
                        self.hand_off(turn, AlertReason::AssistantUnavailable, error.to_string())
                            .await;
                    }
                }
            }
        }
    }
}
