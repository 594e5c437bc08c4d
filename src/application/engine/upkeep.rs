//! Scheduled housekeeping on quiet sessions.

use super::{DialogueEngine, EngineError, Turn, TurnOutcome};
use crate::application::GenerationToken;
use crate::domain::conversation::{FulfillmentStatus, Role, SessionChange};
use crate::domain::dialogue::{due_upkeep, Upkeep};
use crate::domain::escalation::AlertReason;
use crate::domain::foundation::{ChatId, Timestamp};

impl DialogueEngine {
    /// Runs `task` on the chat if it is still due at `now`.
    ///
    /// The task was chosen from an earlier snapshot; the decision is taken
    /// again on the stored session and a task no longer due does nothing.
    pub async fn run_upkeep(
        &self,
        chat_id: &ChatId,
        task: &Upkeep,
        now: &Timestamp,
        token: &GenerationToken,
    ) -> Result<TurnOutcome, EngineError> {
        let Some(state) = self.deps.sessions.get(chat_id).await? else {
            return Ok(TurnOutcome::default());
        };
        let registry = self.deps.scripts.snapshot();
        let version = registry.version(state.script_version());
        let step = version
            .as_deref()
            .and_then(|v| v.step(state.current_step().as_step()?));
        if due_upkeep(&state, step, &self.settings.upkeep, now).as_ref() != Some(task) {
            tracing::debug!(chat_id = %chat_id, task = task.label(), "upkeep no longer due");
            return Ok(TurnOutcome {
                step: Some(state.current_step().clone()),
                ..TurnOutcome::default()
            });
        }
        tracing::info!(chat_id = %chat_id, task = task.label(), "running upkeep");

        let mut turn = Turn::new(state);
        match task {
            Upkeep::AutoApprove => {
                self.confirm_order(&mut turn, FulfillmentStatus::AutoApproved).await;
                self.close_alert(&mut turn, "auto_aprobado").await;
                let minutes = self.settings.upkeep.auto_approve_after.num_minutes();
                let summary = turn
                    .tx
                    .state()
                    .order()
                    .map(|order| order.summary())
                    .unwrap_or_default();
                let notice = format!(
                    "⚡ Pedido AUTO-APROBADO ({minutes} min sin revisión)\n\
                     Cliente: {chat_id}\n{summary}\n⚠️ Revisar en panel de ventas."
                );
                self.deps.escalation.broadcast(&notice).await;
            }
            Upkeep::FlagStale => {
                turn.tx.apply(SessionChange::StaleFlagged);
                let state = turn.tx.state();
                let held = now.duration_since(state.step_entered_at()).num_minutes();
                let step = state.current_step();
                let details = format!("Paso: {step}, sin movimiento hace {held} min");
                self.escalate(&mut turn, AlertReason::StaleChat, details).await;
            }
            Upkeep::FollowUp(text) => {
                turn.tx.apply(SessionChange::FollowUpSent);
                turn.say(Role::Bot, text.clone(), None);
            }
            Upkeep::Expire => return self.expire(chat_id, token).await,
        }
        self.finish(turn, token).await
    }

    /// Deletes an abandoned session along with its alert and assignment.
    async fn expire(
        &self,
        chat_id: &ChatId,
        token: &GenerationToken,
    ) -> Result<TurnOutcome, EngineError> {
        if !token.is_current() {
            return Ok(TurnOutcome::discarded());
        }
        self.deps.sessions.reset(chat_id).await?;
        if self.deps.escalation.resolve(chat_id, "expirado").await.is_err() {
            tracing::debug!(chat_id = %chat_id, "no open alert on expiry");
        }
        self.deps.allocator.forget(chat_id)?;
        tracing::info!(chat_id = %chat_id, "session expired");
        Ok(TurnOutcome {
            state_changed: true,
            ..TurnOutcome::default()
        })
    }
}
