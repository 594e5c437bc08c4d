//! The dialogue engine: one turn of one chat at a time.
//!
//! The engine never runs two turns of the same chat concurrently; the
//! per-chat workers in [`crate::application::runtime`] guarantee that. A turn
//! builds its changes on a [`SessionTransaction`], commits them with a
//! compare-and-set write, then publishes events and sends the outbound
//! messages. Sending happens after the commit, so history always holds what
//! the customer was sent.

mod admin;
mod turn;
mod upkeep;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::{publish, AllocatorError, EscalationManager, GenerationToken, LibraryError};
use super::{PriceBook, ScriptLibrary, VariantAllocator};
use crate::config::{AiConfig, EngineConfig, OffScriptPolicy, SchedulerConfig};
use crate::domain::conversation::{
    ConversationState, ConversionRecorded, HistoryEntry, MessageSent, OrderRecord, Role,
    SessionChange, SessionTransaction, StepAdvanced,
};
use crate::domain::dialogue::UpkeepPolicy;
use crate::domain::escalation::AlertReason;
use crate::domain::foundation::{
    AlertId, ChatId, DomainError, ErrorCode, EventEnvelope, EventId, OrderId,
    SerializableDomainEvent, Timestamp, ValidationError,
};
use crate::domain::pricing::{PriceCatalog, TemplateRenderer};
use crate::domain::script::{ScriptConfigError, ScriptVersion, StepKey, StepRef};
use crate::ports::{
    EventPublisher, MessageTransport, OrderStore, ReplyError, ReplyGenerator, ReplyRequest,
    SessionStore, SessionStoreError, StoreError,
};

/// Compare-and-set attempts before a commit gives up.
const MAX_COMMIT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Session(#[from] SessionStoreError),

    #[error(transparent)]
    Script(#[from] ScriptConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Allocator(#[from] AllocatorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),
}

impl From<EngineError> for DomainError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Session(e) => e.into(),
            EngineError::Script(e) => e.into(),
            EngineError::Validation(e) => e.into(),
            EngineError::Library(e) => e.into(),
            EngineError::Allocator(e) => e.into(),
            EngineError::Store(e) => e.into(),
            EngineError::OrderNotFound(id) => {
                DomainError::new(ErrorCode::OrderNotFound, format!("order {id} not found"))
            }
        }
    }
}

/// Tunables of the turn logic.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub off_script_policy: OffScriptPolicy,
    /// Sent whenever a person takes over, including every AI fallback.
    pub handoff_message: String,
    pub human_keywords: Vec<String>,
    pub off_script_instruction: String,
    /// Upper bound for one reply-generator call.
    pub ai_timeout: Duration,
    /// History entries sent to the reply generator.
    pub max_history: usize,
    /// When quiet sessions get follow-ups, approvals and expiry.
    pub upkeep: UpkeepPolicy,
}

impl EngineSettings {
    pub fn from_config(engine: &EngineConfig, ai: &AiConfig, scheduler: &SchedulerConfig) -> Self {
        Self {
            off_script_policy: engine.off_script_policy,
            handoff_message: engine.handoff_message.clone(),
            human_keywords: engine.human_keywords_list(),
            off_script_instruction: engine.off_script_instruction.clone(),
            ai_timeout: ai.timeout(),
            max_history: ai.max_history,
            upkeep: scheduler.policy(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(
            &EngineConfig::default(),
            &AiConfig::default(),
            &SchedulerConfig::default(),
        )
    }
}

/// A message the engine sent (or tried to send) to the customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub role: Role,
    pub text: String,
    pub media: Option<String>,
}

/// What one turn did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TurnOutcome {
    pub outbound: Vec<OutboundMessage>,
    pub state_changed: bool,
    pub alert_raised: Option<AlertId>,
    /// The chat's step after the turn; `None` when no session exists.
    pub step: Option<StepRef>,
    /// True when a reset overtook the turn and its results were dropped.
    pub discarded: bool,
}

impl TurnOutcome {
    fn discarded() -> Self {
        Self {
            discarded: true,
            ..Self::default()
        }
    }

    /// Texts of the outbound messages, in send order.
    pub fn texts(&self) -> Vec<&str> {
        self.outbound.iter().map(|m| m.text.as_str()).collect()
    }
}

/// Everything the engine talks to.
#[derive(Clone)]
pub struct EngineDeps {
    pub sessions: Arc<dyn SessionStore>,
    pub scripts: Arc<ScriptLibrary>,
    pub prices: Arc<PriceBook>,
    pub allocator: VariantAllocator,
    pub escalation: Arc<EscalationManager>,
    pub generator: Arc<dyn ReplyGenerator>,
    pub transport: Arc<dyn MessageTransport>,
    pub publisher: Arc<dyn EventPublisher>,
    pub orders: Arc<dyn OrderStore>,
}

pub struct DialogueEngine {
    deps: EngineDeps,
    renderer: TemplateRenderer,
    settings: EngineSettings,
}

/// Changes, replies and events accumulated during one turn.
struct Turn {
    tx: SessionTransaction,
    outbound: Vec<OutboundMessage>,
    events: Vec<EventEnvelope>,
    alert: Option<AlertId>,
    converted: bool,
    /// Ledger entry written once the turn is committed.
    ledger: Option<OrderRecord>,
}

impl Turn {
    fn new(state: ConversationState) -> Self {
        Self {
            tx: SessionTransaction::begin(state),
            outbound: Vec::new(),
            events: Vec::new(),
            alert: None,
            converted: false,
            ledger: None,
        }
    }

    fn chat_id(&self) -> ChatId {
        self.tx.state().chat_id().clone()
    }

    fn record<E: SerializableDomainEvent>(&mut self, event: &E) {
        match event.to_envelope() {
            Ok(envelope) => self.events.push(envelope),
            Err(error) => {
                tracing::error!(
                    event_type = event.event_type(),
                    %error,
                    "failed to serialize event"
                )
            }
        }
    }

    /// Queues a reply and records it in history.
    fn say(&mut self, role: Role, text: String, media: Option<String>) {
        let entry = HistoryEntry::new(role, text.clone(), Timestamp::now())
            .with_attachments(media.iter().cloned().collect());
        self.tx.append(entry);
        self.outbound.push(OutboundMessage { role, text, media });
    }

    fn move_to(&mut self, to: StepRef) {
        let from = self.tx.state().current_step().clone();
        if from == to {
            return;
        }
        self.tx.apply(SessionChange::MovedTo(to.clone()));
        tracing::info!(
            chat_id = %self.tx.state().chat_id(),
            from = %from,
            to = %to,
            "step advanced"
        );
        let event = StepAdvanced {
            event_id: EventId::new(),
            chat_id: self.chat_id(),
            script_version: self.tx.state().script_version().clone(),
            from,
            to,
            advanced_at: Timestamp::now(),
        };
        self.record(&event);
    }
}

impl DialogueEngine {
    pub fn new(deps: EngineDeps, settings: EngineSettings) -> Self {
        Self {
            deps,
            renderer: TemplateRenderer,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.deps.sessions
    }

    pub fn scripts(&self) -> &Arc<ScriptLibrary> {
        &self.deps.scripts
    }

    pub fn prices(&self) -> &Arc<PriceBook> {
        &self.deps.prices
    }

    pub fn allocator(&self) -> &VariantAllocator {
        &self.deps.allocator
    }

    pub fn escalation(&self) -> &Arc<EscalationManager> {
        &self.deps.escalation
    }

    pub fn orders(&self) -> &Arc<dyn OrderStore> {
        &self.deps.orders
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Turn building blocks
    // ─────────────────────────────────────────────────────────────────────────

    /// Moves to `to` and says what arriving there says.
    fn advance_to(
        &self,
        turn: &mut Turn,
        version: &ScriptVersion,
        catalog: &PriceCatalog,
        to: StepRef,
    ) {
        turn.move_to(to.clone());
        match to {
            StepRef::Step(key) => self.enter_step(turn, version, catalog, &key),
            StepRef::Completed => {
                let text = self.renderer.render_for_order(
                    version.completion_message(),
                    catalog,
                    turn.tx.state().order(),
                );
                turn.say(Role::Bot, text, None);
                if turn.tx.convert() {
                    turn.converted = true;
                }
            }
        }
    }

    /// Applies the step's product and queues its rendered response.
    fn enter_step(
        &self,
        turn: &mut Turn,
        version: &ScriptVersion,
        catalog: &PriceCatalog,
        key: &StepKey,
    ) {
        let Some(step) = version.step(key) else {
            tracing::error!(
                chat_id = %turn.chat_id(),
                version = %version.name(),
                step = %key,
                "entered a step the script does not define"
            );
            return;
        };
        if let Some(product) = &step.product {
            turn.tx.apply(SessionChange::ProductSelected(product.clone()));
        }
        let order = turn.tx.state().order();
        let text = self
            .renderer
            .render_for_order(&step.response_template, catalog, order);
        turn.say(Role::Bot, text, step.image_ref.clone());
    }

    /// Raises (or refreshes) the chat's alert and links it to the session.
    async fn escalate(&self, turn: &mut Turn, reason: AlertReason, details: impl Into<String>) {
        let alert = self
            .deps
            .escalation
            .raise_alert(
                turn.tx.state().chat_id(),
                reason,
                details,
                turn.tx.state().order().cloned(),
            )
            .await;
        if turn.tx.state().pending_alert_id() != Some(alert.id()) {
            turn.tx.apply(SessionChange::AlertLinked(Some(alert.id())));
        }
        turn.alert = Some(alert.id());
    }

    /// Escalates and tells the customer a person is coming.
    async fn hand_off(&self, turn: &mut Turn, reason: AlertReason, details: impl Into<String>) {
        self.escalate(turn, reason, details).await;
        turn.say(Role::Bot, self.settings.handoff_message.clone(), None);
    }

    /// Resolves the chat's alert, if one is open, and unlinks it.
    async fn close_alert(&self, turn: &mut Turn, resolution: &str) {
        let chat_id = turn.chat_id();
        if self.deps.escalation.resolve(&chat_id, resolution).await.is_err() {
            tracing::debug!(chat_id = %chat_id, "no open alert to resolve");
        }
        if turn.tx.state().pending_alert_id().is_some() {
            turn.tx.apply(SessionChange::AlertLinked(None));
        }
    }

    /// Asks the reply generator, bounded by the configured timeout.
    async fn generate(
        &self,
        state: &ConversationState,
        instruction: &str,
    ) -> Result<String, ReplyError> {
        let request = ReplyRequest::new(state.chat_id().clone(), instruction)
            .with_history(state.recent_history(self.settings.max_history));
        let timeout = self.settings.ai_timeout;
        match tokio::time::timeout(timeout, self.deps.generator.generate_reply(request)).await {
            Ok(result) => result,
            Err(_) => Err(ReplyError::Timeout(timeout.as_secs())),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commit, publish, send
    // ─────────────────────────────────────────────────────────────────────────

    /// Commits the turn, then publishes its events and sends its replies.
    async fn finish(
        &self,
        mut turn: Turn,
        token: &GenerationToken,
    ) -> Result<TurnOutcome, EngineError> {
        if !token.is_current() {
            tracing::debug!(chat_id = %turn.chat_id(), "turn overtaken by a reset, dropped");
            return Ok(TurnOutcome::discarded());
        }

        let chat_id = turn.chat_id();
        let state_changed = turn.tx.is_dirty();
        if state_changed && !self.commit(&mut turn).await? {
            tracing::debug!(chat_id = %chat_id, "session vanished during commit, turn dropped");
            return Ok(TurnOutcome::discarded());
        }

        if let Some(record) = turn.ledger.take() {
            if let Err(error) = self.deps.orders.append(&record).await {
                tracing::error!(
                    chat_id = %chat_id,
                    order_id = %record.id(),
                    %error,
                    "failed to record order"
                );
            }
        }

        for envelope in std::mem::take(&mut turn.events) {
            if let Err(error) = self.deps.publisher.publish(envelope).await {
                tracing::warn!(chat_id = %chat_id, %error, "event delivery failed");
            }
        }

        if turn.converted {
            let state = turn.tx.state();
            if let Err(error) = self.deps.allocator.record_completion(state.script_version()) {
                tracing::error!(chat_id = %chat_id, %error, "failed to count conversion");
            }
            publish(
                self.deps.publisher.as_ref(),
                &ConversionRecorded {
                    event_id: EventId::new(),
                    chat_id: chat_id.clone(),
                    script_version: state.script_version().clone(),
                    order: state.order().cloned(),
                    converted_at: Timestamp::now(),
                },
            )
            .await;
        }

        if let Some(unsent) = self.deliver(&chat_id, &turn.outbound).await {
            self.escalate_failed_delivery(&mut turn, &unsent).await;
        }

        Ok(TurnOutcome {
            step: Some(turn.tx.state().current_step().clone()),
            outbound: turn.outbound,
            state_changed,
            alert_raised: turn.alert,
            discarded: false,
        })
    }

    /// Writes the transaction, replaying it onto a fresher copy on conflict.
    ///
    /// Returns false when the session was deleted underneath the turn.
    async fn commit(&self, turn: &mut Turn) -> Result<bool, EngineError> {
        let chat_id = turn.chat_id();
        let mut attempts = 0;
        loop {
            match self.deps.sessions.put(turn.tx.state()).await {
                Ok(revision) => {
                    turn.tx.set_revision(revision);
                    return Ok(true);
                }
                Err(SessionStoreError::Conflict { expected, actual, .. })
                    if attempts + 1 < MAX_COMMIT_ATTEMPTS =>
                {
                    attempts += 1;
                    tracing::debug!(
                        chat_id = %chat_id,
                        expected,
                        actual,
                        "stale session, replaying turn"
                    );
                    let Some(fresh) = self.deps.sessions.get(&chat_id).await? else {
                        return Ok(false);
                    };
                    let still_converts = turn.tx.rebase(fresh);
                    turn.converted = turn.converted && still_converts;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Sends the replies in order and stops at the first failure.
    ///
    /// Returns the text that could not be sent.
    async fn deliver(&self, chat_id: &ChatId, outbound: &[OutboundMessage]) -> Option<String> {
        for message in outbound {
            let sent = match &message.media {
                Some(media) => self.deps.transport.send_media(chat_id, media, None).await,
                None => Ok(()),
            };
            let sent = match sent {
                Ok(()) => self.deps.transport.send_text(chat_id, &message.text).await,
                Err(error) => Err(error),
            };

            if let Err(error) = sent {
                tracing::warn!(chat_id = %chat_id, %error, "failed to deliver reply");
                return Some(message.text.clone());
            }

            publish(
                self.deps.publisher.as_ref(),
                &MessageSent {
                    event_id: EventId::new(),
                    chat_id: chat_id.clone(),
                    role: message.role,
                    content: message.text.clone(),
                    media: message.media.clone(),
                    sent_at: Timestamp::now(),
                },
            )
            .await;
        }
        None
    }

    /// Raises the delivery alert and links it to the committed session in a
    /// second commit.
    async fn escalate_failed_delivery(&self, turn: &mut Turn, unsent: &str) {
        let mut follow_up = Turn::new(turn.tx.state().clone());
        let details = format!("No se pudo enviar: {unsent}");
        self.escalate(&mut follow_up, AlertReason::DeliveryFailed, details)
            .await;
        turn.alert = follow_up.alert;
        if !follow_up.tx.is_dirty() {
            return;
        }
        match self.commit(&mut follow_up).await {
            Ok(true) => turn.tx = follow_up.tx,
            Ok(false) => {
                tracing::debug!(chat_id = %turn.chat_id(), "session gone before alert link");
            }
            Err(error) => {
                tracing::error!(chat_id = %turn.chat_id(), %error, "failed to link delivery alert");
            }
        }
    }
}

impl std::fmt::Debug for DialogueEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogueEngine")
            .field("settings", &self.settings)
            .field("generator", &self.deps.generator.name())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::ai::MockReplyGenerator;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::storage::{
        InMemoryOrderStore, InMemoryPriceStore, InMemoryScriptStore, InMemorySessionArchive,
        InMemoryStatsStore, WriteBehindSessionStore,
    };
    use crate::adapters::transport::RecordingTransport;
    use crate::application::EscalationSettings;
    use crate::domain::escalation::AdminCommand;

    pub fn chat(s: &str) -> ChatId {
        ChatId::new(s).unwrap()
    }

    /// An engine over in-memory adapters, seeded allocator included.
    pub struct Harness {
        pub engine: Arc<DialogueEngine>,
        pub bus: Arc<InMemoryEventBus>,
        pub transport: Arc<RecordingTransport>,
        pub orders: Arc<InMemoryOrderStore>,
    }

    impl Harness {
        pub async fn new() -> Self {
            Self::with_generator(MockReplyGenerator::new()).await
        }

        pub async fn with_generator(generator: MockReplyGenerator) -> Self {
            Self::build(generator, |_| {}).await
        }

        pub async fn with_stats(stats: Arc<InMemoryStatsStore>) -> Self {
            Self::assemble(MockReplyGenerator::new(), stats, |_| {}).await
        }

        pub async fn build(
            generator: MockReplyGenerator,
            tune: impl FnOnce(&mut EngineSettings),
        ) -> Self {
            Self::assemble(generator, Arc::new(InMemoryStatsStore::new()), tune).await
        }

        async fn assemble(
            generator: MockReplyGenerator,
            stats: Arc<InMemoryStatsStore>,
            tune: impl FnOnce(&mut EngineSettings),
        ) -> Self {
            let bus = Arc::new(InMemoryEventBus::new());
            let transport = Arc::new(RecordingTransport::new());
            let orders = Arc::new(InMemoryOrderStore::new());
            let scripts = ScriptLibrary::load(Arc::new(InMemoryScriptStore::new()))
                .await
                .unwrap();
            let prices = PriceBook::load(Arc::new(InMemoryPriceStore::new()))
                .await
                .unwrap();
            let (allocator, _task) = VariantAllocator::spawn(stats, Some(1)).await.unwrap();
            let escalation = EscalationManager::new(
                transport.clone(),
                bus.clone(),
                EscalationSettings::default(),
            );
            let deps = EngineDeps {
                sessions: Arc::new(WriteBehindSessionStore::new(Arc::new(
                    InMemorySessionArchive::new(),
                ))),
                scripts: Arc::new(scripts),
                prices: Arc::new(prices),
                allocator,
                escalation: Arc::new(escalation),
                generator: Arc::new(generator),
                transport: transport.clone(),
                publisher: bus.clone(),
                orders: orders.clone(),
            };
            let mut settings = EngineSettings::default();
            tune(&mut settings);
            Self {
                engine: Arc::new(DialogueEngine::new(deps, settings)),
                bus,
                transport,
                orders,
            }
        }

        pub async fn inbound(&self, chat_id: &str, text: &str) -> TurnOutcome {
            self.engine
                .handle_inbound(&chat(chat_id), text, Vec::new(), &GenerationToken::detached())
                .await
                .unwrap()
        }

        pub async fn admin(&self, chat_id: &str, raw: &str) -> TurnOutcome {
            self.engine
                .apply_admin_command(
                    &chat(chat_id),
                    AdminCommand::parse(raw).unwrap(),
                    &GenerationToken::detached(),
                )
                .await
                .unwrap()
        }

        pub async fn state(&self, chat_id: &str) -> ConversationState {
            self.engine
                .sessions()
                .get(&chat(chat_id))
                .await
                .unwrap()
                .unwrap()
        }
    }

    #[tokio::test]
    async fn completed_session_counts_one_conversion() {
        let h = Harness::new().await;
        for text in ["hola", "si", "60", "capsulas", "dale", "120", "si"] {
            h.inbound("c1", text).await;
        }
        h.inbound("c1", "Ana Gomez, San Martin 1234, 5000 Cordoba").await;
        let outcome = h
            .inbound("c1", "Leí y acepto las condiciones de envío")
            .await;

        assert_eq!(outcome.step, Some(StepRef::Completed));
        assert!(outcome.texts()[0].contains("Gracias"));
        assert!(h.state("c1").await.conversion_counted());

        // Further messages on a completed session never count again
        h.inbound("c1", "acepto las condiciones, lei todo").await;
        h.inbound("c1", "gracias!").await;
        let v1 = crate::domain::script::ScriptVersionName::new("v1").unwrap();
        let stats = h.engine.allocator().stats(&v1).await.unwrap();
        assert_eq!(stats.started, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(
            h.bus
                .events_of_type("conversation.conversion_recorded.v1")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn commit_replays_onto_a_concurrent_write() {
        let h = Harness::new().await;
        h.inbound("c1", "hola").await;

        let stale = h.state("c1").await;
        let mut fresh = stale.clone();
        fresh.append(Role::Admin, "nota", Vec::new());
        h.engine.sessions().put(&fresh).await.unwrap();

        let mut turn = Turn::new(stale);
        turn.say(Role::Bot, "hola de nuevo".to_string(), None);
        let outcome = h
            .engine
            .finish(turn, &GenerationToken::detached())
            .await
            .unwrap();

        assert!(outcome.state_changed);
        let texts: Vec<_> = h
            .state("c1")
            .await
            .history()
            .iter()
            .map(|e| e.content.clone())
            .collect();
        assert!(texts.contains(&"nota".to_string()));
        assert!(texts.contains(&"hola de nuevo".to_string()));
    }
}
