//! Per-chat workers.
//!
//! Every chat gets one worker task fed by an unbounded channel. Inbound
//! messages, admin commands, pause toggles, resets and scheduled upkeep for
//! a chat all go through that channel, so they run one at a time and in
//! arrival order.
//! Different chats run in parallel.
//!
//! Sends into a worker's channel happen under the registry lock. A worker
//! that has been idle checks its channel under the same lock before it
//! deregisters, so no job is ever left in a dead queue.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::application::{DialogueEngine, EngineError, GenerationToken, TurnOutcome};
use crate::domain::dialogue::Upkeep;
use crate::domain::escalation::AdminCommand;
use crate::domain::foundation::{ChatId, DomainError, ErrorCode, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("worker for chat {0} stopped before answering")]
    WorkerStopped(ChatId),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<DispatchError> for DomainError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::WorkerStopped(_) => {
                DomainError::new(ErrorCode::InternalError, err.to_string())
            }
            DispatchError::Engine(e) => e.into(),
        }
    }
}

type Reply<T> = Option<oneshot::Sender<Result<T, EngineError>>>;

enum Job {
    Inbound {
        text: String,
        attachments: Vec<String>,
        token: GenerationToken,
        reply: Reply<TurnOutcome>,
    },
    Admin {
        command: AdminCommand,
        token: GenerationToken,
        reply: Reply<TurnOutcome>,
    },
    Pause {
        paused: bool,
        reply: Reply<bool>,
    },
    Reset {
        generation: u64,
        reply: Reply<bool>,
    },
    Upkeep {
        task: Upkeep,
        now: Timestamp,
        token: GenerationToken,
    },
}

struct WorkerHandle {
    id: u64,
    tx: mpsc::UnboundedSender<Job>,
    /// Bumped on every reset; survives worker restarts.
    generation: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

type Workers = HashMap<ChatId, WorkerHandle>;
type Registry = Arc<Mutex<Workers>>;

fn lock(registry: &Mutex<Workers>) -> MutexGuard<'_, Workers> {
    registry.lock().unwrap_or_else(|p| p.into_inner())
}

/// Routes chat work to per-chat workers.
pub struct ChatDispatcher {
    engine: Arc<DialogueEngine>,
    workers: Registry,
    idle_timeout: Duration,
    next_id: AtomicU64,
}

impl ChatDispatcher {
    /// Workers exit after `idle_timeout` without work; the next job for the
    /// chat starts a new one.
    pub fn new(engine: Arc<DialogueEngine>, idle_timeout: Duration) -> Self {
        Self {
            engine,
            workers: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn engine(&self) -> &Arc<DialogueEngine> {
        &self.engine
    }

    /// Queues an inbound message and waits for its turn to finish.
    pub async fn dispatch_inbound(
        &self,
        chat_id: &ChatId,
        text: impl Into<String>,
        attachments: Vec<String>,
    ) -> Result<TurnOutcome, DispatchError> {
        let (reply, rx) = oneshot::channel();
        let text = text.into();
        self.enqueue(chat_id, |generation| Job::Inbound {
            text,
            attachments,
            token: GenerationToken::new(generation.clone()),
            reply: Some(reply),
        })?;
        Self::wait(chat_id, rx).await
    }

    /// Queues an inbound message without waiting. Failures are logged.
    pub fn submit_inbound(
        &self,
        chat_id: &ChatId,
        text: impl Into<String>,
        attachments: Vec<String>,
    ) -> Result<(), DispatchError> {
        let text = text.into();
        self.enqueue(chat_id, |generation| Job::Inbound {
            text,
            attachments,
            token: GenerationToken::new(generation.clone()),
            reply: None,
        })
    }

    /// Queues an admin command and waits for it to run.
    pub async fn admin_command(
        &self,
        chat_id: &ChatId,
        command: AdminCommand,
    ) -> Result<TurnOutcome, DispatchError> {
        self.submit_admin(chat_id, command)?.await
    }

    /// Queues an admin command before returning. The command keeps its place
    /// in the chat's queue whether or not the returned future is awaited.
    pub fn submit_admin(
        &self,
        chat_id: &ChatId,
        command: AdminCommand,
    ) -> Result<impl Future<Output = Result<TurnOutcome, DispatchError>>, DispatchError> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(chat_id, |generation| Job::Admin {
            command,
            token: GenerationToken::new(generation.clone()),
            reply: Some(reply),
        })?;
        let chat_id = chat_id.clone();
        Ok(async move { Self::wait(&chat_id, rx).await })
    }

    pub async fn set_paused(&self, chat_id: &ChatId, paused: bool) -> Result<bool, DispatchError> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(chat_id, |_| Job::Pause {
            paused,
            reply: Some(reply),
        })?;
        Self::wait(chat_id, rx).await
    }

    /// Bumps the chat's generation at once, so work already queued or in
    /// flight is dropped, then queues the reset itself.
    pub async fn reset(&self, chat_id: &ChatId) -> Result<bool, DispatchError> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(chat_id, |generation| Job::Reset {
            generation: generation.fetch_add(1, Ordering::SeqCst) + 1,
            reply: Some(reply),
        })?;
        Self::wait(chat_id, rx).await
    }

    /// Queues a housekeeping task behind whatever the chat already has
    /// queued. Failures are logged.
    pub fn submit_upkeep(
        &self,
        chat_id: &ChatId,
        task: Upkeep,
        now: Timestamp,
    ) -> Result<(), DispatchError> {
        self.enqueue(chat_id, |generation| Job::Upkeep {
            task,
            now,
            token: GenerationToken::new(generation.clone()),
        })
    }

    /// Number of live workers.
    pub fn active_workers(&self) -> usize {
        lock(&self.workers).len()
    }

    /// Stops accepting work and waits for every worker to drain its queue.
    pub async fn close(&self) {
        let handles: Vec<WorkerHandle> = lock(&self.workers).drain().map(|(_, h)| h).collect();
        tracing::info!(workers = handles.len(), "closing chat workers");
        for handle in handles {
            let WorkerHandle { tx, task, .. } = handle;
            drop(tx);
            if let Err(error) = task.await {
                tracing::error!(%error, "chat worker ended abnormally");
            }
        }
    }

    fn enqueue(
        &self,
        chat_id: &ChatId,
        build: impl FnOnce(&Arc<AtomicU64>) -> Job,
    ) -> Result<(), DispatchError> {
        let mut workers = lock(&self.workers);
        let handle = workers
            .entry(chat_id.clone())
            .or_insert_with(|| self.spawn_worker(chat_id, Arc::new(AtomicU64::new(0))));
        if handle.tx.is_closed() {
            tracing::warn!(chat_id = %chat_id, worker = handle.id, "chat worker died, restarting");
            *handle = self.spawn_worker(chat_id, handle.generation.clone());
        }
        let job = build(&handle.generation);
        handle
            .tx
            .send(job)
            .map_err(|_| DispatchError::WorkerStopped(chat_id.clone()))
    }

    fn spawn_worker(&self, chat_id: &ChatId, generation: Arc<AtomicU64>) -> WorkerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            id,
            chat_id: chat_id.clone(),
            engine: self.engine.clone(),
            registry: self.workers.clone(),
            idle_timeout: self.idle_timeout,
        };
        tracing::debug!(chat_id = %chat_id, worker = id, "chat worker started");
        let task = tokio::spawn(worker.run(rx));
        WorkerHandle {
            id,
            tx,
            generation,
            task,
        }
    }

    async fn wait<T>(
        chat_id: &ChatId,
        rx: oneshot::Receiver<Result<T, EngineError>>,
    ) -> Result<T, DispatchError> {
        match rx.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DispatchError::WorkerStopped(chat_id.clone())),
        }
    }
}

impl std::fmt::Debug for ChatDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatDispatcher")
            .field("active_workers", &self.active_workers())
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

struct Worker {
    id: u64,
    chat_id: ChatId,
    engine: Arc<DialogueEngine>,
    registry: Registry,
    idle_timeout: Duration,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Job>) {
        loop {
            let job = match tokio::time::timeout(self.idle_timeout, rx.recv()).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(_) => match self.retire_if_idle(&mut rx) {
                    Some(job) => job,
                    None => break,
                },
            };
            self.run_job(job).await;
        }
        tracing::debug!(chat_id = %self.chat_id, worker = self.id, "chat worker stopped");
    }

    /// Deregisters the worker unless a job slipped in; returns that job.
    fn retire_if_idle(&self, rx: &mut mpsc::UnboundedReceiver<Job>) -> Option<Job> {
        let mut workers = lock(&self.registry);
        if let Ok(job) = rx.try_recv() {
            return Some(job);
        }
        if workers.get(&self.chat_id).map(|h| h.id) == Some(self.id) {
            workers.remove(&self.chat_id);
        }
        None
    }

    async fn run_job(&self, job: Job) {
        let chat_id = &self.chat_id;
        match job {
            Job::Inbound {
                text,
                attachments,
                token,
                reply,
            } => {
                let result = self
                    .engine
                    .handle_inbound(chat_id, &text, attachments, &token)
                    .await;
                Self::answer(chat_id, "inbound", reply, result);
            }
            Job::Admin {
                command,
                token,
                reply,
            } => {
                let result = self
                    .engine
                    .apply_admin_command(chat_id, command, &token)
                    .await;
                Self::answer(chat_id, "admin command", reply, result);
            }
            Job::Pause { paused, reply } => {
                let result = self.engine.set_paused(chat_id, paused).await;
                Self::answer(chat_id, "pause", reply, result);
            }
            Job::Reset { generation, reply } => {
                let result = self.engine.reset(chat_id, generation).await;
                Self::answer(chat_id, "reset", reply, result);
            }
            Job::Upkeep { task, now, token } => {
                let result = self.engine.run_upkeep(chat_id, &task, &now, &token).await;
                Self::answer(chat_id, "upkeep", None, result);
            }
        }
    }

    fn answer<T>(
        chat_id: &ChatId,
        job: &'static str,
        reply: Reply<T>,
        result: Result<T, EngineError>,
    ) {
        match reply {
            Some(reply) => {
                // The caller may have gone away; the work is done regardless
                let _ = reply.send(result);
            }
            None => {
                if let Err(error) = result {
                    tracing::error!(chat_id = %chat_id, job, %error, "chat job failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockReplyGenerator;
    use crate::application::engine::tests::{chat, Harness};
    use crate::domain::conversation::Role;
    use crate::ports::SessionStoreError;

    fn dispatcher(h: &Harness, idle: Duration) -> ChatDispatcher {
        ChatDispatcher::new(h.engine.clone(), idle)
    }

    #[tokio::test]
    async fn messages_of_one_chat_are_handled_in_arrival_order() {
        let generator = MockReplyGenerator::new().with_delay(Duration::from_millis(30));
        let h = Harness::with_generator(generator).await;
        let d = Arc::new(dispatcher(&h, Duration::from_secs(60)));

        d.dispatch_inbound(&chat("c1"), "hola", Vec::new()).await.unwrap();
        for i in 0..5 {
            d.submit_inbound(&chat("c1"), format!("mensaje {}", i), Vec::new())
                .unwrap();
        }
        d.close().await;

        let customer: Vec<String> = h
            .state("c1")
            .await
            .history()
            .iter()
            .filter(|e| e.role == Role::Customer)
            .map(|e| e.content.clone())
            .collect();
        assert_eq!(
            customer,
            vec!["hola", "mensaje 0", "mensaje 1", "mensaje 2", "mensaje 3", "mensaje 4"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn submitted_admin_commands_run_in_submission_order() {
        let generator = MockReplyGenerator::new().with_delay(Duration::from_millis(20));
        let h = Harness::with_generator(generator).await;
        let d = dispatcher(&h, Duration::from_secs(60));
        for _ in 0..20 {
            h.inbound("c1", "quiero hablar con una persona").await;
            let first = d
                .submit_admin(&chat("c1"), AdminCommand::parse("Ofrecele un descuento").unwrap())
                .unwrap();
            let second = d.submit_admin(&chat("c1"), AdminCommand::Takeover).unwrap();
            drop(second);
            first.await.unwrap();
            d.set_paused(&chat("c1"), false).await.unwrap();

            let resolved = h.engine.escalation().resolved_alerts();
            assert_eq!(resolved[0].resolution(), Some("instruccion"));
        }
    }

    #[tokio::test]
    async fn slow_chat_does_not_block_others() {
        let generator = MockReplyGenerator::new().with_delay(Duration::from_millis(200));
        let h = Harness::with_generator(generator).await;
        let d = Arc::new(dispatcher(&h, Duration::from_secs(60)));
        d.dispatch_inbound(&chat("slow"), "hola", Vec::new()).await.unwrap();
        d.dispatch_inbound(&chat("slow"), "si", Vec::new()).await.unwrap();

        // Off-script at waiting_weight: goes to the slow generator
        d.submit_inbound(&chat("slow"), "mi gato se llama Michi", Vec::new())
            .unwrap();
        let started = std::time::Instant::now();
        d.dispatch_inbound(&chat("fast"), "hola", Vec::new()).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(150));
        assert_eq!(d.active_workers(), 2);
    }

    #[tokio::test]
    async fn reset_drops_in_flight_generator_reply() {
        let generator = MockReplyGenerator::new()
            .with_delay(Duration::from_millis(100))
            .with_response("respuesta vieja");
        let h = Harness::with_generator(generator).await;
        let d = Arc::new(dispatcher(&h, Duration::from_secs(60)));
        d.dispatch_inbound(&chat("c1"), "hola", Vec::new()).await.unwrap();
        d.dispatch_inbound(&chat("c1"), "si", Vec::new()).await.unwrap();

        let pending = {
            let d = d.clone();
            tokio::spawn(async move {
                d.dispatch_inbound(&chat("c1"), "mi gato se llama Michi", Vec::new())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(d.reset(&chat("c1")).await.unwrap());

        let outcome = pending.await.unwrap().unwrap();
        assert!(outcome.discarded);
        assert!(h.engine.sessions().get(&chat("c1")).await.unwrap().is_none());
        assert!(h.transport.texts_to(&chat("c1")).iter().all(|t| t != "respuesta vieja"));
        assert!(h.bus.has_event("conversation.session_reset.v1"));
    }

    #[tokio::test]
    async fn idle_worker_retires_and_a_new_one_takes_over() {
        let h = Harness::new().await;
        let d = dispatcher(&h, Duration::from_millis(20));
        d.dispatch_inbound(&chat("c1"), "hola", Vec::new()).await.unwrap();
        assert_eq!(d.active_workers(), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(d.active_workers(), 0);

        let outcome = d.dispatch_inbound(&chat("c1"), "si", Vec::new()).await.unwrap();
        assert_eq!(outcome.step, Some("waiting_weight".parse().unwrap()));
    }

    #[tokio::test]
    async fn engine_errors_reach_the_caller() {
        let h = Harness::new().await;
        let d = dispatcher(&h, Duration::from_secs(60));
        let result = d.set_paused(&chat("ghost"), true).await;
        assert!(matches!(
            result,
            Err(DispatchError::Engine(EngineError::Session(
                SessionStoreError::NotFound(_)
            )))
        ));
    }
}
