//! Scriptable reply generator for tests.
//!
//! # Example
//!
//! ```ignore
//! let generator = MockReplyGenerator::new()
//!     .with_response("¡Claro! ¿Cuántos kilos querés bajar?")
//!     .with_error(ReplyError::Unavailable("down".into()))
//!     .with_delay(Duration::from_millis(50));
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{ReplyError, ReplyGenerator, ReplyRequest};

pub const MOCK_DEFAULT_REPLY: &str = "Respuesta de prueba";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Replies are consumed in queue order; an empty queue answers with the
/// default reply. Every request is recorded.
#[derive(Debug, Clone, Default)]
pub struct MockReplyGenerator {
    replies: Arc<Mutex<VecDeque<Result<String, ReplyError>>>>,
    delay: Duration,
    calls: Arc<Mutex<Vec<ReplyRequest>>>,
}

impl MockReplyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.push(Ok(content.into()));
        self
    }

    pub fn with_error(self, error: ReplyError) -> Self {
        self.push(Err(error));
        self
    }

    /// Latency applied to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queues a reply on a shared handle.
    pub fn push(&self, reply: Result<String, ReplyError>) {
        lock(&self.replies).push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls(&self) -> Vec<ReplyRequest> {
        lock(&self.calls).clone()
    }

    pub fn last_call(&self) -> Option<ReplyRequest> {
        lock(&self.calls).last().cloned()
    }
}

#[async_trait]
impl ReplyGenerator for MockReplyGenerator {
    async fn generate_reply(&self, request: ReplyRequest) -> Result<String, ReplyError> {
        lock(&self.calls).push(request);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        let next = lock(&self.replies).pop_front();
        next.unwrap_or_else(|| Ok(MOCK_DEFAULT_REPLY.to_string()))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Generator used when no AI provider is configured: every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledReplyGenerator;

#[async_trait]
impl ReplyGenerator for DisabledReplyGenerator {
    async fn generate_reply(&self, _request: ReplyRequest) -> Result<String, ReplyError> {
        Err(ReplyError::Disabled)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ChatId;

    fn request() -> ReplyRequest {
        ReplyRequest::new(ChatId::new("c").unwrap(), "seguí")
    }

    #[tokio::test]
    async fn replies_are_consumed_in_order_then_default() {
        let generator = MockReplyGenerator::new()
            .with_response("uno")
            .with_error(ReplyError::Network("reset".into()));

        assert_eq!(generator.generate_reply(request()).await.unwrap(), "uno");
        assert!(generator.generate_reply(request()).await.is_err());
        assert_eq!(
            generator.generate_reply(request()).await.unwrap(),
            MOCK_DEFAULT_REPLY
        );
        assert_eq!(generator.call_count(), 3);
        assert_eq!(generator.last_call().unwrap().instruction, "seguí");
    }

    #[tokio::test]
    async fn disabled_generator_always_fails() {
        assert_eq!(
            DisabledReplyGenerator.generate_reply(request()).await,
            Err(ReplyError::Disabled)
        );
    }
}
