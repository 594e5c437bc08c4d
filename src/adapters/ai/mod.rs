//! Reply generator adapters.
//!
//! - `OpenAIReplyGenerator` - chat completions API
//! - `MockReplyGenerator` - scripted replies, delays and errors for tests
//! - `DisabledReplyGenerator` - always fails, so the handoff fallback fires

mod mock_generator;
mod openai_generator;

pub use mock_generator::{DisabledReplyGenerator, MockReplyGenerator, MOCK_DEFAULT_REPLY};
pub use openai_generator::{OpenAIConfig, OpenAIReplyGenerator, DEFAULT_BASE_URL, DEFAULT_MODEL};
