//! Message transport adapters.
//!
//! - `WebhookTransport` - POSTs to the chat gateway
//! - `LoggingTransport` - logs instead of sending
//! - `RecordingTransport` - captures sends for assertions

mod logging;
mod recording;
mod webhook;

pub use logging::LoggingTransport;
pub use recording::{RecordingTransport, SentMessage};
pub use webhook::WebhookTransport;
