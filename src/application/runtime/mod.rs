//! Long-running tasks around the engine.
//!
//! - [`ChatDispatcher`] - one ordered worker per chat
//! - [`SessionFlusher`] - writes staged sessions to the archive
//! - [`UpkeepScheduler`] - queues due housekeeping on the chat workers

mod dispatcher;
mod flusher;
mod scheduler;

pub use dispatcher::{ChatDispatcher, DispatchError};
pub use flusher::{SessionFlusher, SessionFlusherConfig};
pub use scheduler::{SweepReport, UpkeepScheduler};
