//! Variant (A/B) allocation domain.
//!
//! # Events
//!
//! - `ScriptActivated` - allocation mode for new sessions changed

mod events;
mod stats;

pub use events::ScriptActivated;
pub use stats::{AssignOutcome, Assignment, StatsDocument, VariantStats};
