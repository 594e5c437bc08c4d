//! Script domain module.
//!
//! A script version is a validated graph of funnel steps plus an ordered FAQ
//! list. The registry holds every loaded version and the allocation mode that
//! decides which version new sessions get.
//!
//! # Events
//!
//! - `ScriptActivated` - allocation mode changed (see `domain::variant`)

mod defaults;
mod errors;
mod faq;
mod registry;
mod step;
mod version;

pub use defaults::{default_document, default_version, DEFAULT_VERSION};
pub use errors::ScriptConfigError;
pub use faq::{first_match, FaqEntry};
pub use registry::{AllocationMode, ScriptRegistry};
pub use step::{FlowStep, Phase, StepKey, StepRef, COMPLETED};
pub use version::{ScriptDocument, ScriptVersion, ScriptVersionName};
