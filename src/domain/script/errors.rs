//! Script configuration errors.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// A defect in an authored or loaded script version.
///
/// Loading is lenient (issues are logged and the engine degrades by staying on
/// the current step); authoring through the admin boundary is strict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptConfigError {
    #[error("script '{version}': step '{step}' points to missing step '{target}'")]
    DanglingNext {
        version: String,
        step: String,
        target: String,
    },

    #[error("script '{version}': step '{step}' branches to missing step '{target}'")]
    DanglingBranch {
        version: String,
        step: String,
        target: String,
    },

    #[error("script '{version}': entry step '{step}' does not exist")]
    MissingEntryStep { version: String, step: String },

    #[error("script '{version}': FAQ entry {index} triggers missing step '{step}'")]
    DanglingFaqTrigger {
        version: String,
        index: usize,
        step: String,
    },

    #[error("script '{version}': session is on unknown step '{step}'")]
    UnknownStep { version: String, step: String },

    #[error("script '{version}' has no steps")]
    EmptyFlow { version: String },

    #[error("script version '{version}' not found")]
    VersionNotFound { version: String },

    #[error("no script version is available")]
    NoVersionsAvailable,

    #[error("rotation requires two distinct versions, got '{first}' twice")]
    RotationNeedsDistinctVersions { first: String },

    #[error("invalid step key '{key}': {reason}")]
    InvalidStepKey { key: String, reason: String },

    #[error("invalid version name '{name}': {reason}")]
    InvalidVersionName { name: String, reason: String },
}

impl From<ScriptConfigError> for DomainError {
    fn from(err: ScriptConfigError) -> Self {
        let code = match err {
            ScriptConfigError::VersionNotFound { .. } => ErrorCode::ScriptVersionNotFound,
            _ => ErrorCode::ScriptConfigInvalid,
        };
        DomainError::new(code, err.to_string())
    }
}
