//! The set of loaded script versions and the allocation mode for new sessions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ScriptConfigError, ScriptVersion, ScriptVersionName};

/// How new sessions pick their script version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Every new session gets this version.
    Active(ScriptVersionName),
    /// New sessions are split 50/50 between two versions.
    Rotation(ScriptVersionName, ScriptVersionName),
}

impl AllocationMode {
    /// Versions new sessions can be assigned.
    pub fn candidates(&self) -> Vec<&ScriptVersionName> {
        match self {
            AllocationMode::Active(v) => vec![v],
            AllocationMode::Rotation(a, b) => vec![a, b],
        }
    }

    /// Rejects rotations between a version and itself.
    pub fn validate(&self) -> Result<(), ScriptConfigError> {
        match self {
            AllocationMode::Rotation(a, b) if a == b => {
                Err(ScriptConfigError::RotationNeedsDistinctVersions {
                    first: a.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Immutable snapshot of every script version. Edits produce a new snapshot
/// that replaces the old one wholesale.
#[derive(Debug, Clone)]
pub struct ScriptRegistry {
    versions: BTreeMap<ScriptVersionName, Arc<ScriptVersion>>,
    mode: AllocationMode,
}

impl ScriptRegistry {
    pub fn new(
        versions: impl IntoIterator<Item = ScriptVersion>,
        mode: AllocationMode,
    ) -> Result<Self, ScriptConfigError> {
        let versions: BTreeMap<_, _> = versions
            .into_iter()
            .map(|v| (v.name().clone(), Arc::new(v)))
            .collect();
        let registry = Self { versions, mode };
        registry.check_mode(&registry.mode)?;
        Ok(registry)
    }

    fn check_mode(&self, mode: &AllocationMode) -> Result<(), ScriptConfigError> {
        mode.validate()?;
        for name in mode.candidates() {
            if !self.versions.contains_key(name) {
                return Err(ScriptConfigError::VersionNotFound {
                    version: name.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn mode(&self) -> &AllocationMode {
        &self.mode
    }

    pub fn version(&self, name: &ScriptVersionName) -> Option<Arc<ScriptVersion>> {
        self.versions.get(name).cloned()
    }

    pub fn versions(&self) -> impl Iterator<Item = &Arc<ScriptVersion>> {
        self.versions.values()
    }

    /// Names of every version, sorted.
    pub fn names(&self) -> Vec<ScriptVersionName> {
        self.versions.keys().cloned().collect()
    }

    /// The version new sessions fall back to when theirs has disappeared.
    pub fn fallback(&self) -> Option<Arc<ScriptVersion>> {
        self.mode
            .candidates()
            .first()
            .and_then(|name| self.version(name))
    }

    /// Snapshot with `version` added or replaced.
    pub fn with_version(&self, version: ScriptVersion) -> Self {
        let mut next = self.clone();
        next.versions
            .insert(version.name().clone(), Arc::new(version));
        next
    }

    /// Snapshot with a different allocation mode.
    pub fn with_mode(&self, mode: AllocationMode) -> Result<Self, ScriptConfigError> {
        self.check_mode(&mode)?;
        let mut next = self.clone();
        next.mode = mode;
        Ok(next)
    }
}
