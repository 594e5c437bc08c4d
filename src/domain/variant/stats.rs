//! Per-version conversion counters and sticky session assignments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::{ChatId, Timestamp};
use crate::domain::script::{AllocationMode, ScriptVersionName};

/// Started/completed counters of one script version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantStats {
    pub started: u64,
    pub completed: u64,
}

impl VariantStats {
    /// completed / started, 0 when nothing started.
    pub fn conversion_rate(&self) -> f64 {
        if self.started == 0 {
            0.0
        } else {
            self.completed as f64 / self.started as f64
        }
    }
}

/// The version a chat was given, kept across resets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub version: ScriptVersionName,
    /// False after a reset, until the chat's next session starts.
    pub session_open: bool,
    pub assigned_at: Timestamp,
}

/// Result of [`StatsDocument::assign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignOutcome {
    pub version: ScriptVersionName,
    /// True when this call counted a started session.
    pub started: bool,
}

/// Everything the allocator persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsDocument {
    #[serde(default)]
    pub versions: BTreeMap<ScriptVersionName, VariantStats>,
    #[serde(default)]
    pub assignments: BTreeMap<ChatId, Assignment>,
}

impl StatsDocument {
    /// Assigns a version to `chat_id`, or returns the one it already has.
    ///
    /// `pick_second` chooses between the two versions of a rotation and is
    /// ignored in active mode. `started` is counted once per session, on the
    /// version actually returned. A stored assignment whose version is not in
    /// `available` is dropped and the chat is assigned afresh from `mode`.
    pub fn assign(
        &mut self,
        chat_id: &ChatId,
        mode: &AllocationMode,
        available: &[ScriptVersionName],
        pick_second: bool,
        now: Timestamp,
    ) -> AssignOutcome {
        if let Some(assignment) = self.assignments.get_mut(chat_id) {
            if available.contains(&assignment.version) {
                if assignment.session_open {
                    return AssignOutcome {
                        version: assignment.version.clone(),
                        started: false,
                    };
                }
                assignment.session_open = true;
                assignment.assigned_at = now;
                let version = assignment.version.clone();
                self.versions.entry(version.clone()).or_default().started += 1;
                return AssignOutcome {
                    version,
                    started: true,
                };
            }
        }

        let version = match mode {
            AllocationMode::Active(version) => version.clone(),
            AllocationMode::Rotation(first, second) => {
                if pick_second {
                    second.clone()
                } else {
                    first.clone()
                }
            }
        };
        self.assignments.insert(
            chat_id.clone(),
            Assignment {
                version: version.clone(),
                session_open: true,
                assigned_at: now,
            },
        );
        self.versions.entry(version.clone()).or_default().started += 1;
        AssignOutcome {
            version,
            started: true,
        }
    }

    /// Closes the chat's current session; its next session keeps the version.
    pub fn restart(&mut self, chat_id: &ChatId) -> bool {
        match self.assignments.get_mut(chat_id) {
            Some(assignment) => {
                assignment.session_open = false;
                true
            }
            None => false,
        }
    }

    /// Drops the chat's assignment; its next session is allocated afresh.
    pub fn forget(&mut self, chat_id: &ChatId) -> bool {
        self.assignments.remove(chat_id).is_some()
    }

    /// Drops closed assignments last opened before `cutoff`. Returns how many.
    pub fn prune_closed(&mut self, cutoff: &Timestamp) -> usize {
        let before = self.assignments.len();
        self.assignments
            .retain(|_, a| a.session_open || !a.assigned_at.is_before(cutoff));
        before - self.assignments.len()
    }

    pub fn record_completion(&mut self, version: &ScriptVersionName) {
        self.versions.entry(version.clone()).or_default().completed += 1;
    }

    pub fn stats(&self, version: &ScriptVersionName) -> VariantStats {
        self.versions.get(version).copied().unwrap_or_default()
    }

    pub fn assignment(&self, chat_id: &ChatId) -> Option<&Assignment> {
        self.assignments.get(chat_id)
    }
}
