//! Request and response bodies for script and price administration.

use serde::Serialize;

use crate::domain::script::{AllocationMode, ScriptVersion};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSummaryResponse {
    pub name: String,
    pub entry_step: String,
    pub steps: usize,
    pub faq_entries: usize,
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

impl From<&ScriptVersion> for ScriptSummaryResponse {
    fn from(version: &ScriptVersion) -> Self {
        Self {
            name: version.name().to_string(),
            entry_step: version.entry_step().to_string(),
            steps: version.steps().count(),
            faq_entries: version.faq().len(),
            valid: version.is_valid(),
            issues: version.issues().iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptsResponse {
    pub mode: AllocationMode,
    pub versions: Vec<ScriptSummaryResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModeResponse {
    pub mode: AllocationMode,
}
