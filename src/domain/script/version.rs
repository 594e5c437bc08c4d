//! Script versions: validated step graphs plus FAQ lists.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::{FaqEntry, FlowStep, ScriptConfigError, StepKey, StepRef};

/// Name of a script version (`v1`, `promo-summer`, ...). Also used as a file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScriptVersionName(String);

impl ScriptVersionName {
    pub const MAX_LEN: usize = 64;

    pub fn new(raw: impl Into<String>) -> Result<Self, ScriptConfigError> {
        let raw = raw.into();
        let reason = if raw.is_empty() {
            Some("empty")
        } else if raw.len() > Self::MAX_LEN {
            Some("too long")
        } else if raw.starts_with('_') {
            Some("names starting with '_' are reserved")
        } else if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            Some("only letters, digits, '_' and '-' are allowed")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ScriptConfigError::InvalidVersionName {
                name: raw,
                reason: reason.to_string(),
            }),
            None => Ok(Self(raw)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptVersionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ScriptVersionName {
    type Err = ScriptConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ScriptVersionName {
    type Error = ScriptConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ScriptVersionName> for String {
    fn from(name: ScriptVersionName) -> Self {
        name.0
    }
}

/// Persisted shape of a script version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDocument {
    #[serde(default = "default_entry_step")]
    pub entry_step: StepKey,

    #[serde(default = "default_completion_message")]
    pub completion_message: String,

    pub flow: BTreeMap<StepKey, FlowStep>,

    #[serde(default)]
    pub faq: Vec<FaqEntry>,
}

fn default_entry_step() -> StepKey {
    StepKey::from_trusted("greeting")
}

fn default_completion_message() -> String {
    "¡Listo! Tu pedido quedó registrado. ¡Gracias por tu compra! 🌱".to_string()
}

impl ScriptDocument {
    pub fn new(entry_step: StepKey, flow: BTreeMap<StepKey, FlowStep>) -> Self {
        Self {
            entry_step,
            completion_message: default_completion_message(),
            flow,
            faq: Vec::new(),
        }
    }

    /// Every graph defect of this document, in a stable order.
    pub fn check(&self, version: &ScriptVersionName) -> Vec<ScriptConfigError> {
        let mut issues = Vec::new();
        let name = version.to_string();

        if self.flow.is_empty() {
            issues.push(ScriptConfigError::EmptyFlow {
                version: name.clone(),
            });
        } else if !self.flow.contains_key(&self.entry_step) {
            issues.push(ScriptConfigError::MissingEntryStep {
                version: name.clone(),
                step: self.entry_step.to_string(),
            });
        }

        for (key, step) in &self.flow {
            if let Some(StepRef::Step(target)) = &step.next {
                if !self.flow.contains_key(target) {
                    issues.push(ScriptConfigError::DanglingNext {
                        version: name.clone(),
                        step: key.to_string(),
                        target: target.to_string(),
                    });
                }
            }
            for target in &step.branches {
                if !self.flow.contains_key(target) {
                    issues.push(ScriptConfigError::DanglingBranch {
                        version: name.clone(),
                        step: key.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }

        for (index, entry) in self.faq.iter().enumerate() {
            if let Some(step) = &entry.trigger_step {
                if !self.flow.contains_key(step) {
                    issues.push(ScriptConfigError::DanglingFaqTrigger {
                        version: name.clone(),
                        index,
                        step: step.to_string(),
                    });
                }
            }
        }

        issues
    }
}

/// A named, loaded script version. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptVersion {
    name: ScriptVersionName,
    document: ScriptDocument,
    issues: Vec<ScriptConfigError>,
}

impl ScriptVersion {
    /// Strict construction used by the authoring boundary: any defect rejects
    /// the whole version.
    pub fn validated(
        name: ScriptVersionName,
        document: ScriptDocument,
    ) -> Result<Self, ScriptConfigError> {
        match document.check(&name).into_iter().next() {
            Some(issue) => Err(issue),
            None => Ok(Self {
                name,
                document,
                issues: Vec::new(),
            }),
        }
    }

    /// Lenient construction used when loading persisted versions: defects are
    /// kept alongside the version so they can be reported.
    pub fn load(name: ScriptVersionName, document: ScriptDocument) -> Self {
        let issues = document.check(&name);
        Self {
            name,
            document,
            issues,
        }
    }

    pub fn name(&self) -> &ScriptVersionName {
        &self.name
    }

    pub fn entry_step(&self) -> &StepKey {
        &self.document.entry_step
    }

    pub fn completion_message(&self) -> &str {
        &self.document.completion_message
    }

    pub fn step(&self, key: &StepKey) -> Option<&FlowStep> {
        self.document.flow.get(key)
    }

    pub fn steps(&self) -> impl Iterator<Item = (&StepKey, &FlowStep)> {
        self.document.flow.iter()
    }

    /// Whether a transition target exists in this version.
    pub fn resolves(&self, target: &StepRef) -> bool {
        match target {
            StepRef::Completed => true,
            StepRef::Step(key) => self.document.flow.contains_key(key),
        }
    }

    pub fn faq(&self) -> &[FaqEntry] {
        &self.document.faq
    }

    pub fn issues(&self) -> &[ScriptConfigError] {
        &self.issues
    }

    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn document(&self) -> &ScriptDocument {
        &self.document
    }
}
