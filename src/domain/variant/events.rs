//! Variant allocation events.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{EventId, Timestamp};
use crate::domain::script::AllocationMode;
use crate::domain_event;

/// Published when the allocation mode for new sessions changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptActivated {
    pub event_id: EventId,
    /// Always `"registry"`; there is a single allocation mode.
    pub registry: String,
    pub mode: AllocationMode,
    pub activated_at: Timestamp,
}

impl ScriptActivated {
    pub fn new(mode: AllocationMode) -> Self {
        Self {
            event_id: EventId::new(),
            registry: "registry".to_string(),
            mode,
            activated_at: Timestamp::now(),
        }
    }
}

domain_event!(
    ScriptActivated,
    event_type = "variant.script_activated.v1",
    aggregate_id = registry,
    aggregate_type = "ScriptRegistry",
    occurred_at = activated_at,
    event_id = event_id
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SerializableDomainEvent;
    use crate::domain::script::ScriptVersionName;

    #[test]
    fn payload_carries_mode() {
        let mode = AllocationMode::Active(ScriptVersionName::new("v2").unwrap());
        let event = ScriptActivated::new(mode);
        let envelope = event.to_envelope().unwrap();
        assert_eq!(envelope.aggregate_type, "ScriptRegistry");
        assert_eq!(envelope.payload["mode"]["active"], "v2");
    }
}
