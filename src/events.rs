use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a gate decision worth surfacing to a UI poller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GateEvent {
    /// A punch was committed.
    #[serde(rename_all = "camelCase")]
    Committed {
        name: String,
        timestamp: DateTime<Utc>,
    },
    /// An identity was seen during its cooldown window.
    #[serde(rename_all = "camelCase")]
    Cooldown { name: String, remaining_seconds: u64 },
}

/// Single-slot mailbox for the most recent gate event. Writing overwrites any
/// unread value and reading clears it. This is lossy on purpose: a poller
/// that falls behind sees only the latest event, never a backlog.
#[derive(Debug, Default)]
pub struct EventSlot {
    slot: Option<GateEvent>,
}

impl EventSlot {
    pub fn publish(&mut self, event: GateEvent) {
        self.slot = Some(event);
    }

    pub fn take(&mut self) -> Option<GateEvent> {
        self.slot.take()
    }
}
