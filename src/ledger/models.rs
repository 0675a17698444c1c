use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One committed punch. Records are immutable once written; the ledger
/// only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn new(name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            timestamp,
        }
    }
}
