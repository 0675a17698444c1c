use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{StorageConfig, StorageKind};

pub mod flat_log;
mod helpers;
mod migrations;
pub mod models;
pub mod sqlite;

pub use flat_log::FlatLogLedger;
pub use models::AttendanceRecord;
pub use sqlite::SqliteLedger;

/// Persistence seam for the attendance ledger. Backends are interchangeable;
/// both queries return records ascending by parsed instant regardless of the
/// order rows were written in.
#[async_trait]
pub trait AttendanceLedger: Send + Sync {
    /// Persists one record. Must be durable before returning; a failure must
    /// leave no trace, so callers can retry.
    async fn append(&self, record: &AttendanceRecord) -> Result<()>;

    /// All records, ascending by instant. A `limit` keeps the most recent
    /// records and is applied after sorting.
    async fn query_all(&self, limit: Option<usize>) -> Result<Vec<AttendanceRecord>>;

    /// Records for one identity, ascending by instant, same `limit` rules.
    async fn query_by_name(&self, name: &str, limit: Option<usize>)
        -> Result<Vec<AttendanceRecord>>;

    /// Total number of stored records, including rows a query would skip.
    async fn count(&self) -> Result<usize>;
}

/// Storage mode actually in effect, which may differ from the configured one
/// after a degrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageMode {
    Local,
    Database,
}

/// Keeps the most recent `limit` records from an ascending-sorted list,
/// preserving ascending order.
pub(crate) fn apply_limit(
    mut records: Vec<AttendanceRecord>,
    limit: Option<usize>,
) -> Vec<AttendanceRecord> {
    match limit {
        Some(n) if records.len() > n => records.split_off(records.len() - n),
        _ => records,
    }
}

/// Opens the configured backend. When the database cannot be opened the
/// system degrades to the flat-log backend and keeps running; the returned
/// mode tells the caller which backend is actually live.
pub fn open_ledger(storage: &StorageConfig) -> Result<(Arc<dyn AttendanceLedger>, StorageMode)> {
    match storage.kind {
        StorageKind::Database => match SqliteLedger::new(storage.database_path.clone()) {
            Ok(ledger) => Ok((Arc::new(ledger), StorageMode::Database)),
            Err(err) => {
                warn!("failed to open attendance database, falling back to local storage: {err:#}");
                let ledger = FlatLogLedger::new(storage.attendance_file.clone())?;
                Ok((Arc::new(ledger), StorageMode::Local))
            }
        },
        StorageKind::Local => {
            let ledger = FlatLogLedger::new(storage.attendance_file.clone())?;
            info!("attendance ledger at {}", storage.attendance_file.display());
            Ok((Arc::new(ledger), StorageMode::Local))
        }
    }
}
