//! Facade wiring the gate, the ledger, and the config store together. This
//! is the surface a UI or API layer talks to.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use log::info;

use crate::balance::{annual_report, monthly_report, Report, ReportKind, Schedule};
use crate::config::{ConfigStore, SystemConfig};
use crate::events::GateEvent;
use crate::gate::AttendanceGate;
use crate::ledger::{open_ledger, AttendanceLedger, AttendanceRecord, StorageMode};

pub struct AttendanceService {
    gate: Arc<AttendanceGate>,
    ledger: Arc<dyn AttendanceLedger>,
    config_store: ConfigStore,
    storage_mode: StorageMode,
}

impl AttendanceService {
    /// Loads config, opens the configured backend (degrading to the flat log
    /// if the database is unreachable), and rebuilds gate state from history.
    pub async fn new(config_store: ConfigStore) -> Result<Self> {
        let config = config_store.load();
        let (ledger, storage_mode) = open_ledger(&config.storage)?;
        let gate = AttendanceGate::new(Arc::clone(&ledger), config).await?;

        info!("attendance service started in {storage_mode:?} mode");

        Ok(Self {
            gate: Arc::new(gate),
            ledger,
            config_store,
            storage_mode,
        })
    }

    pub fn gate(&self) -> Arc<AttendanceGate> {
        Arc::clone(&self.gate)
    }

    /// Backend actually in use, which differs from the configured one after a
    /// degrade.
    pub fn storage_mode(&self) -> StorageMode {
        self.storage_mode
    }

    /// Recent punches, newest first. `limit` keeps the most recent records.
    pub async fn get_attendance(&self, limit: Option<usize>) -> Result<Vec<AttendanceRecord>> {
        let mut records = self.ledger.query_all(limit).await?;
        records.reverse();
        Ok(records)
    }

    pub async fn count(&self) -> Result<usize> {
        self.ledger.count().await
    }

    /// Builds a monthly or annual time-balance report for one identity from
    /// the full ledger. Read-only; a commit racing this call may or may not
    /// be included.
    pub async fn generate_report(
        &self,
        name: &str,
        month: u32,
        year: i32,
        kind: ReportKind,
    ) -> Result<Report> {
        if name.is_empty() {
            bail!("report requires an identity name");
        }
        if kind == ReportKind::Monthly && !(1..=12).contains(&month) {
            bail!("invalid month {month}: use 1 through 12");
        }

        let records = self
            .ledger
            .query_by_name(name, None)
            .await
            .with_context(|| format!("failed to load attendance for {name}"))?;

        let config = self.gate.config().await;
        let schedule = Schedule {
            entry: config.standard_entry,
            exit: config.standard_exit,
            lunch_minutes: config.lunch_minutes,
        };

        Ok(match kind {
            ReportKind::Monthly => {
                Report::Monthly(monthly_report(name, month, year, &records, &schedule))
            }
            ReportKind::Annual => Report::Annual(annual_report(name, year, &records, &schedule)),
        })
    }

    /// Updates the standard schedule atomically, then persists. A persistence
    /// failure is surfaced but the in-memory update stands.
    pub async fn set_schedule(
        &self,
        entry: NaiveTime,
        exit: NaiveTime,
        lunch_minutes: i64,
    ) -> Result<SystemConfig> {
        if lunch_minutes < 0 {
            bail!("lunch_minutes must not be negative, got {lunch_minutes}");
        }

        let updated = self
            .gate
            .update_config(|config| {
                config.standard_entry = entry;
                config.standard_exit = exit;
                config.lunch_minutes = lunch_minutes;
            })
            .await;

        self.config_store
            .persist(&updated)
            .context("schedule updated in memory but could not be persisted")?;
        Ok(updated)
    }

    /// Updates confirmation and/or cooldown timers atomically, then persists.
    pub async fn set_timers(
        &self,
        confirmation_seconds: Option<f64>,
        cooldown_seconds: Option<u64>,
    ) -> Result<SystemConfig> {
        if let Some(seconds) = confirmation_seconds {
            if !(seconds > 0.0) {
                bail!("confirmation_seconds must be positive, got {seconds}");
            }
        }

        let updated = self
            .gate
            .update_config(|config| {
                if let Some(seconds) = confirmation_seconds {
                    config.confirmation_seconds = seconds;
                }
                if let Some(seconds) = cooldown_seconds {
                    config.cooldown_seconds = seconds;
                }
            })
            .await;

        self.config_store
            .persist(&updated)
            .context("timers updated in memory but could not be persisted")?;
        Ok(updated)
    }

    pub async fn current_config(&self) -> SystemConfig {
        self.gate.config().await
    }

    /// Latest unread gate event, if any. See `EventSlot` for the loss rules.
    pub async fn take_last_event(&self) -> Option<GateEvent> {
        self.gate.take_last_event().await
    }
}
