//! Per-identity confirmation and cooldown state machine.
//!
//! `observe` is called once per recognized identity per frame; `reconcile`
//! once per frame with the set of identities actually in view. One commit is
//! written per dwell-plus-cooldown cycle, never more.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::SystemConfig;
use crate::events::{EventSlot, GateEvent};
use crate::ledger::{AttendanceLedger, AttendanceRecord};

/// What the gate decided about one sighting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GateAction {
    /// Dwell window open (or just opened); nothing committed yet.
    Pending,
    /// The identity committed recently and must wait.
    #[serde(rename_all = "camelCase")]
    CooldownBlocked { remaining_seconds: u64 },
    /// A punch was written to the ledger.
    #[serde(rename_all = "camelCase")]
    Committed { timestamp: DateTime<Utc> },
}

/// Whether the capture loop should keep feeding frames. Stopping after a
/// commit or a cooldown hit is the historical behavior; the loop owns the
/// camera lifecycle, the gate only asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDirective {
    Continue,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub action: GateAction,
    pub directive: CaptureDirective,
}

#[derive(Debug, Clone, Copy)]
struct PendingConfirmation {
    first_seen: DateTime<Utc>,
}

/// Everything the gate mutates, behind one lock: the dwell windows, the
/// last-commit map, the event mailbox, and the live config. Commits write to
/// the ledger while the lock is held, so they are strictly serialized.
struct GateState {
    pending: HashMap<String, PendingConfirmation>,
    last_commit: HashMap<String, DateTime<Utc>>,
    events: EventSlot,
    config: SystemConfig,
}

pub struct AttendanceGate {
    ledger: Arc<dyn AttendanceLedger>,
    state: Mutex<GateState>,
}

impl AttendanceGate {
    /// Builds the gate, reconstructing the last-commit map from the ledger so
    /// cooldowns survive a restart.
    pub async fn new(ledger: Arc<dyn AttendanceLedger>, config: SystemConfig) -> Result<Self> {
        let records = ledger
            .query_all(None)
            .await
            .context("failed to load attendance history")?;

        let mut last_commit: HashMap<String, DateTime<Utc>> = HashMap::new();
        for record in &records {
            // Records arrive ascending, so the last write wins.
            last_commit.insert(record.name.clone(), record.timestamp);
        }

        info!(
            "attendance gate ready: {} records, {} known identities",
            records.len(),
            last_commit.len()
        );

        Ok(Self {
            ledger,
            state: Mutex::new(GateState {
                pending: HashMap::new(),
                last_commit,
                events: EventSlot::default(),
                config,
            }),
        })
    }

    /// Feeds one sighting of `name` at `now` through the state machine.
    ///
    /// A failed ledger write leaves the dwell window untouched, so the very
    /// next frame retries the commit.
    pub async fn observe(&self, name: &str, now: DateTime<Utc>) -> Result<Observation> {
        let mut state = self.state.lock().await;

        if let Some(&last) = state.last_commit.get(name) {
            let cooldown = Duration::seconds(state.config.cooldown_seconds as i64);
            let elapsed = now - last;
            if elapsed < cooldown {
                let remaining_seconds = (cooldown - elapsed).num_seconds().max(0) as u64;
                state.events.publish(GateEvent::Cooldown {
                    name: name.to_string(),
                    remaining_seconds,
                });
                return Ok(Observation {
                    action: GateAction::CooldownBlocked { remaining_seconds },
                    directive: CaptureDirective::Stop,
                });
            }
        }

        let Some(first_seen) = state.pending.get(name).map(|pending| pending.first_seen) else {
            state
                .pending
                .insert(name.to_string(), PendingConfirmation { first_seen: now });
            return Ok(Observation {
                action: GateAction::Pending,
                directive: CaptureDirective::Continue,
            });
        };

        let dwell_seconds = (now - first_seen).num_milliseconds() as f64 / 1000.0;
        if dwell_seconds < state.config.confirmation_seconds {
            return Ok(Observation {
                action: GateAction::Pending,
                directive: CaptureDirective::Continue,
            });
        }

        let record = AttendanceRecord::new(name, now);
        self.ledger
            .append(&record)
            .await
            .with_context(|| format!("failed to commit attendance for {name}"))?;

        state.pending.remove(name);
        state.last_commit.insert(name.to_string(), now);
        state.events.publish(GateEvent::Committed {
            name: name.to_string(),
            timestamp: now,
        });
        info!("attendance committed for {name} at {}", now.to_rfc3339());

        Ok(Observation {
            action: GateAction::Committed { timestamp: now },
            directive: CaptureDirective::Stop,
        })
    }

    /// Drops the dwell window of every identity missing from the current
    /// frame. An occluded face starts over; partial dwell never carries.
    pub async fn reconcile(&self, seen: &HashSet<String>) {
        let mut state = self.state.lock().await;
        state.pending.retain(|name, _| seen.contains(name));
    }

    /// Reads and clears the latest gate event. Lossy by design: only the most
    /// recent unread event is ever available.
    pub async fn take_last_event(&self) -> Option<GateEvent> {
        let mut state = self.state.lock().await;
        state.events.take()
    }

    pub async fn config(&self) -> SystemConfig {
        self.state.lock().await.config.clone()
    }

    /// Applies a config mutation atomically and returns the updated copy for
    /// the caller to persist.
    pub async fn update_config<F>(&self, apply: F) -> SystemConfig
    where
        F: FnOnce(&mut SystemConfig),
    {
        let mut state = self.state.lock().await;
        apply(&mut state.config);
        state.config.clone()
    }
}
