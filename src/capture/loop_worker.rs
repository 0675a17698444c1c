use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::gate::{AttendanceGate, CaptureDirective, GateAction};

use super::source::{Sighting, SightingSource};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info, log_warn};

const FRAME_INTERVAL_MILLIS: u64 = 200;
const FRAME_TIMEOUT_SECS: u64 = 10;

/// Drives the gate from a sighting stream, one frame per tick. Exits when the
/// stream ends, the token is cancelled, or the gate asks for a stop; the stop
/// check is cooperative, once per frame, never mid-frame.
pub async fn capture_loop(
    mut source: Box<dyn SightingSource>,
    gate: Arc<AttendanceGate>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(FRAME_INTERVAL_MILLIS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = tokio::time::timeout(
                    Duration::from_secs(FRAME_TIMEOUT_SECS),
                    source.next_frame(),
                )
                .await;

                match frame {
                    Ok(Ok(Some(sightings))) => {
                        if process_frame(&gate, sightings).await == CaptureDirective::Stop {
                            log_info!("capture loop stopping on gate directive");
                            break;
                        }
                    }
                    Ok(Ok(None)) => {
                        log_info!("sighting stream ended");
                        break;
                    }
                    Ok(Err(err)) => log_error!("frame acquisition failed: {err:?}"),
                    Err(_) => log_warn!("frame acquisition timeout (> {}s)", FRAME_TIMEOUT_SECS),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("capture loop shutting down");
                break;
            }
        }
    }
}

/// Runs one frame through the gate: every recognized sighting is observed,
/// then the pending map is reconciled against the identities actually seen.
/// A failed commit is logged and retried naturally on the next frame.
async fn process_frame(
    gate: &AttendanceGate,
    sightings: Vec<Sighting>,
) -> CaptureDirective {
    let now = Utc::now();
    let mut directive = CaptureDirective::Continue;
    let mut seen: HashSet<String> = HashSet::new();

    for sighting in &sightings {
        if !sighting.is_recognized() {
            continue;
        }
        seen.insert(sighting.name.clone());

        match gate.observe(&sighting.name, now).await {
            Ok(observation) => {
                match &observation.action {
                    GateAction::Committed { timestamp } => {
                        log_info!(
                            "punch committed for {} at {}",
                            sighting.name,
                            timestamp.to_rfc3339()
                        );
                    }
                    GateAction::CooldownBlocked { remaining_seconds } => {
                        log_info!(
                            "{} in cooldown for another {}s",
                            sighting.name,
                            remaining_seconds
                        );
                    }
                    GateAction::Pending => {}
                }
                if observation.directive == CaptureDirective::Stop {
                    directive = CaptureDirective::Stop;
                }
            }
            Err(err) => {
                log_error!("observe failed for {}: {err:?}", sighting.name);
            }
        }
    }

    gate.reconcile(&seen).await;
    directive
}
