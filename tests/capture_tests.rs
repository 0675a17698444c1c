//! Capture-loop tests: driving the gate from a scripted sighting stream and
//! the controller lifecycle.

use std::io::Cursor;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::BufReader;

use ponto::capture::{CaptureController, JsonLinesSource, Sighting, SightingSource};
use ponto::config::SystemConfig;
use ponto::gate::AttendanceGate;
use ponto::ledger::{AttendanceLedger, FlatLogLedger};

async fn fast_gate(dir: &TempDir) -> (Arc<AttendanceGate>, Arc<FlatLogLedger>) {
    let ledger = Arc::new(FlatLogLedger::new(dir.path().join("attendance.csv")).unwrap());
    let config = SystemConfig {
        confirmation_seconds: 0.3,
        cooldown_seconds: 60,
        ..SystemConfig::default()
    };
    let gate = AttendanceGate::new(ledger.clone(), config).await.unwrap();
    (Arc::new(gate), ledger)
}

fn json_feed(lines: &[&str]) -> Box<JsonLinesSource<BufReader<Cursor<Vec<u8>>>>> {
    let body = lines.join("\n");
    Box::new(JsonLinesSource::new(BufReader::new(Cursor::new(
        body.into_bytes(),
    ))))
}

#[tokio::test]
async fn continuous_sighting_commits_once_and_stops_capture() {
    let dir = TempDir::new().unwrap();
    let (gate, ledger) = fast_gate(&dir).await;

    // More frames than needed; the stop directive after the commit must end
    // the loop before the feed runs dry.
    let frame = r#"[{"name":"ana","bbox":[10,20,64,64],"distance":0.42}]"#;
    let frames: Vec<&str> = std::iter::repeat(frame).take(50).collect();

    let mut controller = CaptureController::new();
    controller.start(json_feed(&frames), gate).unwrap();
    controller.join().await.unwrap();

    let records = ledger.query_all(None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "ana");
}

#[tokio::test]
async fn unrecognized_faces_never_commit() {
    let dir = TempDir::new().unwrap();
    let (gate, ledger) = fast_gate(&dir).await;

    let frame = r#"[{"name":"Unknown","bbox":[0,0,32,32],"distance":null}]"#;
    let frames: Vec<&str> = std::iter::repeat(frame).take(5).collect();

    let mut controller = CaptureController::new();
    controller.start(json_feed(&frames), gate).unwrap();
    controller.join().await.unwrap();

    assert_eq!(ledger.count().await.unwrap(), 0);
}

#[tokio::test]
async fn malformed_lines_are_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let (gate, ledger) = fast_gate(&dir).await;

    let good = r#"[{"name":"ana","bbox":[0,0,32,32]}]"#;
    let frames = vec!["not json at all", good, good, good, good, good];

    let mut controller = CaptureController::new();
    controller.start(json_feed(&frames), gate).unwrap();
    controller.join().await.unwrap();

    // The bad line cost one frame; the rest still confirmed the punch.
    assert_eq!(ledger.count().await.unwrap(), 1);
}

/// Endless stream of empty frames, for lifecycle tests.
struct EmptyFrames;

#[async_trait]
impl SightingSource for EmptyFrames {
    async fn next_frame(&mut self) -> Result<Option<Vec<Sighting>>> {
        Ok(Some(Vec::new()))
    }
}

#[tokio::test]
async fn controller_rejects_concurrent_start_and_stops_cleanly() {
    let dir = TempDir::new().unwrap();
    let (gate, _ledger) = fast_gate(&dir).await;

    let mut controller = CaptureController::new();
    controller.start(Box::new(EmptyFrames), gate.clone()).unwrap();
    assert!(controller.is_running());

    let second = controller.start(Box::new(EmptyFrames), gate);
    assert!(second.is_err());

    controller.stop().await.unwrap();
    assert!(!controller.is_running());
}

#[tokio::test]
async fn stream_end_finishes_loop() {
    let dir = TempDir::new().unwrap();
    let ledger = Arc::new(FlatLogLedger::new(dir.path().join("attendance.csv")).unwrap());
    let config = SystemConfig {
        // Far longer than the feed, so the stream always ends first.
        confirmation_seconds: 10.0,
        ..SystemConfig::default()
    };
    let gate = Arc::new(AttendanceGate::new(ledger.clone(), config).await.unwrap());

    let frame = r#"[{"name":"ana","bbox":[0,0,32,32]}]"#;
    let mut controller = CaptureController::new();
    controller.start(json_feed(&[frame, frame]), gate).unwrap();
    controller.join().await.unwrap();

    assert_eq!(ledger.count().await.unwrap(), 0);
}
