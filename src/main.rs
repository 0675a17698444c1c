use std::path::PathBuf;

use anyhow::Result;
use log::info;
use tokio_util::sync::CancellationToken;

use ponto::capture::{loop_worker::capture_loop, JsonLinesSource};
use ponto::config::ConfigStore;
use ponto::service::AttendanceService;

/// Headless runner: reads recognizer output as JSON lines on stdin (one array
/// of sightings per frame) and feeds it through the attendance gate. Reports
/// and configuration are the library's surface; this binary only keeps the
/// ledger fed.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::var("PONTO_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("system_config.json"));

    let service = AttendanceService::new(ConfigStore::new(config_path)).await?;
    info!("storage mode: {:?}", service.storage_mode());

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let source = Box::new(JsonLinesSource::new(stdin));

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping capture");
            cancel_on_signal.cancel();
        }
    });

    capture_loop(source, service.gate(), cancel).await;

    info!("ledger holds {} records", service.count().await?);
    Ok(())
}
