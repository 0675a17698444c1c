use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::gate::AttendanceGate;

use super::loop_worker::capture_loop;
use super::source::SightingSource;

/// Owns the capture loop task. One loop at a time; `stop` cancels and joins.
pub struct CaptureController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl CaptureController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(
        &mut self,
        source: Box<dyn SightingSource>,
        gate: Arc<AttendanceGate>,
    ) -> Result<()> {
        if self.is_running() {
            bail!("capture already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(capture_loop(source, gate, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!("capture loop started");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("capture loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }

    /// Waits for the loop to finish on its own (stream end or gate stop)
    /// without cancelling it.
    pub async fn join(&mut self) -> Result<()> {
        self.cancel_token.take();
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("capture loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for CaptureController {
    fn default() -> Self {
        Self::new()
    }
}
