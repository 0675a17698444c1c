use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

/// Label the recognizer emits for a face it could not match.
pub const UNRECOGNIZED: &str = "Unknown";

/// One recognizer hit in one frame. Ephemeral; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sighting {
    pub name: String,
    #[serde(default)]
    pub bbox: [i32; 4],
    #[serde(default)]
    pub distance: Option<f64>,
}

impl Sighting {
    pub fn is_recognized(&self) -> bool {
        self.name != UNRECOGNIZED
    }
}

/// Seam in front of the camera-plus-classifier pipeline. One call yields one
/// frame's worth of sightings; `None` means the stream is over.
#[async_trait]
pub trait SightingSource: Send {
    async fn next_frame(&mut self) -> Result<Option<Vec<Sighting>>>;
}

/// Reads recognizer output as JSON lines, one array of sightings per line.
/// Blank lines are skipped so a feed can keep the pipe warm.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R> SightingSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_frame(&mut self) -> Result<Option<Vec<Sighting>>> {
        loop {
            match self
                .lines
                .next_line()
                .await
                .context("failed to read sighting line")?
            {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    let frame: Vec<Sighting> = serde_json::from_str(&line)
                        .with_context(|| format!("malformed sighting line: '{line}'"))?;
                    return Ok(Some(frame));
                }
            }
        }
    }
}
