use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::warn;

use super::helpers::parse_timestamp;
use super::{apply_limit, AttendanceLedger, AttendanceRecord};

const HEADER: &str = "name,timestamp";

/// Append-only flat-file backend. One `<name>,<RFC 3339>` line per record,
/// header row first. Reads sort by parsed instant, so insertion order in the
/// file never matters.
pub struct FlatLogLedger {
    path: PathBuf,
}

impl FlatLogLedger {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create attendance log directory {}", parent.display())
                })?;
            }
        }

        if !path.exists() {
            let mut file = File::create(&path)
                .with_context(|| format!("failed to create attendance log {}", path.display()))?;
            writeln!(file, "{HEADER}")
                .with_context(|| format!("failed to write header to {}", path.display()))?;
            file.sync_all()
                .with_context(|| format!("failed to sync attendance log {}", path.display()))?;
        }

        Ok(Self { path })
    }

    fn read_records(&self) -> Result<Vec<AttendanceRecord>> {
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open attendance log {}", self.path.display()))?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.with_context(|| {
                format!("failed to read line {} of {}", index + 1, self.path.display())
            })?;

            // First line is the header row.
            if index == 0 {
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }

            // Split on the last comma: the timestamp never contains one,
            // names might.
            let Some((name, raw_timestamp)) = line.rsplit_once(',') else {
                warn!("skipping malformed attendance line {}: '{line}'", index + 1);
                continue;
            };

            match parse_timestamp(raw_timestamp.trim(), "timestamp") {
                Ok(timestamp) => records.push(AttendanceRecord::new(name, timestamp)),
                Err(err) => {
                    warn!("skipping attendance line {} with bad timestamp: {err:#}", index + 1);
                }
            }
        }

        Ok(records)
    }

    fn count_lines(&self) -> Result<usize> {
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open attendance log {}", self.path.display()))?;
        let reader = BufReader::new(file);

        let mut count = 0usize;
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if index == 0 || line.trim().is_empty() {
                continue;
            }
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl AttendanceLedger for FlatLogLedger {
    async fn append(&self, record: &AttendanceRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open attendance log {}", self.path.display()))?;

        writeln!(file, "{},{}", record.name, record.timestamp.to_rfc3339())
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush()?;
        // The record must be on disk before the gate treats it as committed.
        file.sync_all()
            .with_context(|| format!("failed to sync attendance log {}", self.path.display()))?;

        Ok(())
    }

    async fn query_all(&self, limit: Option<usize>) -> Result<Vec<AttendanceRecord>> {
        let mut records = self.read_records()?;
        records.sort_by_key(|record| record.timestamp);
        Ok(apply_limit(records, limit))
    }

    async fn query_by_name(&self, name: &str, limit: Option<usize>) -> Result<Vec<AttendanceRecord>> {
        let mut records = self.read_records()?;
        records.retain(|record| record.name == name);
        records.sort_by_key(|record| record.timestamp);
        Ok(apply_limit(records, limit))
    }

    async fn count(&self) -> Result<usize> {
        self.count_lines()
    }
}
