use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{error, info, warn};
use rusqlite::{params, Connection};
use tokio::sync::oneshot;

use super::helpers::{parse_timestamp, to_usize};
use super::migrations::run_migrations;
use super::{apply_limit, AttendanceLedger, AttendanceRecord};

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

/// SQLite backend. The connection lives on a dedicated worker thread; callers
/// send closures over a channel and await the reply, so the async runtime is
/// never blocked on database I/O.
#[derive(Clone)]
pub struct SqliteLedger {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl SqliteLedger {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("ponto-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Attendance database initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }
}

/// Parses raw `(name, timestamp)` rows, dropping any row whose timestamp does
/// not parse, then restores ascending order by parsed instant. The stored
/// strings may mix `Z` and numeric offsets, so the SQL text ordering alone is
/// not authoritative.
fn parse_rows(rows: Vec<(String, String)>) -> Vec<AttendanceRecord> {
    let mut records = Vec::with_capacity(rows.len());
    for (name, raw_timestamp) in rows {
        match parse_timestamp(&raw_timestamp, "timestamp") {
            Ok(timestamp) => records.push(AttendanceRecord::new(name, timestamp)),
            Err(err) => {
                warn!("skipping attendance row with bad timestamp: {err:#}");
            }
        }
    }
    records.sort_by_key(|record| record.timestamp);
    records
}

#[async_trait]
impl AttendanceLedger for SqliteLedger {
    async fn append(&self, record: &AttendanceRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO attendance (name, timestamp) VALUES (?1, ?2)",
                params![record.name, record.timestamp.to_rfc3339()],
            )
            .with_context(|| "failed to insert attendance record")?;
            Ok(())
        })
        .await
    }

    async fn query_all(&self, limit: Option<usize>) -> Result<Vec<AttendanceRecord>> {
        let rows = self
            .execute(move |conn| {
                // Newest first so a LIMIT keeps the most recent records; the
                // caller-visible order is restored after parsing.
                let sql = match limit {
                    Some(_) => {
                        "SELECT name, timestamp FROM attendance
                         ORDER BY timestamp DESC LIMIT ?1"
                    }
                    None => "SELECT name, timestamp FROM attendance ORDER BY timestamp",
                };
                let mut stmt = conn.prepare(sql)?;
                let mut raw = Vec::new();
                let mut rows = match limit {
                    Some(n) => stmt.query(params![n as i64])?,
                    None => stmt.query([])?,
                };
                while let Some(row) = rows.next()? {
                    raw.push((row.get::<_, String>(0)?, row.get::<_, String>(1)?));
                }
                Ok(raw)
            })
            .await?;

        Ok(apply_limit(parse_rows(rows), limit))
    }

    async fn query_by_name(&self, name: &str, limit: Option<usize>) -> Result<Vec<AttendanceRecord>> {
        let name = name.to_string();
        let rows = self
            .execute(move |conn| {
                let sql = match limit {
                    Some(_) => {
                        "SELECT name, timestamp FROM attendance
                         WHERE name = ?1 ORDER BY timestamp DESC LIMIT ?2"
                    }
                    None => {
                        "SELECT name, timestamp FROM attendance
                         WHERE name = ?1 ORDER BY timestamp"
                    }
                };
                let mut stmt = conn.prepare(sql)?;
                let mut raw = Vec::new();
                let mut rows = match limit {
                    Some(n) => stmt.query(params![name, n as i64])?,
                    None => stmt.query(params![name])?,
                };
                while let Some(row) = rows.next()? {
                    raw.push((row.get::<_, String>(0)?, row.get::<_, String>(1)?));
                }
                Ok(raw)
            })
            .await?;

        Ok(apply_limit(parse_rows(rows), limit))
    }

    async fn count(&self) -> Result<usize> {
        self.execute(|conn| {
            let total: i64 = conn
                .query_row("SELECT COUNT(*) FROM attendance", [], |row| row.get(0))
                .with_context(|| "failed to count attendance records")?;
            to_usize(total, "attendance count")
        })
        .await
    }
}
