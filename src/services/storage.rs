use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::BookingRecord;

/// Durable destination for completed bookings. Shared by every session.
#[async_trait]
pub trait BookingSink: Send + Sync {
    async fn store(&self, record: &BookingRecord) -> anyhow::Result<()>;
}

/// Append-only log with one JSON object per line.
pub struct JsonlLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl BookingSink for JsonlLog {
    async fn store(&self, record: &BookingRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(record).context("failed to encode appointment")?;
        line.push('\n');

        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("appointment log lock poisoned"))?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .context("failed to append appointment")?;
        file.sync_data().context("failed to flush appointment log")?;

        Ok(())
    }
}

/// Queryable store backed by the `appointments` table.
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BookingSink for SqliteStore {
    async fn store(&self, record: &BookingRecord) -> anyhow::Result<()> {
        let db = self
            .db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        if !queries::insert_appointment(&db, record)? {
            tracing::warn!(id = %record.id, "appointment already stored, skipping insert");
        }
        Ok(())
    }
}

/// Writes to every inner sink in order and fails on the first error.
pub struct FanoutSink {
    sinks: Vec<Box<dyn BookingSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn BookingSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl BookingSink for FanoutSink {
    async fn store(&self, record: &BookingRecord) -> anyhow::Result<()> {
        for sink in &self.sinks {
            sink.store(record).await?;
        }
        Ok(())
    }
}
