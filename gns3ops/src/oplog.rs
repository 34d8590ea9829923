//! Append-only operation log (JSON Lines).
//!
//! One record per device per operation. Lines are only ever appended; a
//! line that fails to parse is skipped on read.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// What was done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Discovery,
    StatusCheck,
    Backup,
    Restore,
    BulkConfig,
    PasswordRotation,
    SshSetup,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        OperationKind::Discovery,
        OperationKind::StatusCheck,
        OperationKind::Backup,
        OperationKind::Restore,
        OperationKind::BulkConfig,
        OperationKind::PasswordRotation,
        OperationKind::SshSetup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Discovery => "discovery",
            OperationKind::StatusCheck => "status_check",
            OperationKind::Backup => "backup",
            OperationKind::Restore => "restore",
            OperationKind::BulkConfig => "bulk_config",
            OperationKind::PasswordRotation => "password_rotation",
            OperationKind::SshSetup => "ssh_setup",
        }
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown operation kind '{}'", s))
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// How it went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,

    /// Reached the device, but some commands failed or timed out.
    Partial,

    Failed,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            OperationStatus::Success => "success",
            OperationStatus::Partial => "partial",
            OperationStatus::Failed => "failed",
        })
    }
}

/// One log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: Uuid,
    pub kind: OperationKind,
    pub device: String,
    pub status: OperationStatus,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl OperationRecord {
    pub fn new(
        kind: OperationKind,
        device: impl Into<String>,
        status: OperationStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            device: device.into(),
            status,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Filter for [`OperationLog::query`]. Empty matches everything.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub device: Option<String>,
    pub kind: Option<OperationKind>,

    /// Most recent first, at most this many.
    pub limit: Option<usize>,
}

impl LogQuery {
    fn matches(&self, record: &OperationRecord) -> bool {
        self.device.as_ref().is_none_or(|d| *d == record.device)
            && self.kind.is_none_or(|k| k == record.kind)
    }
}

/// Handle to the log file. Clones share one append lock.
#[derive(Debug, Clone)]
pub struct OperationLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl OperationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    pub async fn append(&self, record: &OperationRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record).map_err(StoreError::from)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(&line)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        Ok(())
    }

    /// Append, logging instead of failing. Batch workflows use this so a
    /// log write never stops the batch.
    pub async fn record(&self, record: OperationRecord) {
        if let Err(e) = self.append(&record).await {
            warn!("Failed to write operation record for {}: {}", record.device, e);
        }
    }

    /// All records, oldest first.
    pub async fn load(&self) -> Result<Vec<OperationRecord>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.path, e).into()),
        };

        Ok(text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping bad line in {}: {}", self.path.display(), e);
                    None
                }
            })
            .collect())
    }

    /// Matching records, most recent first.
    pub async fn query(&self, query: &LogQuery) -> Result<Vec<OperationRecord>> {
        let mut records: Vec<_> = self
            .load()
            .await?
            .into_iter()
            .filter(|r| query.matches(r))
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}
