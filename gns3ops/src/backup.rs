//! Running-configuration backups and restore.
//!
//! Backups are plain text files named `{device}_backup_{timestamp}.txt` in
//! one directory. A second backup within the same second gets a `_2`, `_3`,
//! ... suffix after the timestamp rather than replacing the first.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Timelike};
use log::{debug, info};

use crate::driver::{CommandSequence, CommandSpec, Outcome, PRIVILEGED, Session};
use crate::error::{ChannelError, Result, StoreError};
use crate::inventory::write_atomic;
use crate::transport::Transport;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const BACKUP_MARKER: &str = "_backup_";

/// Backups of one device allowed within the same second.
const MAX_PER_SECOND: u32 = 99;

/// Command whose output is the backup.
pub const SHOW_RUNNING_CONFIG: &str = "show running-config";

/// One backup file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub device: String,
    pub path: PathBuf,
    pub taken: NaiveDateTime,

    /// Bytes on disk.
    pub size: u64,

    /// 1 for the first backup taken in a second, then 2, 3, ...
    pub sequence: u32,
}

impl BackupFile {
    /// Parse a backup file name. Anything else is `None`.
    fn from_path(path: &Path, size: u64) -> Option<Self> {
        let stem = path.file_name()?.to_str()?.strip_suffix(".txt")?;
        let (device, stamp) = stem.rsplit_once(BACKUP_MARKER)?;
        let (taken, sequence) = match NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT) {
            Ok(taken) => (taken, 1),
            Err(_) => {
                let (stamp, sequence) = stamp.rsplit_once('_')?;
                let sequence: u32 = sequence.parse().ok().filter(|n| *n > 1)?;
                (NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?, sequence)
            }
        };
        Some(Self {
            device: device.to_string(),
            path: path.to_path_buf(),
            taken,
            size,
            sequence,
        })
    }
}

/// Directory of backup files.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(device: &str, taken: &NaiveDateTime, sequence: u32) -> String {
        let stamp = taken.format(TIMESTAMP_FORMAT);
        if sequence > 1 {
            format!("{}{}{}_{}.txt", device, BACKUP_MARKER, stamp, sequence)
        } else {
            format!("{}{}{}.txt", device, BACKUP_MARKER, stamp)
        }
    }

    /// First file name for `device` at `taken` not already on disk.
    async fn free_path(&self, device: &str, taken: &NaiveDateTime) -> Result<(PathBuf, u32)> {
        let mut path = self.dir.join(Self::file_name(device, taken, 1));
        for sequence in 1..=MAX_PER_SECOND {
            path = self.dir.join(Self::file_name(device, taken, sequence));
            let in_use = tokio::fs::try_exists(&path)
                .await
                .map_err(|e| StoreError::io(&path, e))?;
            if !in_use {
                return Ok((path, sequence));
            }
        }
        Err(StoreError::Exists { path }.into())
    }

    /// Write `config` as a backup of `device`, stamped now.
    pub async fn save(&self, device: &str, config: &str) -> Result<BackupFile> {
        let now = Local::now().naive_local();
        // Second resolution, like the file name
        let taken = now.with_nanosecond(0).unwrap_or(now);
        self.save_at(device, config, taken).await
    }

    async fn save_at(&self, device: &str, config: &str, taken: NaiveDateTime) -> Result<BackupFile> {
        if device.is_empty() || device.contains(['/', '\\']) {
            return Err(StoreError::InvalidName(device.to_string()).into());
        }

        let (path, sequence) = self.free_path(device, &taken).await?;
        write_atomic(&path, config.as_bytes()).await?;
        info!("{}: backup saved to {}", device, path.display());

        Ok(BackupFile {
            device: device.to_string(),
            path,
            taken,
            size: config.len() as u64,
            sequence,
        })
    }

    /// Backups, newest first. `device` narrows to one device.
    pub async fn list(&self, device: Option<&str>) -> Result<Vec<BackupFile>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e).into()),
        };

        let mut backups = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let size = match entry.metadata().await {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    debug!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let Some(backup) = BackupFile::from_path(&entry.path(), size) else {
                continue;
            };
            if device.is_none_or(|d| d == backup.device) {
                backups.push(backup);
            }
        }

        backups.sort_by(|a, b| {
            (b.taken, b.sequence)
                .cmp(&(a.taken, a.sequence))
                .then_with(|| a.device.cmp(&b.device))
        });
        Ok(backups)
    }

    /// Most recent backup of `device`.
    pub async fn latest(&self, device: &str) -> Result<BackupFile> {
        self.list(Some(device))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                StoreError::NotFound {
                    what: "backup for device",
                    name: device.to_string(),
                }
                .into()
            })
    }

    pub async fn read(&self, backup: &BackupFile) -> Result<String> {
        tokio::fs::read_to_string(&backup.path)
            .await
            .map_err(|e| StoreError::io(&backup.path, e).into())
    }
}

/// Configuration lines of a saved backup, ready to replay in config mode.
///
/// Drops the banner lines `show running-config` prints, `!` separators,
/// the `version` and `end` lines, and blanks.
pub fn restore_lines(config: &str) -> CommandSequence {
    CommandSequence::from_lines(
        config
            .lines()
            .map(str::trim_end)
            .filter(|line| {
                let trimmed = line.trim_start();
                !(trimmed.is_empty()
                    || trimmed.starts_with('!')
                    || trimmed.starts_with("Building configuration")
                    || trimmed.starts_with("Current configuration")
                    || trimmed.starts_with("version ")
                    || trimmed == "end")
            }),
    )
}

/// Fetch the running configuration in privileged exec.
pub async fn fetch_running_config<T: Transport>(session: &mut Session<T>) -> Result<String> {
    session.acquire_privilege(PRIVILEGED).await?;

    let window = session.timing().extended_timeout;
    let spec = CommandSpec::new(SHOW_RUNNING_CONFIG).with_timeout(window);
    let response = session.execute(&spec).await?;
    if response.outcome != Outcome::Completed {
        return Err(ChannelError::PromptTimeout(session.timing().scaled(window)).into());
    }

    debug!(
        "{}: running config is {} lines",
        session.name(),
        response.lines().count()
    );
    Ok(response.result)
}
