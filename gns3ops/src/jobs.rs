//! Background jobs and per-device session locks.
//!
//! A job is a detached tokio task whose state can be polled by id, including
//! after it failed or panicked. Finished jobs stay listed until pruned. There
//! is no queue and no cancellation. [`DeviceLocks`] keeps two jobs from opening
//! sessions to the same device at once.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use crate::error::Result;

/// One mutex per device name, created on first use.
#[derive(Debug, Clone, Default)]
pub struct DeviceLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `device`. Released when the guard drops.
    pub async fn lock(&self, device: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(device.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        })
    }
}

/// Snapshot of a job.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: String,
    pub state: JobState,

    /// Result summary, or the error once failed.
    pub summary: Option<String>,

    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
}

/// Spawns jobs and tracks their state.
#[derive(Clone, Default)]
pub struct JobRunner {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
    handles: Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>,
}

impl JobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `work` in the background. Its `Ok` value becomes the summary.
    pub async fn submit<F>(&self, kind: impl Into<String>, work: F) -> Uuid
    where
        F: Future<Output = Result<String>> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let kind = kind.into();
        info!("Job {} ({}) started", id, kind);

        self.jobs.write().await.insert(
            id,
            Job {
                id,
                kind,
                state: JobState::Running,
                summary: None,
                started: Utc::now(),
                finished: None,
            },
        );

        // `work` runs in an inner task; a panic there is recorded as a failure.
        let jobs = self.jobs.clone();
        let handles = self.handles.clone();
        let mut pending = self.handles.lock().await;
        let handle = tokio::spawn(async move {
            let (state, summary) = match tokio::spawn(work).await {
                Ok(Ok(summary)) => (JobState::Completed, summary),
                Ok(Err(e)) => {
                    error!("Job {} failed: {}", id, e);
                    (JobState::Failed, e.to_string())
                }
                Err(e) => {
                    let reason = abnormal_end(e);
                    error!("Job {} ended abnormally: {}", id, reason);
                    (JobState::Failed, reason)
                }
            };

            if let Some(job) = jobs.write().await.get_mut(&id) {
                job.state = state;
                job.summary = Some(summary);
                job.finished = Some(Utc::now());
                info!("Job {} ({}) {}", id, job.kind, state);
            }
            handles.lock().await.remove(&id);
        });
        pending.insert(id, handle);
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// All jobs, oldest first.
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<_> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|job| job.started);
        jobs
    }

    /// Wait for a job to finish and return its final snapshot.
    pub async fn wait(&self, id: Uuid) -> Option<Job> {
        let handle = self.handles.lock().await.remove(&id);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Job {} supervisor ended abnormally: {}", id, e);
            }
        }
        self.get(id).await
    }

    /// Forget every job that is no longer running. Returns how many went.
    pub async fn prune_finished(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.state == JobState::Running);
        let pruned = before - jobs.len();
        if pruned > 0 {
            debug!("Pruned {} finished jobs", pruned);
        }
        pruned
    }
}

/// Panic payload or cancellation of a job task, as text.
fn abnormal_end(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    match payload.downcast::<String>() {
        Ok(message) => format!("panicked: {}", message),
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => format!("panicked: {}", message),
            Err(_) => "panicked".to_string(),
        },
    }
}
