//! Thin wrapper around the cron scheduler.
//!
//! Two job shapes: one-shot game notices keyed by a derived identity with
//! replace-on-conflict semantics, and the periodic sync triggers. The
//! library addresses jobs by UUID, so the wrapper keeps a key → (uuid,
//! fire instant) map to make replacement idempotent: scheduling the same
//! key at the same instant is a no-op, a different instant supersedes the
//! old fire.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type TaskFuture = futures::future::BoxFuture<'static, ()>;

/// A unit of work the scheduler can run; cloned per invocation.
pub type Task = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("scheduler error: {0}")]
    Backend(String),
}

impl From<JobSchedulerError> for SchedulerError {
    fn from(e: JobSchedulerError) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Result of a replace-on-conflict scheduling call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Same key, same fire instant: nothing to do.
    Unchanged,
    /// New key: job installed.
    Scheduled,
    /// Same key, different fire instant: stale fire cancelled, new one
    /// installed.
    Replaced,
}

#[derive(Debug, Clone)]
struct NoticeEntry {
    job_id: Uuid,
    fire_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct NoticeScheduler {
    scheduler: JobScheduler,
    entries: Arc<Mutex<HashMap<String, NoticeEntry>>>,
}

impl std::fmt::Debug for NoticeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoticeScheduler").finish()
    }
}

impl NoticeScheduler {
    pub async fn new() -> Result<Self, SchedulerError> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler,
            entries: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub async fn start(&self) -> Result<(), SchedulerError> {
        self.scheduler.start().await?;
        info!("Scheduler started");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        let mut scheduler = self.scheduler.clone();
        scheduler.shutdown().await?;
        info!("Scheduler shut down");
        Ok(())
    }

    /// Install (or replace) the one-shot job for `key` at `fire_at`.
    pub async fn schedule_replace(
        &self,
        key: &str,
        fire_at: DateTime<Utc>,
        task: Task,
    ) -> Result<ScheduleOutcome, SchedulerError> {
        let mut entries = self.entries.lock().await;

        let mut replaced = false;
        if let Some(existing) = entries.get(key) {
            if existing.fire_at == fire_at {
                return Ok(ScheduleOutcome::Unchanged);
            }
            if let Err(e) = self.scheduler.remove(&existing.job_id).await {
                warn!(key, error = %e, "Failed to remove superseded job");
            }
            entries.remove(key);
            replaced = true;
        }

        let delay = (fire_at - Utc::now())
            .to_std()
            .unwrap_or(StdDuration::ZERO);

        let entries_ref = Arc::clone(&self.entries);
        let key_owned = key.to_string();
        let job = Job::new_one_shot_async(delay, move |_uuid, _lock| {
            let task = Arc::clone(&task);
            let entries = Arc::clone(&entries_ref);
            let key = key_owned.clone();
            Box::pin(async move {
                entries.lock().await.remove(&key);
                task().await;
            })
        })?;

        let job_id = self.scheduler.add(job).await?;
        entries.insert(key.to_string(), NoticeEntry { job_id, fire_at });

        debug!(key, %fire_at, replaced, "Scheduled notice job");
        Ok(if replaced {
            ScheduleOutcome::Replaced
        } else {
            ScheduleOutcome::Scheduled
        })
    }

    /// Cancel the pending job for `key`, if any. Replacement (above) and
    /// this are the only cancellation primitives.
    pub async fn cancel(&self, key: &str) -> Result<bool, SchedulerError> {
        let mut entries = self.entries.lock().await;
        match entries.remove(key) {
            Some(entry) => {
                self.scheduler.remove(&entry.job_id).await?;
                debug!(key, "Cancelled notice job");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fire instant of the pending job for `key`, if any.
    pub async fn fire_time(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.lock().await.get(key).map(|e| e.fire_at)
    }

    /// Number of pending one-shot jobs.
    pub async fn pending_count(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Register a cron-scheduled periodic task (6-field cron, UTC).
    pub async fn register_cron(
        &self,
        name: &'static str,
        cron: &str,
        task: Task,
    ) -> Result<(), SchedulerError> {
        let job = Job::new_async(cron, move |_uuid, _lock| {
            let task = Arc::clone(&task);
            Box::pin(async move {
                task().await;
            })
        })?;
        self.scheduler.add(job).await?;

        info!(name, cron, "Registered cron task");
        Ok(())
    }

    /// Register a fixed-interval periodic task.
    pub async fn register_repeated(
        &self,
        name: &'static str,
        interval: StdDuration,
        task: Task,
    ) -> Result<(), SchedulerError> {
        let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
            let task = Arc::clone(&task);
            Box::pin(async move {
                task().await;
            })
        })?;
        self.scheduler.add(job).await?;

        info!(name, interval_secs = interval.as_secs(), "Registered repeated task");
        Ok(())
    }
}
