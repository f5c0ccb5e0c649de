//! JobQueue - per-channel FIFO of requested operations.
//!
//! The whole queue is one record in the store, keyed by channel. Every
//! mutation is applied to a copy, the copy is written while the lock is
//! held, and only a successful write replaces the in-memory map. Writers are
//! serialized and memory never runs ahead of the store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use relay_models::{Job, JobId, JobKind, JobStatus};
use relay_persistence::{load_typed, save_typed, KeyValueStore};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, WorkError};

/// Store key holding every channel's jobs.
pub const JOBS_KEY: &str = "jobs";

type JobMap = BTreeMap<String, Vec<Job>>;

/// Job counts for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl QueueSummary {
    fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Running => self.running += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
    }

    /// Count for a single status.
    pub fn count(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Running => self.running,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
            JobStatus::Cancelled => self.cancelled,
        }
    }

    /// Number of jobs across all statuses.
    pub fn total(&self) -> usize {
        JobStatus::ALL.iter().map(|s| self.count(*s)).sum()
    }
}

/// Persisted, per-channel job queue.
///
/// Pending jobs come back in insertion order. The queue hands out the oldest
/// pending job but does not claim it; callers move it to `Running` with
/// [`update_job_status`](Self::update_job_status). Nothing here stops two
/// jobs of the same channel from running at once.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use relay_models::{JobKind, JobStatus};
/// use relay_persistence::MemoryStore;
/// use relay_work::JobQueue;
///
/// let queue = JobQueue::new(Arc::new(MemoryStore::new())).unwrap();
/// let job = queue.add_job("general", JobKind::Prompt, "run the tests").unwrap();
///
/// let next = queue.get_next_job("general").unwrap().unwrap();
/// assert_eq!(next.id, job.id);
///
/// queue.update_job_status(&job.id, JobStatus::Running, None).unwrap();
/// queue.update_job_status(&job.id, JobStatus::Completed, None).unwrap();
/// assert!(queue.get_next_job("general").unwrap().is_none());
/// ```
pub struct JobQueue {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<JobMap>,
}

impl JobQueue {
    /// Loads the queue from `store`. A missing record means an empty queue.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let jobs: JobMap = load_typed(store.as_ref(), JOBS_KEY)?.unwrap_or_default();
        debug!(
            channels = jobs.len(),
            jobs = jobs.values().map(Vec::len).sum::<usize>(),
            "loaded job queue"
        );
        Ok(Self {
            store,
            state: Mutex::new(jobs),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, JobMap>> {
        self.state
            .lock()
            .map_err(|e| WorkError::LockPoisoned(e.to_string()))
    }

    /// Writes `next` and, once stored, makes it the live map.
    fn commit(&self, current: &mut JobMap, next: JobMap) -> Result<()> {
        save_typed(self.store.as_ref(), JOBS_KEY, &next)?;
        *current = next;
        Ok(())
    }

    /// Appends a new pending job to `channel_id`'s queue.
    pub fn add_job(
        &self,
        channel_id: &str,
        kind: JobKind,
        payload: impl Into<String>,
    ) -> Result<Job> {
        let job = Job::new(channel_id, kind, payload);

        let mut jobs = self.lock()?;
        let mut next = jobs.clone();
        next.entry(channel_id.to_string())
            .or_default()
            .push(job.clone());
        self.commit(&mut jobs, next)?;

        info!(job_id = %job.id, channel = %channel_id, kind = %kind, "job enqueued");
        Ok(job)
    }

    /// Returns the oldest pending job for `channel_id` without claiming it.
    pub fn get_next_job(&self, channel_id: &str) -> Result<Option<Job>> {
        let jobs = self.lock()?;
        Ok(jobs
            .get(channel_id)
            .and_then(|list| list.iter().find(|j| j.status == JobStatus::Pending))
            .cloned())
    }

    /// Moves a job to `status`, recording `error` on terminal statuses.
    ///
    /// Unknown IDs and undefined transitions leave the queue untouched and
    /// return `Ok(None)`.
    pub fn update_job_status(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<Option<Job>> {
        self.update_job_status_at(id, status, error, Utc::now())
    }

    fn update_job_status_at(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<Job>> {
        let mut jobs = self.lock()?;
        let mut next = jobs.clone();

        let Some(job) = next.values_mut().flatten().find(|j| &j.id == id) else {
            debug!(job_id = %id, "status update for unknown job ignored");
            return Ok(None);
        };

        let from = job.status;
        if !job.transition(status, error, now) {
            warn!(job_id = %id, from = %from, to = %status, "undefined job transition ignored");
            return Ok(None);
        }
        let updated = job.clone();

        self.commit(&mut jobs, next)?;
        debug!(job_id = %id, from = %from, to = %status, "job status updated");
        Ok(Some(updated))
    }

    /// Cancels a pending or running job.
    ///
    /// Cancellation is bookkeeping only; an in-flight sequence keeps going.
    pub fn cancel_job(&self, id: &JobId) -> Result<Option<Job>> {
        self.update_job_status(id, JobStatus::Cancelled, None)
    }

    /// Looks up a job by ID.
    pub fn get_job(&self, id: &JobId) -> Result<Option<Job>> {
        let jobs = self.lock()?;
        Ok(jobs.values().flatten().find(|j| &j.id == id).cloned())
    }

    /// All jobs for `channel_id`, oldest first.
    pub fn list_jobs(&self, channel_id: &str) -> Result<Vec<Job>> {
        let jobs = self.lock()?;
        Ok(jobs.get(channel_id).cloned().unwrap_or_default())
    }

    /// True if `channel_id` has a job in `Running`.
    pub fn has_running_job(&self, channel_id: &str) -> Result<bool> {
        let jobs = self.lock()?;
        Ok(jobs
            .get(channel_id)
            .is_some_and(|list| list.iter().any(|j| j.status == JobStatus::Running)))
    }

    /// Counts `channel_id`'s jobs per status.
    pub fn get_queue_summary(&self, channel_id: &str) -> Result<QueueSummary> {
        let jobs = self.lock()?;
        let mut summary = QueueSummary::default();
        for job in jobs.get(channel_id).into_iter().flatten() {
            summary.record(job.status);
        }
        Ok(summary)
    }

    /// Removes completed jobs that finished more than `age_hours` ago.
    ///
    /// Failed, cancelled, pending and running jobs are kept regardless of age.
    pub fn cleanup_completed_jobs(&self, age_hours: u32) -> Result<usize> {
        self.cleanup_completed_jobs_at(age_hours, Utc::now())
    }

    fn cleanup_completed_jobs_at(&self, age_hours: u32, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - Duration::hours(i64::from(age_hours));
        let mut jobs = self.lock()?;
        let mut next = jobs.clone();

        let mut removed = 0;
        for list in next.values_mut() {
            let before = list.len();
            list.retain(|job| {
                !(job.status == JobStatus::Completed
                    && job.completed_at.is_some_and(|at| at < cutoff))
            });
            removed += before - list.len();
        }
        next.retain(|_, list| !list.is_empty());

        if removed > 0 {
            self.commit(&mut jobs, next)?;
            info!(removed, age_hours, "cleaned up completed jobs");
        }
        Ok(removed)
    }
}
