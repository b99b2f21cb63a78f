//! Concurrency-safe registry of jobs.
//!
//! The store is the only owner of [`Job`] records. Everything else goes
//! through its methods, which each take the lock once, validate the
//! transition, and write status and payload together, so a reader can never
//! observe `COMPLETED` without the result or `FAILED` without the error.
//!
//! Critical sections are map lookups and field writes only. Callers must not
//! hold anything from the store across I/O; snapshots are returned by value.

use super::types::{Job, JobId, JobStatus};
use crate::imaging::ImageBuffer;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(JobId),
    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Records are never left half-written, so a poisoned lock is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Job>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Job>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new PENDING job and return its id.
    pub fn create(&self, source_url: impl Into<String>) -> JobId {
        let mut jobs = self.write();
        let mut id = JobId::new();
        while jobs.contains_key(&id) {
            id = JobId::new();
        }
        jobs.insert(id, Job::new(id, source_url.into()));
        id
    }

    /// Move a job to a non-terminal `status`.
    ///
    /// Only the PENDING → PROCESSING claim can go through here; terminal
    /// states carry a payload and must use [`complete`](Self::complete) or
    /// [`fail`](Self::fail).
    pub fn update_status(&self, id: JobId, status: JobStatus) -> Result<(), StoreError> {
        let mut jobs = self.write();
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if status.is_terminal() || !job.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                id,
                from: job.status,
                to: status,
            });
        }
        job.status = status;
        if status == JobStatus::Processing {
            job.started_at = Some(SystemTime::now());
        }
        Ok(())
    }

    /// Claim a PENDING job for a worker.
    pub fn mark_processing(&self, id: JobId) -> Result<(), StoreError> {
        self.update_status(id, JobStatus::Processing)
    }

    /// Record a successful result. PROCESSING → COMPLETED.
    pub fn complete(&self, id: JobId, result: ImageBuffer) -> Result<(), StoreError> {
        self.finish(id, JobStatus::Completed, |job| job.result = Some(result))
    }

    /// Record a failure. PROCESSING → FAILED.
    pub fn fail(&self, id: JobId, error: impl Into<String>) -> Result<(), StoreError> {
        let error = error.into();
        self.finish(id, JobStatus::Failed, |job| job.error = Some(error))
    }

    fn finish(
        &self,
        id: JobId,
        status: JobStatus,
        set_payload: impl FnOnce(&mut Job),
    ) -> Result<(), StoreError> {
        let mut jobs = self.write();
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !job.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                id,
                from: job.status,
                to: status,
            });
        }
        set_payload(job);
        job.status = status;
        job.finished_at = Some(SystemTime::now());
        Ok(())
    }

    /// Snapshot of a job.
    pub fn get(&self, id: JobId) -> Option<Job> {
        self.read().get(&id).cloned()
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.read().get(&id).map(|job| job.status)
    }

    pub fn list_ids(&self) -> HashSet<JobId> {
        self.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Number of jobs currently in each status.
    pub fn count_by_status(&self) -> HashMap<JobStatus, usize> {
        let mut counts = HashMap::new();
        for job in self.read().values() {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        counts
    }
}
