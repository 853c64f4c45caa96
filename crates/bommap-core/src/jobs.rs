//! Processing-job lifecycle over the record store.

use std::sync::Arc;

use chrono::Duration;

use bommap_model::{BlobRef, JobId, JobStatus, ProcessingJob, Session, SessionStatus};
use bommap_store::{Clock, RecordStore};

use crate::error::{EngineError, Entity, Result};
use crate::sessions::{deserialize, serialize};

pub(crate) const JOBS_TABLE: &str = "processing_jobs";

const JOB_TTL_HOURS: i64 = 24;

/// Owns processing-job persistence and the one-way job state machine.
///
/// Job creation returns immediately with a `queued` job; a worker later
/// drives `processing → completed | failed`. A job failure never touches
/// the parent session. Cancellation is simply never picking a queued job
/// up, or deleting it before pickup.
pub struct JobManager {
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl JobManager {
    pub fn new(records: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records,
            clock,
            ttl: Duration::hours(JOB_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Creates a queued job for a session. The session must have reached
    /// `mapped`; there is nothing to process before that.
    pub fn create(&self, session: &Session) -> Result<ProcessingJob> {
        if session.status < SessionStatus::Mapped {
            return Err(EngineError::State {
                entity: Entity::Job,
                id: session.session_id.as_str().to_string(),
                detail: format!(
                    "cannot create job for session in status {}",
                    session.status
                ),
            });
        }
        let now = self.clock.now();
        let job = ProcessingJob {
            job_id: JobId::generate(),
            session_id: session.session_id.clone(),
            status: JobStatus::Queued,
            progress: 0,
            error_message: None,
            result: None,
            created_at: now,
            updated_at: now,
            expires_at: now + self.ttl,
        };
        self.persist(&job)?;
        tracing::info!(job_id = %job.job_id, session_id = %session.session_id, "queued job");
        Ok(job)
    }

    /// Loads a job, treating expiry as absence.
    pub fn get(&self, job_id: &JobId) -> Result<ProcessingJob> {
        let record = self
            .records
            .get(JOBS_TABLE, job_id.as_str())?
            .ok_or_else(|| EngineError::not_found(Entity::Job, job_id))?;
        let job: ProcessingJob = deserialize(JOBS_TABLE, job_id.as_str(), &record)?;
        if job.is_expired(self.clock.now()) {
            return Err(EngineError::not_found(Entity::Job, job_id));
        }
        Ok(job)
    }

    /// Worker pickup: `queued → processing`.
    pub fn start(&self, job_id: &JobId) -> Result<ProcessingJob> {
        self.transition(job_id, JobStatus::Processing, |_| {})
    }

    /// Records progress on a processing job. Updates are clamped monotonic;
    /// reporting progress on a job that is not processing is a state error.
    pub fn record_progress(&self, job_id: &JobId, progress: u8) -> Result<ProcessingJob> {
        let mut job = self.get(job_id)?;
        if job.status != JobStatus::Processing {
            return Err(EngineError::State {
                entity: Entity::Job,
                id: job_id.as_str().to_string(),
                detail: format!("cannot record progress while {}", job.status),
            });
        }
        job.record_progress(progress);
        self.touch_and_persist(&mut job)?;
        Ok(job)
    }

    /// `processing → completed`, with the export's blob locator.
    pub fn complete(&self, job_id: &JobId, result: BlobRef) -> Result<ProcessingJob> {
        self.transition(job_id, JobStatus::Completed, |job| {
            job.result = Some(result);
            job.record_progress(100);
        })
    }

    /// `processing → failed`. Stores a human-readable reason and leaves the
    /// parent session exactly as it was.
    pub fn fail(&self, job_id: &JobId, message: impl Into<String>) -> Result<ProcessingJob> {
        let message = message.into();
        self.transition(job_id, JobStatus::Failed, move |job| {
            job.error_message = Some(message);
        })
    }

    pub fn delete(&self, job_id: &JobId) -> Result<bool> {
        Ok(self.records.delete(JOBS_TABLE, job_id.as_str())?)
    }

    fn transition(
        &self,
        job_id: &JobId,
        next: JobStatus,
        apply: impl FnOnce(&mut ProcessingJob),
    ) -> Result<ProcessingJob> {
        let mut job = self.get(job_id)?;
        job.transition(next).map_err(|error| EngineError::State {
            entity: Entity::Job,
            id: job_id.as_str().to_string(),
            detail: error.to_string(),
        })?;
        apply(&mut job);
        self.touch_and_persist(&mut job)?;
        tracing::info!(job_id = %job_id, status = %job.status, "job transition");
        Ok(job)
    }

    fn touch_and_persist(&self, job: &mut ProcessingJob) -> Result<()> {
        job.updated_at = self.clock.now();
        self.persist(job)
    }

    fn persist(&self, job: &ProcessingJob) -> Result<()> {
        let record =
            serialize(JOBS_TABLE, job.job_id.as_str(), job)?.with_expiry(job.expires_at);
        self.records.put(JOBS_TABLE, job.job_id.as_str(), record)?;
        Ok(())
    }
}
