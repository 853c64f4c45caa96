use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BlobRef, JobId, ModelError, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One asynchronous transform/export run. References its session by id only;
/// the session's lifecycle is never driven from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub job_id: JobId,
    pub session_id: SessionId,
    pub status: JobStatus,
    /// 0-100, monotonically non-decreasing while `processing`.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BlobRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ProcessingJob {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn transition(&mut self, next: JobStatus) -> Result<(), ModelError> {
        if !self.status.can_transition_to(next) {
            return Err(ModelError::InvalidJobTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Progress only moves forward; a stale worker update is clamped rather
    /// than rewinding what the caller already saw.
    pub fn record_progress(&mut self, progress: u8) {
        let progress = progress.min(100);
        if progress > self.progress {
            self.progress = progress;
        }
    }
}
