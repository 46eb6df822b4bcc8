//! Generation job lifecycle.
//!
//! A [`Job`] tracks one prompt from submission to a terminal state. All
//! state changes go through the transition methods, which reject moves the
//! lifecycle does not allow:
//!
//! ```text
//! Pending ──► InProgress ──► Completed
//!    │             ├───────► Failed
//!    │             └───────► TimedOut
//!    └──────► Failed
//! ```

use std::fmt;

use serde::Serialize;

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut
        )
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::InProgress)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::InProgress, JobStatus::Completed)
                | (JobStatus::InProgress, JobStatus::Failed)
                | (JobStatus::InProgress, JobStatus::TimedOut)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// In-memory record of one generation request.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: uuid::Uuid,
    pub prompt: String,
    request_id: Option<String>,
    status: JobStatus,
    pub created_at: Timestamp,
    result: Option<Vec<String>>,
    error: Option<String>,
}

impl Job {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            prompt: prompt.into(),
            request_id: None,
            status: JobStatus::Pending,
            created_at: chrono::Utc::now(),
            result: None,
            error: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn result(&self) -> Option<&[String]> {
        self.result.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Pending -> InProgress.
    pub fn start(&mut self) -> Result<(), CoreError> {
        self.transition(JobStatus::InProgress)
    }

    /// Record the upstream request id. It may be set exactly once, and only
    /// while the job is running.
    pub fn assign_request_id(&mut self, request_id: impl Into<String>) -> Result<(), CoreError> {
        if self.status != JobStatus::InProgress {
            return Err(CoreError::Internal(format!(
                "cannot assign request id to a {} job",
                self.status
            )));
        }
        if let Some(existing) = &self.request_id {
            return Err(CoreError::Internal(format!(
                "job {} already has request id {existing}",
                self.id
            )));
        }
        self.request_id = Some(request_id.into());
        Ok(())
    }

    /// InProgress -> Completed, storing the asset URLs in upstream order.
    pub fn complete(&mut self, urls: Vec<String>) -> Result<(), CoreError> {
        self.transition(JobStatus::Completed)?;
        self.result = Some(urls);
        Ok(())
    }

    /// Pending | InProgress -> Failed.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), CoreError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }

    /// InProgress -> TimedOut.
    pub fn time_out(&mut self) -> Result<(), CoreError> {
        self.transition(JobStatus::TimedOut)
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
