//! One import run and its lifecycle.
//!
//! `pending → in_progress → {completed | failed | cancelled}`. Terminal states
//! are final; running the same import again creates a new job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::connection::ImportConnection;
use super::platform::Platform;
use crate::import::{ImportConfig, ImportError, ImportProgress, ImportResult};

/// Status of an import job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Illegal job transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Job {id} already finished with status {status}")]
    AlreadyFinished { id: Uuid, status: JobStatus },

    #[error("Job {id} has not been started")]
    NotStarted { id: Uuid },

    #[error("Job {id} is already in progress")]
    AlreadyStarted { id: Uuid },
}

/// A single import run against one connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub connection_id: Uuid,
    pub platform: Platform,
    pub status: JobStatus,
    pub config: ImportConfig,
    pub progress: ImportProgress,
    pub result: Option<ImportResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ImportJob {
    /// Create a pending job for `connection`.
    pub fn new(workspace_id: Uuid, connection: &ImportConnection, config: ImportConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            connection_id: connection.id,
            platform: connection.platform,
            status: JobStatus::Pending,
            config,
            progress: ImportProgress::default(),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    fn ensure_not_finished(&self) -> Result<(), JobError> {
        if self.status.is_terminal() {
            return Err(JobError::AlreadyFinished {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), JobError> {
        self.ensure_not_finished()?;
        if self.status == JobStatus::Pending {
            return Err(JobError::NotStarted { id: self.id });
        }
        Ok(())
    }

    /// `pending → in_progress`.
    pub fn start(&mut self) -> Result<(), JobError> {
        self.ensure_not_finished()?;
        if self.status == JobStatus::InProgress {
            return Err(JobError::AlreadyStarted { id: self.id });
        }
        self.status = JobStatus::InProgress;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Replace the progress snapshot of a running job.
    pub fn update_progress(&mut self, progress: ImportProgress) -> Result<(), JobError> {
        self.ensure_running()?;
        self.progress = progress;
        Ok(())
    }

    /// Record the outcome of the run.
    ///
    /// Cancellation ends the job `cancelled`; any other error ends it
    /// `failed` with the error message.
    pub fn finish(&mut self, outcome: Result<&ImportResult, &ImportError>) -> Result<(), JobError> {
        self.ensure_running()?;
        match outcome {
            Ok(result) => {
                self.status = JobStatus::Completed;
                self.result = Some(result.clone());
            }
            Err(e) => {
                self.status = if e.is_cancelled() {
                    JobStatus::Cancelled
                } else {
                    JobStatus::Failed
                };
                self.error = Some(e.to_string());
            }
        }
        self.finished_at = Some(Utc::now());
        tracing::info!(job_id = %self.id, status = %self.status, "Import job finished");
        Ok(())
    }

    /// A fresh pending job for the same connection and configuration.
    #[must_use]
    pub fn rerun(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id: self.workspace_id,
            connection_id: self.connection_id,
            platform: self.platform,
            status: JobStatus::Pending,
            config: self.config.clone(),
            progress: ImportProgress::default(),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ImportJob {
        let conn = ImportConnection::new(Platform::Slack, "xoxb-token");
        ImportJob::new(Uuid::new_v4(), &conn, ImportConfig::default())
    }

    #[test]
    fn test_happy_path() {
        let mut job = job();
        assert_eq!(job.status, JobStatus::Pending);

        job.start().expect("start");
        assert_eq!(job.status, JobStatus::InProgress);
        assert!(job.started_at.is_some());

        let progress = ImportProgress {
            items_imported: 1,
            ..Default::default()
        };
        job.update_progress(progress.clone()).expect("progress");
        assert_eq!(job.progress, progress);

        let result = ImportResult {
            messages_created: 3,
            ..Default::default()
        };
        job.finish(Ok(&result)).expect("finish");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.as_ref().map(|r| r.messages_created), Some(3));
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_cancellation_is_distinguished_from_failure() {
        let mut cancelled = job();
        cancelled.start().expect("start");
        cancelled.finish(Err(&ImportError::Cancelled)).expect("finish");
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        let mut failed = job();
        failed.start().expect("start");
        failed
            .finish(Err(&ImportError::TimedOut(std::time::Duration::from_secs(1))))
            .expect("finish");
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.error.as_deref().is_some_and(|e| e.contains("time limit")));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = job();
        job.start().expect("start");
        job.finish(Ok(&ImportResult::default())).expect("finish");

        let err = job.start().expect_err("restart must fail");
        assert_eq!(
            err,
            JobError::AlreadyFinished {
                id: job.id,
                status: JobStatus::Completed
            }
        );
        assert!(job.finish(Err(&ImportError::Cancelled)).is_err());
        assert!(job.update_progress(ImportProgress::default()).is_err());
    }

    #[test]
    fn test_illegal_transitions_from_pending_and_running() {
        let mut job = job();
        assert_eq!(
            job.finish(Ok(&ImportResult::default())),
            Err(JobError::NotStarted { id: job.id })
        );

        job.start().expect("start");
        assert_eq!(job.start(), Err(JobError::AlreadyStarted { id: job.id }));
    }

    #[test]
    fn test_rerun_creates_new_pending_job() {
        let mut job = job();
        job.start().expect("start");
        job.finish(Err(&ImportError::Cancelled)).expect("finish");

        let next = job.rerun();
        assert_ne!(next.id, job.id);
        assert_eq!(next.connection_id, job.connection_id);
        assert_eq!(next.config, job.config);
        assert_eq!(next.status, JobStatus::Pending);
        assert_eq!(job.status, JobStatus::Cancelled);
    }
}
