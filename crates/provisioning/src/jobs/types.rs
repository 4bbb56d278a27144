//! Provisioning job record and its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use iamdir_core::{DirectoryError, DirectoryResult, JobId};

/// Where a job's records come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Header-driven tabular feed.
    Csv,
    /// Structured records pushed by a caller.
    Rest,
}

/// Job execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet started
    Pending,
    /// Records are being reconciled
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Per-job reconciliation counters.
///
/// Every record bumps `total_processed` and exactly one of `created`,
/// `updated` or `failed`; `deactivated` is a subset of `updated`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub total_processed: u64,
    #[serde(rename = "createdCount")]
    pub created: u64,
    #[serde(rename = "updatedCount")]
    pub updated: u64,
    #[serde(rename = "deactivatedCount")]
    pub deactivated: u64,
    #[serde(rename = "failedCount")]
    pub failed: u64,
}

impl Tally {
    pub fn record_created(&mut self) {
        self.total_processed += 1;
        self.created += 1;
    }

    pub fn record_updated(&mut self, deactivated: bool) {
        self.total_processed += 1;
        self.updated += 1;
        if deactivated {
            self.deactivated += 1;
        }
    }

    pub fn record_failed(&mut self) {
        self.total_processed += 1;
        self.failed += 1;
    }
}

/// Metadata supplied when a job is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub job_name: String,
    pub source_kind: SourceKind,
    pub source_location: String,
    pub triggered_by: String,
}

impl JobRequest {
    pub fn new(
        job_name: impl Into<String>,
        source_kind: SourceKind,
        source_location: impl Into<String>,
        triggered_by: impl Into<String>,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            source_kind,
            source_location: source_location.into(),
            triggered_by: triggered_by.into(),
        }
    }
}

/// A provisioning run.
///
/// Status only moves forward: Pending -> Running -> Completed | Failed, or
/// straight from Pending to Failed. Terminal jobs are never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningJob {
    pub id: JobId,
    pub job_name: String,
    pub source_kind: SourceKind,
    pub source_location: String,
    pub dry_run: bool,
    pub status: JobStatus,
    #[serde(flatten)]
    pub tally: Tally,
    pub error_message: Option<String>,
    pub triggered_by: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProvisioningJob {
    pub fn new(request: JobRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            job_name: request.job_name,
            source_kind: request.source_kind,
            source_location: request.source_location,
            dry_run: false,
            status: JobStatus::Pending,
            tally: Tally::default(),
            error_message: None,
            triggered_by: request.triggered_by,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Choose simulation or commit mode. Only allowed before the job starts.
    pub fn set_dry_run(&mut self, dry_run: bool) -> DirectoryResult<()> {
        self.require(JobStatus::Pending, "configure")?;
        self.dry_run = dry_run;
        Ok(())
    }

    /// Mark job as running.
    pub fn mark_running(&mut self, now: DateTime<Utc>) -> DirectoryResult<()> {
        self.require(JobStatus::Pending, "start")?;
        self.status = JobStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// Mark job as completed with its final counters.
    pub fn mark_completed(&mut self, tally: Tally, now: DateTime<Utc>) -> DirectoryResult<()> {
        self.require(JobStatus::Running, "complete")?;
        self.status = JobStatus::Completed;
        self.tally = tally;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Mark job as failed, keeping whatever was tallied before the failure.
    pub fn mark_failed(
        &mut self,
        error: impl Into<String>,
        tally: Tally,
        now: DateTime<Utc>,
    ) -> DirectoryResult<()> {
        if self.status.is_terminal() {
            return Err(self.transition_error("fail"));
        }
        self.status = JobStatus::Failed;
        self.tally = tally;
        self.error_message = Some(error.into());
        self.completed_at = Some(now);
        Ok(())
    }

    fn require(&self, expected: JobStatus, action: &str) -> DirectoryResult<()> {
        if self.status != expected {
            return Err(self.transition_error(action));
        }
        Ok(())
    }

    fn transition_error(&self, action: &str) -> DirectoryError {
        DirectoryError::transition(format!(
            "cannot {action} job {} in status {:?}",
            self.id, self.status
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ProvisioningJob {
        ProvisioningJob::new(
            JobRequest::new("nightly", SourceKind::Csv, "feed.csv", "ops"),
            Utc::now(),
        )
    }

    #[test]
    fn job_lifecycle() {
        let mut job = job();
        assert_eq!(job.status, JobStatus::Pending);

        let started = Utc::now();
        job.mark_running(started).unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.started_at, Some(started));

        let mut tally = Tally::default();
        tally.record_created();
        job.mark_completed(tally, Utc::now()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.tally.created, 1);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn terminal_jobs_are_frozen() {
        let mut job = job();
        job.mark_running(Utc::now()).unwrap();
        job.mark_failed("boom", Tally::default(), Utc::now()).unwrap();

        assert!(job.mark_running(Utc::now()).is_err());
        assert!(job.mark_completed(Tally::default(), Utc::now()).is_err());
        assert!(job.mark_failed("again", Tally::default(), Utc::now()).is_err());
        assert!(job.set_dry_run(true).is_err());
        assert_eq!(job.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn cannot_complete_before_start_or_start_twice() {
        let mut job = job();
        assert!(matches!(
            job.mark_completed(Tally::default(), Utc::now()),
            Err(DirectoryError::InvalidTransition(_))
        ));
        job.mark_running(Utc::now()).unwrap();
        assert!(job.mark_running(Utc::now()).is_err());
    }

    #[test]
    fn pending_job_can_fail_directly() {
        let mut job = job();
        job.mark_failed("unreadable", Tally::default(), Utc::now())
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.started_at, None);
    }

    #[test]
    fn serialized_counters_use_count_suffix() {
        let mut job = job();
        job.tally.record_updated(true);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["totalProcessed"], 1);
        assert_eq!(json["updatedCount"], 1);
        assert_eq!(json["deactivatedCount"], 1);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["sourceKind"], "csv");
    }
}
