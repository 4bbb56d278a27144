//! Provisioning service: ties a job in the ledger to one reconciliation run.

use std::io::Read;
use std::sync::Arc;

use serde::Serialize;

use iamdir_core::{Clock, DirectoryResult, JobId};
use iamdir_directory::Directory;

use crate::feed::{ColumnMapping, CsvFeed, FeedRecord, FeedTemplate, feed_template};
use crate::jobs::{JobLedger, JobRequest, JobStore, ProvisioningJob, Tally};
use crate::reconcile::{Mode, ReconcileAbort, ReconcileReport, Reconciler, RecordFailure};

/// Final job record plus the rows that failed.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job: ProvisioningJob,
    pub failures: Vec<RecordFailure>,
}

#[derive(Debug, Clone)]
pub struct ProvisioningService {
    directory: Arc<Directory>,
    ledger: JobLedger,
}

impl ProvisioningService {
    pub fn new(directory: Arc<Directory>, jobs: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory,
            ledger: JobLedger::new(jobs, clock),
        }
    }

    pub fn ledger(&self) -> &JobLedger {
        &self.ledger
    }

    pub fn create_job(&self, request: JobRequest) -> DirectoryResult<ProvisioningJob> {
        self.ledger.create_job(request)
    }

    /// Runs a CSV source against the directory under a pending job.
    ///
    /// Feed and store failures end up on the job (status Failed with an
    /// error message); `Err` is returned only for ledger problems such as an
    /// unknown or already started job.
    pub fn execute_job<R: Read>(
        &self,
        job_id: JobId,
        source: R,
        mapping: &ColumnMapping,
        dry_run: bool,
    ) -> DirectoryResult<JobOutcome> {
        self.begin(job_id, dry_run)?;

        let feed = match CsvFeed::open(source, mapping) {
            Ok(feed) => feed,
            Err(err) => {
                let job = self.ledger.fail(job_id, &err.to_string(), Tally::default())?;
                return Ok(JobOutcome {
                    job,
                    failures: Vec::new(),
                });
            }
        };

        self.finish(job_id, Reconciler::new(&self.directory, Mode::from_dry_run(dry_run)).run(feed))
    }

    /// Runs already structured records (REST-sourced jobs).
    pub fn execute_records(
        &self,
        job_id: JobId,
        records: Vec<FeedRecord>,
        dry_run: bool,
    ) -> DirectoryResult<JobOutcome> {
        self.begin(job_id, dry_run)?;
        let run = Reconciler::new(&self.directory, Mode::from_dry_run(dry_run))
            .run(records.into_iter().map(Ok));
        self.finish(job_id, run)
    }

    pub fn history(&self) -> DirectoryResult<Vec<ProvisioningJob>> {
        self.ledger.history()
    }

    pub fn get_job(&self, job_id: JobId) -> DirectoryResult<ProvisioningJob> {
        self.ledger.get_by_id(job_id)
    }

    pub fn feed_template(&self) -> FeedTemplate {
        feed_template()
    }

    fn begin(&self, job_id: JobId, dry_run: bool) -> DirectoryResult<()> {
        self.ledger.set_dry_run(job_id, dry_run)?;
        self.ledger.start(job_id)?;
        Ok(())
    }

    fn finish(
        &self,
        job_id: JobId,
        run: Result<ReconcileReport, ReconcileAbort>,
    ) -> DirectoryResult<JobOutcome> {
        match run {
            Ok(report) => Ok(JobOutcome {
                job: self.ledger.complete(job_id, report.tally)?,
                failures: report.failures,
            }),
            Err(abort) => Ok(JobOutcome {
                job: self.ledger.fail(job_id, &abort.error, abort.report.tally)?,
                failures: abort.report.failures,
            }),
        }
    }
}
