//! Job Ledger: the only writer of provisioning job state.

use std::sync::Arc;

use iamdir_core::{Clock, DirectoryError, DirectoryResult, JobId};

use super::store::JobStore;
use super::types::{JobRequest, ProvisioningJob, Tally};

#[derive(Clone)]
pub struct JobLedger {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for JobLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobLedger").finish_non_exhaustive()
    }
}

impl JobLedger {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn create_job(&self, request: JobRequest) -> DirectoryResult<ProvisioningJob> {
        let job = ProvisioningJob::new(request, self.clock.now());
        self.store.insert(&job)?;
        tracing::info!(job_id = %job.id, job_name = %job.job_name, source = ?job.source_kind, "provisioning job created");
        Ok(job)
    }

    pub fn set_dry_run(&self, id: JobId, dry_run: bool) -> DirectoryResult<ProvisioningJob> {
        self.transition(id, |job| job.set_dry_run(dry_run))
    }

    /// Pending -> Running.
    pub fn start(&self, id: JobId) -> DirectoryResult<ProvisioningJob> {
        let now = self.clock.now();
        let job = self.transition(id, |job| job.mark_running(now))?;
        tracing::info!(job_id = %id, dry_run = job.dry_run, "provisioning job started");
        Ok(job)
    }

    /// Running -> Completed.
    pub fn complete(&self, id: JobId, tally: Tally) -> DirectoryResult<ProvisioningJob> {
        let now = self.clock.now();
        let job = self.transition(id, |job| job.mark_completed(tally, now))?;
        tracing::info!(
            job_id = %id,
            total = tally.total_processed,
            created = tally.created,
            updated = tally.updated,
            deactivated = tally.deactivated,
            failed = tally.failed,
            "provisioning job completed"
        );
        Ok(job)
    }

    /// Pending/Running -> Failed.
    pub fn fail(&self, id: JobId, message: &str, tally: Tally) -> DirectoryResult<ProvisioningJob> {
        let now = self.clock.now();
        let job = self.transition(id, |job| job.mark_failed(message, tally, now))?;
        tracing::error!(job_id = %id, error = %message, total = tally.total_processed, "provisioning job failed");
        Ok(job)
    }

    /// All jobs, newest first.
    pub fn history(&self) -> DirectoryResult<Vec<ProvisioningJob>> {
        let mut jobs = self.store.list()?;
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(jobs)
    }

    pub fn get_by_id(&self, id: JobId) -> DirectoryResult<ProvisioningJob> {
        self.store
            .get(id)?
            .ok_or_else(|| DirectoryError::not_found("job", id))
    }

    /// Checks and applies a state change atomically in the store.
    fn transition(
        &self,
        id: JobId,
        mut apply: impl FnMut(&mut ProvisioningJob) -> DirectoryResult<()>,
    ) -> DirectoryResult<ProvisioningJob> {
        Ok(self.store.update_with(id, &mut apply)?)
    }
}
