//! Job storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use iamdir_core::{DirectoryError, DirectoryResult, JobId};

use super::types::ProvisioningJob;

/// Job store abstraction.
pub trait JobStore: Send + Sync {
    /// Persist a new job.
    fn insert(&self, job: &ProvisioningJob) -> Result<(), JobStoreError>;

    fn get(&self, job_id: JobId) -> Result<Option<ProvisioningJob>, JobStoreError>;

    /// Read-modify-write of one job under the store's write lock.
    ///
    /// When `change` returns `Err` nothing is written and the error comes back
    /// as `JobStoreError::Rejected`.
    fn update_with(
        &self,
        job_id: JobId,
        change: &mut dyn FnMut(&mut ProvisioningJob) -> DirectoryResult<()>,
    ) -> Result<ProvisioningJob, JobStoreError>;

    /// Every job, in no particular order.
    fn list(&self) -> Result<Vec<ProvisioningJob>, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Rejected(DirectoryError),
}

impl From<JobStoreError> for DirectoryError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(id) => DirectoryError::not_found("job", id),
            JobStoreError::AlreadyExists(id) => DirectoryError::duplicate("job", "id", id.to_string()),
            JobStoreError::Storage(msg) => DirectoryError::store(msg),
            JobStoreError::Rejected(err) => err,
        }
    }
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, ProvisioningJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn poisoned<T>(_: T) -> JobStoreError {
    JobStoreError::Storage("lock poisoned".to_string())
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: &ProvisioningJob) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn get(&self, job_id: JobId) -> Result<Option<ProvisioningJob>, JobStoreError> {
        Ok(self.jobs.read().map_err(poisoned)?.get(&job_id).cloned())
    }

    fn update_with(
        &self,
        job_id: JobId,
        change: &mut dyn FnMut(&mut ProvisioningJob) -> DirectoryResult<()>,
    ) -> Result<ProvisioningJob, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        let mut job = jobs
            .get(&job_id)
            .cloned()
            .ok_or(JobStoreError::NotFound(job_id))?;
        change(&mut job).map_err(JobStoreError::Rejected)?;
        jobs.insert(job_id, job.clone());
        Ok(job)
    }

    fn list(&self) -> Result<Vec<ProvisioningJob>, JobStoreError> {
        Ok(self.jobs.read().map_err(poisoned)?.values().cloned().collect())
    }
}
