//! Provisioning job tracking.
//!
//! ## Components
//!
//! - `ProvisioningJob`: job record, status lifecycle and counters
//! - `JobStore`: persistence for jobs (in-memory or durable)
//! - `JobLedger`: clock-stamped lifecycle transitions and history

pub mod ledger;
pub mod store;
pub mod types;

pub use ledger::JobLedger;
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
pub use types::{JobRequest, JobStatus, ProvisioningJob, SourceKind, Tally};
