//! Bulk provisioning: job ledger, tabular feeds and reconciliation against
//! the directory.

pub mod feed;
pub mod jobs;
pub mod reconcile;
pub mod service;

pub use feed::{
    Candidate, ColumnMapping, CsvFeed, FeedError, FeedField, FeedRecord, FeedTemplate,
    feed_template, parse_active,
};
pub use jobs::{
    InMemoryJobStore, JobLedger, JobRequest, JobStatus, JobStore, JobStoreError, ProvisioningJob,
    SourceKind, Tally,
};
pub use reconcile::{Mode, ReconcileAbort, ReconcileReport, Reconciler, RecordFailure};
pub use service::{JobOutcome, ProvisioningService};
