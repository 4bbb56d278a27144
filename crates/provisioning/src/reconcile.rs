//! Reconciliation Engine.
//!
//! Pulls candidate records one at a time, looks each up by login name and
//! decides create or update. A bad record is tallied as failed and the batch
//! moves on; only an unreadable source or an unavailable store stops it.
//!
//! A dry run keeps an overlay of the rows it would have applied, so later rows
//! in the same feed are classified exactly as a commit run would classify them.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use iamdir_core::DirectoryError;
use iamdir_directory::Directory;

use crate::feed::{FeedError, FeedRecord};
use crate::jobs::Tally;

/// Commit applies changes; dry run only classifies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Commit,
    DryRun,
}

impl Mode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Mode::DryRun } else { Mode::Commit }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFailure {
    pub line: u64,
    pub login_name: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub tally: Tally,
    pub failures: Vec<RecordFailure>,
}

impl ReconcileReport {
    fn fail(&mut self, line: u64, login_name: Option<String>, reason: String) {
        tracing::warn!(line, login_name = ?login_name, reason = %reason, "provisioning record failed");
        self.tally.record_failed();
        self.failures.push(RecordFailure {
            line,
            login_name,
            reason,
        });
    }
}

/// The batch stopped early. `report` holds everything tallied so far.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("reconciliation aborted: {error}")]
pub struct ReconcileAbort {
    pub report: ReconcileReport,
    pub error: String,
}

/// What a dry run would have written for one login name.
#[derive(Debug, Clone)]
struct Simulated {
    email: String,
    active: bool,
}

/// Dry-run view of the directory: the store plus the rows applied so far.
#[derive(Debug, Default)]
struct Overlay {
    applied: BTreeMap<String, Simulated>,
}

impl Overlay {
    /// Login name that owns `email` after the simulated writes.
    fn email_owner(&self, directory: &Directory, email: &str) -> Result<Option<String>, String> {
        if let Some((login, _)) = self.applied.iter().find(|(_, user)| user.email == email) {
            return Ok(Some(login.clone()));
        }
        let stored = directory.find_user_by_email(email).map_err(|err| err.to_string())?;
        // A stored owner the run has already moved to another email no longer owns it.
        Ok(stored
            .map(|user| user.login_name)
            .filter(|login| !self.applied.contains_key(login)))
    }
}

#[derive(Debug)]
pub struct Reconciler<'a> {
    directory: &'a Directory,
    mode: Mode,
}

impl<'a> Reconciler<'a> {
    pub fn new(directory: &'a Directory, mode: Mode) -> Self {
        Self { directory, mode }
    }

    /// Records are processed strictly in order.
    pub fn run<I>(&self, records: I) -> Result<ReconcileReport, ReconcileAbort>
    where
        I: IntoIterator<Item = Result<FeedRecord, FeedError>>,
    {
        let mut report = ReconcileReport::default();
        let mut overlay = Overlay::default();

        for item in records {
            let record = match item {
                Ok(record) => record,
                Err(err) if err.is_fatal() => {
                    return Err(ReconcileAbort {
                        report,
                        error: err.to_string(),
                    });
                }
                Err(err) => {
                    let line = match &err {
                        FeedError::MalformedRow { line, .. } => *line,
                        FeedError::Unreadable(_) => 0,
                    };
                    report.fail(line, None, err.to_string());
                    continue;
                }
            };

            if let Err(error) = self.apply(&record, &mut report, &mut overlay) {
                return Err(ReconcileAbort { report, error });
            }
        }

        Ok(report)
    }

    /// Handles one record. `Err` carries a batch-fatal store failure.
    fn apply(
        &self,
        record: &FeedRecord,
        report: &mut ReconcileReport,
        overlay: &mut Overlay,
    ) -> Result<(), String> {
        let candidate = match record.validate() {
            Ok(candidate) => candidate,
            Err(err) => {
                report.fail(record.line, record.login_name.clone(), err.to_string());
                return Ok(());
            }
        };

        let stored = self
            .directory
            .find_user_by_login_name(&candidate.login_name)
            .map_err(|err| err.to_string())?;
        // Active flag of the existing user, if any, as this run currently sees it.
        let current = match overlay.applied.get(&candidate.login_name) {
            Some(simulated) => Some(simulated.active),
            None => stored.as_ref().map(|user| user.active),
        };
        let deactivates = current.is_some_and(|active| active && !candidate.active);

        match self.mode {
            Mode::Commit => {
                let result = self.directory.upsert_by_login_name(
                    &candidate.login_name,
                    &candidate.email,
                    &candidate.first_name,
                    &candidate.last_name,
                    candidate.active,
                );
                match result {
                    Ok(_) => {}
                    Err(err) if err.is_infrastructure() => return Err(err.to_string()),
                    Err(err) => {
                        report.fail(record.line, Some(candidate.login_name), err.to_string());
                        return Ok(());
                    }
                }
            }
            Mode::DryRun => {
                let owner = overlay.email_owner(self.directory, &candidate.email)?;
                if owner.is_some_and(|login| login != candidate.login_name) {
                    let err = DirectoryError::duplicate("user", "email", candidate.email.clone());
                    report.fail(record.line, Some(candidate.login_name), err.to_string());
                    return Ok(());
                }
                overlay.applied.insert(
                    candidate.login_name.clone(),
                    Simulated {
                        email: candidate.email.clone(),
                        active: candidate.active,
                    },
                );
            }
        }

        if current.is_some() {
            report.tally.record_updated(deactivates);
        } else {
            report.tally.record_created();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use iamdir_directory::{Argon2SecretHasher, InMemoryDirectoryStore, NewUser, UserPatch};

    use super::*;

    fn directory() -> Directory {
        Directory::new(
            Arc::new(InMemoryDirectoryStore::new()),
            Arc::new(Argon2SecretHasher::with_params(8, 1, 1).unwrap()),
            Arc::new(iamdir_core::SystemClock),
            Default::default(),
        )
    }

    fn record(line: u64, login: &str, email: &str, active: Option<&str>) -> Result<FeedRecord, FeedError> {
        Ok(FeedRecord {
            line,
            login_name: Some(login.to_string()),
            email: (!email.is_empty()).then(|| email.to_string()),
            first_name: Some("F".to_string()),
            last_name: Some("L".to_string()),
            active: active.map(str::to_string),
        })
    }

    #[test]
    fn dry_run_leaves_directory_untouched() {
        let dir = directory();
        let report = Reconciler::new(&dir, Mode::DryRun)
            .run(vec![record(2, "a", "a@x.com", None)])
            .unwrap();
        assert_eq!(report.tally.created, 1);
        assert!(dir.find_user_by_login_name("a").unwrap().is_none());
    }

    #[test]
    fn deactivation_is_counted_as_update() {
        let dir = directory();
        dir.create_user(NewUser::new("a", "a@x.com", "pw", "F", "L"))
            .unwrap();

        for mode in [Mode::DryRun, Mode::Commit] {
            let report = Reconciler::new(&dir, mode)
                .run(vec![record(2, "a", "a@x.com", Some("false"))])
                .unwrap();
            assert_eq!(report.tally.updated, 1);
            assert_eq!(report.tally.deactivated, 1);
        }
        assert!(!dir.find_user_by_login_name("a").unwrap().unwrap().active);
    }

    #[test]
    fn already_inactive_user_is_not_deactivated_again() {
        let dir = directory();
        let user = dir
            .create_user(NewUser::new("a", "a@x.com", "pw", "F", "L"))
            .unwrap();
        let mut patch = UserPatch::from(&user);
        patch.active = false;
        dir.update_user(user.id, patch).unwrap();

        let report = Reconciler::new(&dir, Mode::Commit)
            .run(vec![record(2, "a", "a@x.com", Some("no"))])
            .unwrap();
        assert_eq!(report.tally.deactivated, 0);
    }

    #[test]
    fn email_clash_is_a_record_failure() {
        let dir = directory();
        dir.create_user(NewUser::new("a", "shared@x.com", "pw", "F", "L"))
            .unwrap();

        let report = Reconciler::new(&dir, Mode::Commit)
            .run(vec![
                record(2, "b", "shared@x.com", None),
                record(3, "c", "c@x.com", None),
            ])
            .unwrap();
        assert_eq!(report.tally.failed, 1);
        assert_eq!(report.tally.created, 1);
        assert_eq!(report.failures[0].line, 2);
        assert_eq!(report.failures[0].login_name.as_deref(), Some("b"));
    }

    #[test]
    fn dry_run_sees_its_own_earlier_rows() {
        let dir = directory();
        let feed = || {
            vec![
                record(2, "carl", "c@x.com", None),
                record(3, "carl", "c@x.com", Some("false")),
                record(4, "dana", "c@x.com", None),
            ]
        };

        let dry = Reconciler::new(&dir, Mode::DryRun).run(feed()).unwrap();
        assert_eq!((dry.tally.created, dry.tally.updated), (1, 1));
        assert_eq!(dry.tally.deactivated, 1);
        assert_eq!(dry.tally.failed, 1);
        assert_eq!(dry.failures[0].line, 4);

        let commit = Reconciler::new(&dir, Mode::Commit).run(feed()).unwrap();
        assert_eq!(dry, commit);
    }

    #[test]
    fn dry_run_frees_an_email_moved_away_earlier_in_the_feed() {
        let dir = directory();
        dir.create_user(NewUser::new("a", "old@x.com", "pw", "F", "L"))
            .unwrap();
        let feed = || {
            vec![
                record(2, "a", "new@x.com", None),
                record(3, "b", "old@x.com", None),
            ]
        };

        let dry = Reconciler::new(&dir, Mode::DryRun).run(feed()).unwrap();
        assert_eq!((dry.tally.updated, dry.tally.created, dry.tally.failed), (1, 1, 0));
        let commit = Reconciler::new(&dir, Mode::Commit).run(feed()).unwrap();
        assert_eq!(dry, commit);
    }

    #[test]
    fn malformed_row_fails_only_itself() {
        let dir = directory();
        let report = Reconciler::new(&dir, Mode::Commit)
            .run(vec![
                Err(FeedError::MalformedRow {
                    line: 2,
                    reason: "bad utf-8".to_string(),
                }),
                record(3, "a", "a@x.com", None),
            ])
            .unwrap();
        assert_eq!(report.tally.total_processed, 2);
        assert_eq!(report.tally.failed, 1);
        assert_eq!(report.tally.created, 1);
    }

    #[test]
    fn unreadable_source_aborts_with_partial_tally() {
        let dir = directory();
        let abort = Reconciler::new(&dir, Mode::Commit)
            .run(vec![
                record(2, "a", "a@x.com", None),
                Err(FeedError::Unreadable("connection reset".to_string())),
                record(4, "b", "b@x.com", None),
            ])
            .unwrap_err();
        assert_eq!(abort.report.tally.created, 1);
        assert_eq!(abort.report.tally.total_processed, 1);
        assert!(abort.error.contains("connection reset"));
        assert!(dir.find_user_by_login_name("b").unwrap().is_none());
    }
}
