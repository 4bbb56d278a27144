use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use anyhow::{Context, bail};

use iamdir_core::SystemClock;
use iamdir_directory::{Directory, DirectoryConfig, InMemoryDirectoryStore};
use iamdir_provisioning::{
    ColumnMapping, InMemoryJobStore, JobRequest, JobStatus, ProvisioningService, SourceKind,
};

const USAGE: &str = "usage: iamdir-provision <feed.csv> [--dry-run]";

fn main() -> anyhow::Result<()> {
    iamdir_observability::init();

    let mut path = None;
    let mut dry_run = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(());
            }
            _ if path.is_none() => path = Some(arg),
            _ => bail!("unexpected argument '{arg}'\n{USAGE}"),
        }
    }
    let Some(path) = path else {
        bail!(USAGE);
    };

    let clock = Arc::new(SystemClock);
    let directory = Arc::new(Directory::new(
        Arc::new(InMemoryDirectoryStore::new()),
        Arc::new(iamdir_directory::Argon2SecretHasher::new()),
        clock.clone(),
        DirectoryConfig::from_env(),
    ));
    directory.seed_defaults().context("seeding default directory data")?;

    let service = ProvisioningService::new(directory, InMemoryJobStore::arc(), clock);
    let job = service.create_job(JobRequest::new(
        format!("import {path}"),
        SourceKind::Csv,
        path.clone(),
        "cli",
    ))?;

    let source = File::open(&path).with_context(|| format!("opening feed {path}"))?;
    let outcome = service.execute_job(job.id, BufReader::new(source), &ColumnMapping::default(), dry_run)?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.job.status == JobStatus::Failed {
        bail!(
            "job failed: {}",
            outcome.job.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
