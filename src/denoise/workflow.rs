use std::fmt::Debug;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use log::{debug, info};

use crate::job::JobDescriptor;
use crate::utils::{artifact_is_complete, staging_path};

/// The denoising of one partition. Implementations write the feature table
/// of the partition to `job.artifact_path`
pub trait DenoiseWorkflow
where
    Self: Sync + Send + Debug,
{
    fn name(&self) -> &str;

    fn denoise(&self, job: &JobDescriptor, temp_dir: &Path) -> anyhow::Result<()>;
}

/**
 * Run one job to completion, in whatever process the backend chose. The
 * workflow writes to a staging file that is renamed to the artifact path only
 * once it is complete, so nobody reads a table that is still being written.
 * The job succeeds only if its artifact exists and is non-empty afterwards.
 * The temp directory is removed unless retained, regardless of the outcome.
 */
pub fn run_job(
    job: &JobDescriptor,
    workflow: &dyn DenoiseWorkflow,
    retain_temp_files: bool,
) -> anyhow::Result<()> {
    info!(
        "Job {} for sample '{}' starting ({})",
        job.id,
        job.sample(),
        workflow.name()
    );

    let staged = JobDescriptor {
        artifact_path: staging_path(&job.artifact_path),
        ..job.clone()
    };
    let result = prepare_job_dirs(job)
        .and_then(|()| workflow.denoise(&staged, &job.temp_dir))
        .and_then(|()| {
            if !artifact_is_complete(&staged.artifact_path) {
                bail!(
                    "Workflow '{}' did not produce {}",
                    workflow.name(),
                    job.artifact_path.display()
                )
            }
            fs::rename(&staged.artifact_path, &job.artifact_path).with_context(|| {
                format!("Failed to move output to {}", job.artifact_path.display())
            })
        });
    if result.is_err() {
        let _ = fs::remove_file(&staged.artifact_path);
    }

    if retain_temp_files {
        debug!("Keeping temp files in {}", job.temp_dir.display());
    } else {
        let _ = fs::remove_dir_all(&job.temp_dir);
    }

    match &result {
        Ok(()) => info!("Job {} for sample '{}' finished", job.id, job.sample()),
        Err(e) => info!("Job {} for sample '{}' failed: {:#}", job.id, job.sample(), e),
    }
    result
}

fn prepare_job_dirs(job: &JobDescriptor) -> anyhow::Result<()> {
    fs::create_dir_all(&job.temp_dir)
        .with_context(|| format!("Failed to create temp dir {}", job.temp_dir.display()))?;
    if let Some(parent) = job.artifact_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output dir {}", parent.display()))?;
    }
    //An artifact left by an earlier attempt must not count for this one
    for path in [job.artifact_path.clone(), staging_path(&job.artifact_path)] {
        if path.exists() {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
