use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::bail;
use log::{debug, info, warn};

use crate::dispatch::{Dispatcher, ExecutionBackend, JobOutcome, Poller, RunSummary};
use crate::job::{build_job_descriptors, DenoiseParams, ReferenceSet};
use crate::merge::{expected_artifacts, MergeReport, Merger};
use crate::partition::{Partition, Partitioner};
use crate::runtime::{Error, WorkflowConfig};

#[derive(Debug)]
pub struct PipelineReport {
    pub partitions: Vec<Partition>,
    pub split_reused: bool,
    pub summary: RunSummary,

    /// None when polling was suppressed; merge later with the `merge` command
    pub merge: Option<MergeReport>,
}

/// Partitions selected for this run. Unknown sample names are an error
pub fn select_partitions(partitions: &[Partition], only_samples: &Option<Vec<String>>) -> anyhow::Result<Vec<Partition>> {
    let Some(only_samples) = only_samples else {
        return Ok(partitions.to_vec());
    };

    let known: BTreeSet<&str> = partitions.iter().map(|p| p.sample.as_str()).collect();
    let unknown: Vec<&str> = only_samples
        .iter()
        .map(|s| s.as_str())
        .filter(|s| !known.contains(s))
        .collect();
    if !unknown.is_empty() {
        return Err(Error::invalid_parameter(
            "only-samples",
            format!("no partition for sample(s) {}", unknown.join(", ")),
        )
        .into());
    }

    let wanted: BTreeSet<&str> = only_samples.iter().map(|s| s.as_str()).collect();
    Ok(partitions
        .iter()
        .filter(|p| wanted.contains(p.sample.as_str()))
        .cloned()
        .collect())
}

/**
 * Split, denoise every partition on the backend, wait, and merge.
 *
 * The merge covers every partition of the split, also those not run this
 * time, so that a re-run of failed samples completes the earlier result.
 * Intermediate directories are removed only after a run in which every job
 * succeeded and nothing was missing from the merge.
 */
pub fn run_workflow(
    config: WorkflowConfig,
    params: &DenoiseParams,
    references: &ReferenceSet,
    backend: Box<dyn ExecutionBackend>,
) -> anyhow::Result<PipelineReport> {
    let config = config.validated()?;
    let params = params.clone().validated()?;

    let partitioner = Partitioner::new(config.file_format, &config.delimiter, config.buffer_size)?;
    let split = partitioner.split_if_absent(&config.seqs_fp, &config.split_dir())?;
    let split_reused = split.was_reused();
    let partitions = split.into_partitions();
    if partitions.is_empty() {
        bail!("No partitions in {}", config.split_dir().display());
    }
    info!("{} partition(s) in {}", partitions.len(), config.split_dir().display());

    let selected = select_partitions(&partitions, &config.only_samples)?;
    let jobs = build_job_descriptors(
        &selected,
        &params,
        references,
        &config.per_sample_dir(),
        &config.temp_dir(),
    )?;

    let mut dispatcher = Dispatcher::new(backend, config.jobs_to_start)?;
    dispatcher.dispatch(jobs)?;

    let poller = Poller {
        interval: config.poll_interval,
        timeout: config.timeout,
        suppress: config.suppress_polling,
    };
    let summary = poller.observe(&mut dispatcher);
    summary.log();
    summary.write_tsv(&config.summary_path())?;
    debug!("Wrote {}", config.summary_path().display());

    if config.suppress_polling {
        info!(
            "Merge the outputs in {} once the jobs are done",
            config.per_sample_dir().display()
        );
        dispatcher.detach();
        return Ok(PipelineReport {
            partitions,
            split_reused,
            summary,
            merge: None,
        });
    }

    //Jobs that timed out may still be writing, or not have started at all
    let expected = expected_artifacts(&partitions, &config.per_sample_dir());
    let unfinished = summary.samples_with(JobOutcome::TimedOut.label());
    let merge = Merger::new(config.strict)
        .with_unfinished(unfinished)
        .merge_to(&[], &expected, &config.output_fp)?;

    if !config.retain_temp_files && summary.all_succeeded() && merge.missing.is_empty() {
        for dir in [config.temp_dir(), config.split_dir(), config.cluster_dir()] {
            remove_intermediate(&dir);
        }
    }
    dispatcher.detach();

    Ok(PipelineReport {
        partitions,
        split_reused,
        summary,
        merge: Some(merge),
    })
}

fn remove_intermediate(dir: &Path) {
    if !dir.exists() {
        return;
    }
    match fs::remove_dir_all(dir) {
        Ok(()) => debug!("Removed {}", dir.display()),
        Err(e) => warn!("Could not remove {}: {}", dir.display(), e),
    }
}
