use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::partition::Partition;
use crate::runtime::Error;

use super::{DenoiseParams, ReferenceSet};

pub type JobId = usize;

/// Name suffix of per-sample feature tables; the merger looks for it
pub const ARTIFACT_SUFFIX: &str = ".features.tsv";

pub fn artifact_path_for(per_sample_dir: &Path, sample: &str) -> PathBuf {
    per_sample_dir.join(format!("{}{}", sample, ARTIFACT_SUFFIX))
}

/// Immutable description of the denoising of one partition
#[derive(Clone, Debug)]
pub struct JobDescriptor {
    pub id: JobId,
    pub partition: Partition,
    pub params: Arc<DenoiseParams>,
    pub references: Arc<ReferenceSet>,

    /// Where the feature table of this partition is expected
    pub artifact_path: PathBuf,

    /// Scratch space of this job only
    pub temp_dir: PathBuf,
}

impl JobDescriptor {
    pub fn sample(&self) -> &str {
        &self.partition.sample
    }
}

/**
 * One descriptor per partition, ordered by sample. Every path is derived from
 * the sample identifier so jobs never share files, and re-running a partition
 * targets the same artifact.
 */
pub fn build_job_descriptors(
    partitions: &[Partition],
    params: &DenoiseParams,
    references: &ReferenceSet,
    per_sample_dir: &Path,
    temp_dir: &Path,
) -> anyhow::Result<Vec<JobDescriptor>> {
    let mut seen = BTreeSet::new();
    for p in partitions {
        if !seen.insert(p.sample.as_str()) {
            return Err(Error::duplicate_sample(
                p.sample.clone(),
                Some("two partitions share the sample identifier"),
            )
            .into());
        }
    }

    let params = Arc::new(params.clone());
    let references = Arc::new(references.clone());

    let mut sorted: Vec<&Partition> = partitions.iter().collect();
    sorted.sort_by(|a, b| a.sample.cmp(&b.sample));

    Ok(sorted
        .into_iter()
        .enumerate()
        .map(|(id, p)| JobDescriptor {
            id,
            partition: p.clone(),
            params: Arc::clone(&params),
            references: Arc::clone(&references),
            artifact_path: artifact_path_for(per_sample_dir, &p.sample),
            temp_dir: temp_dir.join(&p.sample),
        })
        .collect())
}
