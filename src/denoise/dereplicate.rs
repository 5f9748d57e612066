use std::collections::BTreeMap;
use std::path::Path;

use log::debug;

use crate::fileformat::{FeatureTable, SequenceReader};
use crate::job::JobDescriptor;

use super::DenoiseWorkflow;

/**
 * Built-in workflow counting exact sequence variants.
 *
 * Reads are trimmed to the trim length (shorter reads are dropped), identical
 * sequences are counted, and variants below the minimum abundance are removed.
 * No error model or reference filtering is applied.
 */
#[derive(Clone, Debug, Default)]
pub struct DereplicateWorkflow;

impl DenoiseWorkflow for DereplicateWorkflow {
    fn name(&self) -> &str {
        "dereplicate"
    }

    fn denoise(&self, job: &JobDescriptor, _temp_dir: &Path) -> anyhow::Result<()> {
        let trim_length = job.params.trim_length;
        let min_size = job.params.min_size as u64;

        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut num_reads = 0;
        let mut num_short = 0;
        for rec in SequenceReader::open(&job.partition.path, job.partition.format)? {
            let rec = rec?;
            num_reads += 1;
            if rec.seq.len() < trim_length {
                num_short += 1;
                continue;
            }
            let seq = String::from_utf8_lossy(&rec.seq[..trim_length]).to_ascii_uppercase();
            *counts.entry(seq).or_insert(0) += 1;
        }

        let num_unique = counts.len();
        counts.retain(|_, c| *c >= min_size);
        debug!(
            "Sample '{}': {} reads, {} shorter than {}, {} unique, {} kept with abundance >= {}",
            job.sample(),
            num_reads,
            num_short,
            trim_length,
            num_unique,
            counts.len(),
            min_size
        );

        FeatureTable::from_sample_counts(job.sample(), &counts)?.write_tsv(&job.artifact_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;

    use crate::denoise::run_job;
    use crate::fileformat::FileFormat;
    use crate::job::{DenoiseParams, ReferenceSet};
    use crate::partition::Partition;

    fn job_in(dir: &Path, content: &str, params: DenoiseParams) -> JobDescriptor {
        let path = dir.join("S1.fasta");
        fs::write(&path, content).unwrap();
        JobDescriptor {
            id: 0,
            partition: Partition {
                sample: "S1".to_string(),
                path,
                format: FileFormat::Fasta,
                sequence_count: None,
            },
            params: Arc::new(params),
            references: Arc::new(ReferenceSet::default()),
            artifact_path: dir.join("per_sample").join("S1.features.tsv"),
            temp_dir: dir.join("tmp").join("S1"),
        }
    }

    #[test]
    fn test_counts_trimmed_variants() {
        let dir = tempfile::tempdir().unwrap();
        let params = DenoiseParams {
            trim_length: 4,
            min_size: 2,
            ..Default::default()
        };
        let job = job_in(
            dir.path(),
            ">S1_0\nACGTAA\n>S1_1\nacgtcc\n>S1_2\nGGGGG\n>S1_3\nACG\n>S1_4\nTTTT\n>S1_5\nGGGGT\n",
            params,
        );

        run_job(&job, &DereplicateWorkflow, false).unwrap();

        let table = FeatureTable::read_tsv(&job.artifact_path).unwrap();
        assert_eq!(table.samples(), &["S1"]);
        assert_eq!(table.features(), &["ACGT", "GGGG"]);
        assert_eq!(table.get("ACGT", "S1"), 2.0);
        assert!(!job.temp_dir.exists());
    }

    #[test]
    fn test_temp_dir_is_retained_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_in(dir.path(), ">S1_0\nACGT\n", DenoiseParams::default());

        //Trim length 100 drops every read, but the table is still written
        run_job(&job, &DereplicateWorkflow, true).unwrap();
        assert!(job.temp_dir.exists());
        let table = FeatureTable::read_tsv(&job.artifact_path).unwrap();
        assert!(table.features().is_empty());
    }

    #[test]
    fn test_missing_partition_fails_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_in(dir.path(), ">S1_0\nACGT\n", DenoiseParams::default());
        job.partition.path = PathBuf::from("/nonexistent/S1.fasta");

        assert!(run_job(&job, &DereplicateWorkflow, false).is_err());
        assert!(!job.temp_dir.exists());
        assert!(!job.artifact_path.exists());
    }
}
