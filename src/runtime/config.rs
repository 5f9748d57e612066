use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fileformat::FileFormat;
use crate::runtime::Error;

pub const DEFAULT_DELIMITER: &str = "_";
pub const DEFAULT_BUFFER_SIZE: usize = 500;
pub const DEFAULT_JOBS_TO_START: usize = 1;
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 1.0;

pub const SPLIT_DIR_NAME: &str = "split";
pub const PER_SAMPLE_DIR_NAME: &str = "per_sample";
pub const TEMP_DIR_NAME: &str = "tmp";
pub const CLUSTER_DIR_NAME: &str = "cluster";
pub const SUMMARY_FILE_NAME: &str = "run_summary.tsv";

///////////////////////////////
/// Every option of a parallel run. Paths of intermediate files are derived
/// from the directory holding the final output.
#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub seqs_fp: PathBuf,
    pub output_fp: PathBuf,
    pub file_format: FileFormat,
    pub delimiter: String,

    /// Records held in memory before partition files are flushed
    pub buffer_size: usize,

    /// Upper bound on concurrently running jobs
    pub jobs_to_start: usize,

    pub retain_temp_files: bool,
    pub suppress_polling: bool,
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,

    /// Fail instead of merging a subset when some partition has no output
    pub strict: bool,

    /// Only run these samples; the merge still covers every partition
    pub only_samples: Option<Vec<String>>,
}

impl WorkflowConfig {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(seqs_fp: P, output_fp: Q) -> Self {
        WorkflowConfig {
            seqs_fp: seqs_fp.as_ref().to_path_buf(),
            output_fp: output_fp.as_ref().to_path_buf(),
            file_format: FileFormat::Fasta,
            delimiter: DEFAULT_DELIMITER.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            jobs_to_start: DEFAULT_JOBS_TO_START,
            retain_temp_files: false,
            suppress_polling: false,
            poll_interval: Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SECS),
            timeout: None,
            strict: false,
            only_samples: None,
        }
    }

    pub fn validated(self) -> anyhow::Result<Self> {
        if !self.seqs_fp.exists() {
            return Err(Error::file_not_found(&self.seqs_fp).into());
        }
        if self.output_fp.file_name().is_none() {
            return Err(Error::invalid_parameter(
                "output-fp",
                format!("{} does not name a file", self.output_fp.display()),
            )
            .into());
        }
        if self.delimiter.is_empty() {
            return Err(Error::invalid_parameter("delim", "delimiter cannot be empty").into());
        }
        if self.buffer_size == 0 {
            return Err(Error::invalid_parameter("buffer-size", "must be at least 1").into());
        }
        if self.jobs_to_start == 0 {
            return Err(Error::invalid_parameter("jobs-to-start", "must be at least 1").into());
        }
        if self.poll_interval.is_zero() {
            return Err(Error::invalid_parameter("poll-interval", "must be positive").into());
        }
        if let Some(samples) = &self.only_samples {
            if samples.is_empty() {
                return Err(
                    Error::invalid_parameter("only-samples", "empty list of samples").into(),
                );
            }
        }
        Ok(self)
    }

    pub fn output_dir(&self) -> PathBuf {
        match self.output_fp.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn split_dir(&self) -> PathBuf {
        self.output_dir().join(SPLIT_DIR_NAME)
    }

    pub fn per_sample_dir(&self) -> PathBuf {
        self.output_dir().join(PER_SAMPLE_DIR_NAME)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.output_dir().join(TEMP_DIR_NAME)
    }

    pub fn cluster_dir(&self) -> PathBuf {
        self.output_dir().join(CLUSTER_DIR_NAME)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir().join(SUMMARY_FILE_NAME)
    }
}
