use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::denoise::{DenoiseWorkflow, DereplicateWorkflow, ScriptWorkflow};
use crate::job::{
    parse_error_dist, DenoiseParams, ReferenceSet, DEFAULT_INDEL_MAX, DEFAULT_INDEL_PROB, DEFAULT_MIN_SIZE,
    DEFAULT_READ_ERROR, DEFAULT_THREADS, DEFAULT_TRIM_LENGTH,
};

/// Options shared by every job of a run. Also accepted by the `denoise` command,
/// which is how child processes receive them
#[derive(Args, Clone, Debug)]
pub struct DenoiseArgs {
    // Reference databases, repeatable
    #[arg(long = "ref-fp", value_parser = clap::value_parser!(PathBuf))]
    pub ref_fp: Vec<PathBuf>,

    // Prebuilt indices, one per reference and in the same order
    #[arg(long = "ref-db-fp", value_parser = clap::value_parser!(PathBuf))]
    pub ref_db_fp: Vec<PathBuf>,

    #[arg(long = "read-error", default_value_t = DEFAULT_READ_ERROR)]
    pub read_error: f64,

    #[arg(long = "mean-error")]
    pub mean_error: Option<f64>,

    // Comma separated error probability per hamming distance
    #[arg(long = "error-dist")]
    pub error_dist: Option<String>,

    #[arg(long = "indel-prob", default_value_t = DEFAULT_INDEL_PROB)]
    pub indel_prob: f64,

    #[arg(long = "indel-max", default_value_t = DEFAULT_INDEL_MAX)]
    pub indel_max: usize,

    #[arg(long = "trim-length", default_value_t = DEFAULT_TRIM_LENGTH)]
    pub trim_length: usize,

    #[arg(long = "min-size", default_value_t = DEFAULT_MIN_SIZE)]
    pub min_size: usize,

    // Keep the reads that do not match the references instead
    #[arg(long = "negate")]
    pub negate: bool,

    #[arg(long = "threads", default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    // External denoiser. Without it, exact variants are counted
    #[arg(long = "script", value_parser = clap::value_parser!(PathBuf))]
    pub script: Option<PathBuf>,
}

impl DenoiseArgs {
    pub fn params(&self) -> anyhow::Result<DenoiseParams> {
        DenoiseParams {
            read_error: self.read_error,
            mean_error: self.mean_error,
            error_dist: self.error_dist.as_deref().map(parse_error_dist).transpose()?,
            indel_prob: self.indel_prob,
            indel_max: self.indel_max,
            trim_length: self.trim_length,
            min_size: self.min_size,
            negate: self.negate,
            threads: self.threads,
        }
        .validated()
    }

    pub fn references(&self) -> anyhow::Result<ReferenceSet> {
        ReferenceSet::new(&self.ref_fp, &self.ref_db_fp)
    }

    pub fn workflow(&self) -> anyhow::Result<Arc<dyn DenoiseWorkflow>> {
        let workflow: Arc<dyn DenoiseWorkflow> = match &self.script {
            Some(script) => Arc::new(ScriptWorkflow::new(script)?),
            None => Arc::new(DereplicateWorkflow),
        };
        Ok(workflow)
    }
}
