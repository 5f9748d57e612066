use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, ValueEnum};
use log::info;

use crate::dispatch::{ClusterBackend, ClusterConfig, ExecutionBackend, LocalBackend, SubprocessBackend};
use crate::denoise::DenoiseInvocation;
use crate::fileformat::FileFormat;
use crate::pipeline::run_workflow;
use crate::runtime::{
    WorkflowConfig, DEFAULT_BUFFER_SIZE, DEFAULT_DELIMITER, DEFAULT_JOBS_TO_START,
    DEFAULT_POLL_INTERVAL_SECS,
};

use super::constants::{DEFAULT_BACKEND, DEFAULT_CLUSTER_SUBMIT};
use super::DenoiseArgs;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Threads inside this process
    Local,
    /// One child process per job
    Subprocess,
    /// One scheduler submission per lane
    Cluster,
}

#[derive(Args)]
pub struct WorkflowCMD {
    // Combined, demultiplexed sequences
    #[arg(short = 'i', long = "seqs-fp", value_parser = clap::value_parser!(PathBuf))]
    pub seqs_fp: PathBuf,

    // Merged feature table; intermediate files go next to it
    #[arg(short = 'o', long = "output-fp", value_parser = clap::value_parser!(PathBuf))]
    pub output_fp: PathBuf,

    #[arg(long = "file-type", value_enum, default_value_t = FileFormat::Fasta)]
    pub file_type: FileFormat,

    #[command(flatten)]
    pub denoise: DenoiseArgs,

    #[arg(long = "delim", default_value = DEFAULT_DELIMITER)]
    pub delim: String,

    #[arg(long = "buffer-size", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    #[arg(short = 'O', long = "jobs-to-start", default_value_t = DEFAULT_JOBS_TO_START)]
    pub jobs_to_start: usize,

    #[arg(long = "retain-temp-files")]
    pub retain_temp_files: bool,

    // Return after submitting; merge later with the merge command
    #[arg(long = "suppress-polling")]
    pub suppress_polling: bool,

    #[arg(long = "backend", value_enum, default_value = DEFAULT_BACKEND)]
    pub backend: BackendKind,

    // Seconds between status checks
    #[arg(long = "poll-interval", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub poll_interval: f64,

    // Seconds to wait for jobs before giving up on them
    #[arg(long = "timeout")]
    pub timeout: Option<f64>,

    // Fail if any partition has no output
    #[arg(long = "strict")]
    pub strict: bool,

    // Comma separated samples to run again
    #[arg(long = "only-samples", value_delimiter = ',')]
    pub only_samples: Option<Vec<String>>,

    #[arg(long = "cluster-submit", default_value = DEFAULT_CLUSTER_SUBMIT)]
    pub cluster_submit: String,

    #[arg(long = "cluster-cancel")]
    pub cluster_cancel: Option<String>,
}

impl WorkflowCMD {
    pub fn config(&self) -> Result<WorkflowConfig> {
        let seconds = |name: &str, s: f64| -> Result<Duration> {
            Duration::try_from_secs_f64(s).map_err(|e| {
                crate::runtime::Error::invalid_parameter(name, e.to_string()).into()
            })
        };
        Ok(WorkflowConfig {
            seqs_fp: self.seqs_fp.clone(),
            output_fp: self.output_fp.clone(),
            file_format: self.file_type,
            delimiter: self.delim.clone(),
            buffer_size: self.buffer_size,
            jobs_to_start: self.jobs_to_start,
            retain_temp_files: self.retain_temp_files,
            suppress_polling: self.suppress_polling,
            poll_interval: seconds("poll-interval", self.poll_interval)?,
            timeout: self.timeout.map(|t| seconds("timeout", t)).transpose()?,
            strict: self.strict,
            only_samples: self.only_samples.clone(),
        }
        .validated()?)
    }

    fn backend(&self, config: &WorkflowConfig) -> Result<Box<dyn ExecutionBackend>> {
        let script = self.denoise.script.as_deref();
        let backend: Box<dyn ExecutionBackend> = match self.backend {
            BackendKind::Local => Box::new(LocalBackend::new(
                self.denoise.workflow()?,
                config.jobs_to_start,
                config.retain_temp_files,
            )),
            BackendKind::Subprocess => {
                let invocation = DenoiseInvocation::current(script, config.retain_temp_files)?;
                Box::new(SubprocessBackend::new(invocation))
            }
            BackendKind::Cluster => {
                let invocation = DenoiseInvocation::current(script, config.retain_temp_files)?;
                let cluster = ClusterConfig::new(
                    &self.cluster_submit,
                    self.cluster_cancel.as_deref(),
                    &config.cluster_dir(),
                )?;
                Box::new(ClusterBackend::new(invocation, cluster)?)
            }
        };
        Ok(backend)
    }

    pub fn try_execute(&mut self) -> Result<()> {
        let config = self.config()?;
        let params = self.denoise.params()?;
        let references = self.denoise.references()?;
        //Checks that a given script exists, whatever the backend
        self.denoise.workflow()?;
        let backend = self.backend(&config)?;

        let report = run_workflow(config, &params, &references, backend)?;
        match &report.merge {
            Some(merge) => info!(
                "Workflow has finished; {} sample(s) merged into {}",
                merge.table.samples().len(),
                self.output_fp.display()
            ),
            None => info!("Workflow has submitted {} job(s)", report.summary.outcomes().len()),
        }
        Ok(())
    }
}
