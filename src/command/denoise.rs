use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::denoise::run_job;
use crate::fileformat::FileFormat;
use crate::job::{JobDescriptor, JobId};
use crate::partition::Partition;

use super::DenoiseArgs;

/// Runs a single job. Child processes and cluster scripts call this
#[derive(Args)]
pub struct DenoiseCMD {
    // Partition file of one sample
    #[arg(long = "input", value_parser = clap::value_parser!(PathBuf))]
    pub input: PathBuf,

    #[arg(long = "file-type", value_enum, default_value_t = FileFormat::Fasta)]
    pub file_type: FileFormat,

    #[arg(long = "sample")]
    pub sample: String,

    // Feature table to write
    #[arg(long = "output", value_parser = clap::value_parser!(PathBuf))]
    pub output: PathBuf,

    #[arg(long = "temp-dir", value_parser = clap::value_parser!(PathBuf))]
    pub temp_dir: PathBuf,

    #[arg(long = "job-id", default_value_t = 0)]
    pub job_id: JobId,

    #[command(flatten)]
    pub denoise: DenoiseArgs,

    #[arg(long = "retain-temp-files")]
    pub retain_temp_files: bool,
}

impl DenoiseCMD {
    pub fn job(&self) -> Result<JobDescriptor> {
        Ok(JobDescriptor {
            id: self.job_id,
            partition: Partition {
                sample: self.sample.clone(),
                path: self.input.clone(),
                format: self.file_type,
                sequence_count: None,
            },
            params: Arc::new(self.denoise.params()?),
            references: Arc::new(self.denoise.references()?),
            artifact_path: self.output.clone(),
            temp_dir: self.temp_dir.clone(),
        })
    }

    pub fn try_execute(&mut self) -> Result<()> {
        let job = self.job()?;
        let workflow = self.denoise.workflow()?;
        run_job(&job, workflow.as_ref(), self.retain_temp_files)
    }
}
