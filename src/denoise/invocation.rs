use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use itertools::Itertools;

use crate::job::{DenoiseParams, JobDescriptor, ReferenceSet};
use crate::utils::to_absolute_path;

/// Command line flags for the numeric parameters and references. Shared by the
/// `denoise` subcommand and external denoising scripts
pub fn param_args(params: &DenoiseParams, references: &ReferenceSet) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    let mut push = |flag: &str, value: String| {
        args.push(flag.into());
        args.push(value.into());
    };

    push("--read-error", params.read_error.to_string());
    if let Some(mean_error) = params.mean_error {
        push("--mean-error", mean_error.to_string());
    }
    if let Some(dist) = &params.error_dist {
        push("--error-dist", dist.iter().join(","));
    }
    push("--indel-prob", params.indel_prob.to_string());
    push("--indel-max", params.indel_max.to_string());
    push("--trim-length", params.trim_length.to_string());
    push("--min-size", params.min_size.to_string());
    push("--threads", params.threads.to_string());

    if params.negate {
        args.push("--negate".into());
    }
    for entry in references.entries() {
        args.push("--ref-fp".into());
        args.push(entry.sequences.clone().into());
    }
    for index in references.index_files() {
        args.push("--ref-db-fp".into());
        args.push(index.into());
    }
    args
}

/// How a job is handed to a separate `denoise` process of this program
#[derive(Clone, Debug)]
pub struct DenoiseInvocation {
    pub exe: PathBuf,

    /// External denoising script; the built-in workflow is used when None
    pub script: Option<PathBuf>,

    pub retain_temp_files: bool,
}

impl DenoiseInvocation {
    pub fn new(exe: &Path, script: Option<&Path>, retain_temp_files: bool) -> anyhow::Result<Self> {
        Ok(DenoiseInvocation {
            exe: to_absolute_path(exe)?,
            script: script.map(to_absolute_path).transpose()?,
            retain_temp_files,
        })
    }

    /// Invocation of the currently running executable
    pub fn current(script: Option<&Path>, retain_temp_files: bool) -> anyhow::Result<Self> {
        Self::new(&std::env::current_exe()?, script, retain_temp_files)
    }

    /// Arguments after the executable. Paths are made absolute since the job
    /// may run in another working directory
    pub fn args(&self, job: &JobDescriptor) -> anyhow::Result<Vec<OsString>> {
        let mut args: Vec<OsString> = vec!["denoise".into()];
        args.push("--input".into());
        args.push(to_absolute_path(&job.partition.path)?.into());
        args.push("--file-type".into());
        args.push(job.partition.format.to_string().into());
        args.push("--sample".into());
        args.push(job.sample().into());
        args.push("--output".into());
        args.push(to_absolute_path(&job.artifact_path)?.into());
        args.push("--temp-dir".into());
        args.push(to_absolute_path(&job.temp_dir)?.into());
        args.push("--job-id".into());
        args.push(job.id.to_string().into());

        args.extend(param_args(&job.params, &job.references));

        if let Some(script) = &self.script {
            args.push("--script".into());
            args.push(script.into());
        }
        if self.retain_temp_files {
            args.push("--retain-temp-files".into());
        }
        Ok(args)
    }

    pub fn command(&self, job: &JobDescriptor) -> anyhow::Result<Command> {
        let mut cmd = Command::new(&self.exe);
        cmd.args(self.args(job)?);
        Ok(cmd)
    }
}
