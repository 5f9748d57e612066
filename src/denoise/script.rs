use std::fmt;
use std::path::{Path, PathBuf};
use std::process;

use log::debug;

use crate::job::JobDescriptor;
use crate::runtime::Error;
use crate::utils::{command_to_string, to_absolute_path};

use super::{param_args, DenoiseWorkflow};

/**
 * Denoising through an external executable, e.g. a wrapper around deblur.
 *
 * The script is called with `--input <partition> --output <table> --sample <id>
 * --temp-dir <dir>` followed by the flags of every numeric parameter and
 * reference, and runs inside the temp directory. It must write a feature table
 * to the output path and exit with status 0.
 */
#[derive(Clone, Debug)]
pub struct ScriptWorkflow {
    script_file: PathBuf,
}

impl ScriptWorkflow {
    pub fn new(script_file: &Path) -> anyhow::Result<Self> {
        let script_file = to_absolute_path(script_file)?;
        if !script_file.is_file() {
            return Err(Error::file_not_found(&script_file).into());
        }
        Ok(ScriptWorkflow { script_file })
    }

    pub fn script_file(&self) -> &Path {
        &self.script_file
    }

    pub fn command(&self, job: &JobDescriptor, temp_dir: &Path) -> anyhow::Result<process::Command> {
        let mut cmd = process::Command::new(&self.script_file);
        cmd.current_dir(temp_dir)
            .arg("--input")
            .arg(to_absolute_path(&job.partition.path)?)
            .arg("--output")
            .arg(to_absolute_path(&job.artifact_path)?)
            .arg("--sample")
            .arg(job.sample())
            .arg("--temp-dir")
            .arg(to_absolute_path(temp_dir)?)
            .args(param_args(&job.params, &job.references));
        Ok(cmd)
    }
}

impl fmt::Display for ScriptWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "script {}", self.script_file.display())
    }
}

impl DenoiseWorkflow for ScriptWorkflow {
    fn name(&self) -> &str {
        "script"
    }

    fn denoise(&self, job: &JobDescriptor, temp_dir: &Path) -> anyhow::Result<()> {
        let mut cmd = self.command(job, temp_dir)?;
        let cmd_string = command_to_string(&cmd);
        debug!("Running {}", cmd_string);

        let run_output = cmd.output().map_err(|e| {
            Error::utility_execution_error(
                self.script_file.display().to_string(),
                &cmd_string,
                Some(e.to_string()),
            )
        })?;

        if !run_output.status.success() {
            let stderr = String::from_utf8_lossy(&run_output.stderr);
            let last_lines: Vec<&str> = stderr.trim().lines().rev().take(5).collect();
            let detail = format!(
                "{}; {}",
                run_output.status,
                last_lines.into_iter().rev().collect::<Vec<_>>().join(" | ")
            );
            return Err(Error::utility_execution_error(
                self.script_file.display().to_string(),
                cmd_string,
                Some(detail),
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;

    use crate::denoise::run_job;
    use crate::fileformat::{FeatureTable, FileFormat};
    use crate::job::{DenoiseParams, ReferenceSet};
    use crate::partition::Partition;

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let p = dir.join("denoise.sh");
        fs::write(&p, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&p, fs::Permissions::from_mode(0o755)).unwrap();
        p
    }

    fn job(dir: &Path) -> JobDescriptor {
        let path = dir.join("S1.fasta");
        fs::write(&path, ">S1_0\nACGT\n").unwrap();
        JobDescriptor {
            id: 3,
            partition: Partition {
                sample: "S1".to_string(),
                path,
                format: FileFormat::Fasta,
                sequence_count: Some(1),
            },
            params: Arc::new(DenoiseParams::default()),
            references: Arc::new(ReferenceSet::default()),
            artifact_path: dir.join("per_sample").join("S1.features.tsv"),
            temp_dir: dir.join("tmp").join("S1"),
        }
    }

    #[test]
    fn test_script_writes_table() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            r#"while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift ;;
    --sample) sample="$2"; shift ;;
  esac
  shift
done
printf '#OTU ID\t%s\nACGT\t7\n' "$sample" > "$out""#,
        );
        let job = job(dir.path());
        let workflow = ScriptWorkflow::new(&script).unwrap();

        run_job(&job, &workflow, false).unwrap();
        let table = FeatureTable::read_tsv(&job.artifact_path).unwrap();
        assert_eq!(table.get("ACGT", "S1"), 7.0);
    }

    #[test]
    fn test_relative_reference_resolves_from_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let refs_dir = tempfile::tempdir_in(std::env::current_dir().unwrap()).unwrap();
        fs::write(refs_dir.path().join("a.fa"), ">r1\nACGT\n").unwrap();
        let relative = PathBuf::from(refs_dir.path().file_name().unwrap()).join("a.fa");
        assert!(relative.is_relative());

        let script = write_script(
            dir.path(),
            r#"while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift ;;
    --ref-fp) ref="$2"; shift ;;
  esac
  shift
done
[ -f "$ref" ] || { echo "ref $ref not found in $(pwd)" >&2; exit 4; }
printf '#OTU ID\tS1\nACGT\t1\n' > "$out""#,
        );
        let mut job = job(dir.path());
        job.references = Arc::new(ReferenceSet::new(&[relative], &[]).unwrap());
        let workflow = ScriptWorkflow::new(&script).unwrap();

        run_job(&job, &workflow, false).unwrap();
        assert!(job.artifact_path.is_file());
    }

    #[test]
    fn test_script_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "echo 'alignment failed' >&2\nexit 3");
        let job = job(dir.path());
        let workflow = ScriptWorkflow::new(&script).unwrap();

        let err = job_error(&job, &workflow);
        assert!(err.contains("alignment failed"), "{}", err);
    }

    fn job_error(job: &JobDescriptor, workflow: &ScriptWorkflow) -> String {
        format!("{:#}", run_job(job, workflow, false).unwrap_err())
    }

    #[test]
    fn test_missing_script_is_rejected() {
        let err = ScriptWorkflow::new(Path::new("/nonexistent/denoise.sh")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::FileNotFound { .. })
        ));
    }
}
